//! Physical key encoding used to namespace the logical KeyStores (`default`,
//! `expiry`, and caller-supplied raw stores) within the single underlying
//! [`crate::storage::engine::Engine`] instance a [`crate::database::Database`] owns.
//!
//! Every physical key starts with a one-byte tag and the owning store's
//! name, length-prefixed so two stores never share a prefix:
//!
//! - `0x00 store_len store record_key...`                      -- a record
//! - `0x01 store_len store be_u64(sequence)`                    -- sequence index
//! - `0x02 store_len store be_u32(doc_id_len) doc_id be_u64(seq)` -- overflow body
//!
//! Within one store, physical-key order matches record-key order exactly,
//! since the leading tag/length/name prefix is constant for a fixed store.
//! Sequence numbers use a big-endian fixed-width encoding (not bincode's
//! native little-endian integers) specifically so `SeqIndex` keys sort
//! numerically -- see `DESIGN.md` for the rationale.

use std::ops::Bound;

const TAG_RECORD: u8 = 0x00;
const TAG_SEQ_INDEX: u8 = 0x01;
const TAG_BODY: u8 = 0x02;

fn store_header(store: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + store.len());
    out.push(store.len() as u8);
    out.extend_from_slice(store.as_bytes());
    out
}

pub(crate) fn record_key(store: &str, key: &[u8]) -> Vec<u8> {
    let mut out = vec![TAG_RECORD];
    out.extend(store_header(store));
    out.extend_from_slice(key);
    out
}

pub(crate) fn record_prefix(store: &str) -> Vec<u8> {
    let mut out = vec![TAG_RECORD];
    out.extend(store_header(store));
    out
}

/// Recovers the logical key from a physical record key, stripping the tag,
/// store-name header and all. Panics if `phys_key` was not produced by
/// [`record_key`] for `store` -- callers only ever see keys from their own
/// store's scans.
pub(crate) fn strip_record_prefix(store: &str, phys_key: &[u8]) -> Vec<u8> {
    let prefix = record_prefix(store);
    phys_key[prefix.len()..].to_vec()
}

pub(crate) fn seq_index_key(store: &str, sequence: u64) -> Vec<u8> {
    let mut out = vec![TAG_SEQ_INDEX];
    out.extend(store_header(store));
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

pub(crate) fn seq_index_prefix(store: &str) -> Vec<u8> {
    let mut out = vec![TAG_SEQ_INDEX];
    out.extend(store_header(store));
    out
}

pub(crate) fn body_key(store: &str, doc_id: &[u8], sequence: u64) -> Vec<u8> {
    let mut out = vec![TAG_BODY];
    out.extend(store_header(store));
    out.extend_from_slice(&(doc_id.len() as u32).to_be_bytes());
    out.extend_from_slice(doc_id);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

/// The exclusive upper bound of every physical key sharing `prefix`, or
/// unbounded if `prefix` is all `0xff` bytes. Mirrors [`crate::storage::engine::Engine::scan_prefix`].
pub(crate) fn prefix_end(prefix: &[u8]) -> Bound<Vec<u8>> {
    match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => Bound::Excluded(
            prefix.iter().take(i).copied().chain(std::iter::once(prefix[i] + 1)).collect(),
        ),
        None => Bound::Unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_sort_by_logical_key_within_a_store() {
        let a = record_key("default", b"a");
        let b = record_key("default", b"b");
        assert!(a < b);
    }

    #[test]
    fn different_stores_do_not_collide() {
        let a = record_key("default", b"x");
        let b = record_key("expiry", b"x");
        assert_ne!(a, b);
    }

    #[test]
    fn seq_index_keys_sort_numerically() {
        let a = seq_index_key("default", 2);
        let b = seq_index_key("default", 16);
        assert!(a < b, "big-endian fixed width must sort 2 before 16");
    }
}
