//! A stateful cursor over the documents whose expiry has passed, backed by
//! [`crate::database::Database::expiry_enumerator`]'s `(timestamp, docID)`
//! snapshot.
//!
//! Unlike [`crate::enumerator::DocEnumerator`] this is not a Rust
//! [`Iterator`] -- callers step it with `next()` and read the current entry
//! off it, mirroring how a caller decides whether to purge each expired
//! document before moving on.

/// A snapshot of `(forward key, docID)` pairs whose expiry timestamp was at
/// or before the `now` passed to [`crate::database::Database::expiry_enumerator`],
/// ordered oldest-expiry first.
pub struct ExpiryEnumerator {
    entries: Vec<(Vec<u8>, String)>,
    pos: Option<usize>,
}

impl ExpiryEnumerator {
    pub(crate) fn new(entries: Vec<(Vec<u8>, String)>) -> Self {
        Self { entries, pos: None }
    }

    /// Advances to the next expired entry. Must be called once before the
    /// first [`Self::doc_id`]/[`Self::key`]. Returns `false` once exhausted.
    pub fn next(&mut self) -> bool {
        let next_pos = match self.pos {
            None => 0,
            Some(p) => p + 1,
        };
        if next_pos < self.entries.len() {
            self.pos = Some(next_pos);
            true
        } else {
            self.pos = Some(self.entries.len());
            false
        }
    }

    fn current(&self) -> Option<&(Vec<u8>, String)> {
        self.pos.and_then(|p| self.entries.get(p))
    }

    /// The current entry's document id.
    pub fn doc_id(&self) -> Option<&str> {
        self.current().map(|(_, id)| id.as_str())
    }

    /// The current entry's raw forward-index key, as passed to
    /// [`crate::database::Database::purge_expiry`].
    pub fn key(&self) -> Option<&[u8]> {
        self.current().map(|(k, _)| k.as_slice())
    }

    /// Replaces the entries with a fresh snapshot (typically re-queried
    /// against a later `now` by [`crate::database::Database::reset_expiry_enumerator`])
    /// and rewinds to before the first one.
    pub(crate) fn reset(&mut self, entries: Vec<(Vec<u8>, String)>) {
        self.entries = entries;
        self.pos = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_entries_in_order_then_stops() {
        let mut e = ExpiryEnumerator::new(vec![
            (b"k1".to_vec(), "a".to_string()),
            (b"k2".to_vec(), "b".to_string()),
        ]);
        assert!(e.next());
        assert_eq!(e.doc_id(), Some("a"));
        assert!(e.next());
        assert_eq!(e.doc_id(), Some("b"));
        assert!(!e.next());
        assert_eq!(e.doc_id(), None);
    }

    #[test]
    fn reset_rebuilds_entries_and_rewinds() {
        let mut e = ExpiryEnumerator::new(vec![(b"k1".to_vec(), "a".to_string())]);
        e.next();
        e.reset(vec![(b"k1".to_vec(), "a".to_string()), (b"k2".to_vec(), "b".to_string())]);
        assert_eq!(e.doc_id(), None);
        assert!(e.next());
        assert_eq!(e.doc_id(), Some("a"));
        assert!(e.next());
        assert_eq!(e.doc_id(), Some("b"));
    }
}
