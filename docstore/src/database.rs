//! The top-level façade: one [`Database`] owns a single underlying
//! [`Engine`], serialized behind a mutex, and namespaces it into logical
//! KeyStores via [`crate::keycode`].
//!
//! The underlying [`Engine`] has no notion of transactions of its own --
//! it is a plain ordered get/set/scan store. Atomicity and isolation for
//! [`crate::transaction::Transaction`] are built on top here: writes made
//! inside a transaction accumulate in an in-memory `pending` overlay and are
//! only applied to the engine (and flushed, per `WAL_FLUSH_BEFORE_COMMIT`)
//! when the outermost transaction frame commits.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};

use crate::collation;
use crate::config::{EngineConfig, INLINE_BODY_MAX_BYTES};
use crate::doc::document::VersionedDocument;
use crate::enumerator::{DocEnumerator, DocEnumeratorItem, DocEnumeratorOptions};
use crate::error::{CResult, Error};
use crate::expiry::ExpiryEnumerator;
use crate::keycode;
use crate::storage::engine::Engine;
use crate::storage::log_cask::LogCask;
use crate::storage::memory::Memory;
use crate::transaction::Transaction;

/// The KeyStore documents are saved to unless the caller asks for another.
pub const DEFAULT_STORE: &str = "default";

/// The KeyStore backing [`Database::expiry_enumerator`] and friends.
pub const EXPIRY_STORE: &str = "expiry";

/// The on-disk shape of one KeyStore record: opaque rev-tree metadata plus
/// the current revision's body, when it is small enough to travel inline.
#[derive(Serialize, Deserialize)]
struct RecordValue {
    meta: Vec<u8>,
    body: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) enum PendingValue {
    Set(Vec<u8>),
    Delete,
}

pub(crate) struct DbState<E: Engine> {
    engine: E,
    tx_depth: u32,
    nested_abort: bool,
    pending: BTreeMap<Vec<u8>, PendingValue>,
    /// `last_sequence` as of the start of the outermost transaction, restored
    /// verbatim on abort.
    sequence_snapshot: Option<HashMap<String, u64>>,
    last_sequence: HashMap<String, u64>,
}

/// A document store: a single ordered key-value [`Engine`] namespaced into
/// logical KeyStores, with nested-transaction and expiry-index support layered
/// on top.
pub struct Database<E: Engine> {
    pub(crate) state: Mutex<DbState<E>>,
    config: EngineConfig,
}

impl Database<LogCask> {
    /// Opens (or creates) a database backed by a log-structured file engine.
    ///
    /// A read-only open requires the file to already exist, since the
    /// underlying engine has no way to open a file without also being able
    /// to create it.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> CResult<Self> {
        let path = path.as_ref();
        if read_only && !path.exists() {
            return Err(Error::NotFound(format!("database file not found: {}", path.display())));
        }
        let engine = LogCask::new(PathBuf::from(path))?;
        info!("opened database at {} (read_only={})", path.display(), read_only);
        Ok(Self::from_engine(engine, read_only))
    }
}

impl Database<Memory> {
    /// Opens an in-memory database, useful for tests and scratch sessions.
    pub fn open_memory(read_only: bool) -> Self {
        Self::from_engine(Memory::new(), read_only)
    }
}

impl<E: Engine> Database<E> {
    /// Wraps an already-open engine. Exposed so callers can plug in a custom
    /// [`Engine`] implementation.
    pub fn from_engine(engine: E, read_only: bool) -> Self {
        Self {
            state: Mutex::new(DbState {
                engine,
                tx_depth: 0,
                nested_abort: false,
                pending: BTreeMap::new(),
                sequence_snapshot: None,
                last_sequence: HashMap::new(),
            }),
            config: EngineConfig::new(read_only),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn check_transaction(&self, txn: &Transaction<'_, E>) -> CResult<()> {
        if !std::ptr::eq(self, txn.db) {
            return Err(Error::Internal("transaction belongs to a different database".into()));
        }
        Ok(())
    }

    /// Closes the database. Panics if a transaction is still open, mirroring
    /// the "close while write in progress" precondition violation.
    pub fn close(self) -> CResult<()> {
        let mut state = self.state.into_inner().map_err(|_| {
            warn!("database mutex was poisoned by a prior panic");
            Error::Unknown("poisoned database mutex".into())
        })?;
        if state.tx_depth != 0 {
            panic!("Database::close called with a transaction still open");
        }
        state.engine.status().ok();
        Ok(())
    }

    /// Number of documents in the default store whose current revision is
    /// not a deletion tombstone.
    pub fn document_count(&self) -> CResult<u64> {
        self.document_count_in(DEFAULT_STORE)
    }

    pub fn document_count_in(&self, store: &str) -> CResult<u64> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        let prefix = keycode::record_prefix(store);
        let end = keycode::prefix_end(&prefix);
        let items = physical_scan(&mut state, (Bound::Included(prefix), end))?;
        let mut count = 0u64;
        for (_, raw) in items {
            let record: RecordValue = bincode::deserialize(&raw)?;
            let doc = VersionedDocument::from_meta(Vec::new(), &record.meta)?;
            if doc.exists() && !doc.is_deleted() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// The highest sequence number assigned within `store` so far.
    pub fn last_sequence(&self, store: &str) -> CResult<u64> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        compute_last_sequence(&mut state, store)
    }

    /// Begins a transaction. Nested calls increment a depth counter; only the
    /// outermost frame's commit/abort actually touches the engine. Returns a
    /// handle that commits on drop unless [`Transaction::abort`] was called.
    pub fn begin_transaction(&self) -> Transaction<'_, E> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        if state.tx_depth == 0 {
            state.sequence_snapshot = Some(state.last_sequence.clone());
        }
        state.tx_depth += 1;
        debug!("begin_transaction depth={}", state.tx_depth);
        Transaction::new(self)
    }

    /// Ends the innermost open transaction frame. Panics if none is open,
    /// per the nested-counter precondition.
    pub(crate) fn end_transaction(&self, commit: bool) {
        let mut state = self.state.lock().expect("database mutex poisoned");
        if state.tx_depth == 0 {
            panic!("end_transaction called with no transaction open");
        }
        if !commit {
            state.nested_abort = true;
        }
        state.tx_depth -= 1;
        if state.tx_depth > 0 {
            debug!("end_transaction nested, depth={}", state.tx_depth);
            return;
        }

        if state.nested_abort {
            warn!("transaction aborted, discarding {} pending writes", state.pending.len());
            state.pending.clear();
            if let Some(snapshot) = state.sequence_snapshot.take() {
                state.last_sequence = snapshot;
            }
        } else {
            let pending = std::mem::take(&mut state.pending);
            for (key, value) in pending {
                let result = match value {
                    PendingValue::Set(v) => state.engine.set(&key, v),
                    PendingValue::Delete => state.engine.delete(&key),
                };
                if let Err(err) = result {
                    warn!("transaction commit failed applying a write: {}", err);
                }
            }
            if self.config.wal_flush_before_commit {
                if let Err(err) = state.engine.flush() {
                    warn!("flush after commit failed: {}", err);
                }
            }
            state.sequence_snapshot = None;
            debug!("transaction committed");
        }
        state.nested_abort = false;
    }

    /// Reads a raw (non-document) record from `store`.
    pub fn get_raw(&self, store: &str, key: &[u8]) -> CResult<(Vec<u8>, Vec<u8>)> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        let phys = keycode::record_key(store, key);
        match physical_get(&mut state, &phys)? {
            None => Err(Error::NotFound(format!("no record for key in store {}", store))),
            Some(raw) => {
                let record: RecordValue = bincode::deserialize(&raw)?;
                Ok((record.meta, record.body))
            }
        }
    }

    /// Writes (or, if both `meta` and `body` are empty, deletes) a raw record.
    /// Must be called with an open transaction.
    pub fn put_raw(&self, txn: &Transaction<'_, E>, store: &str, key: &[u8], meta: Vec<u8>, body: Vec<u8>) -> CResult<()> {
        self.check_transaction(txn)?;
        let mut state = self.state.lock().expect("database mutex poisoned");
        require_transaction(&state)?;
        let phys = keycode::record_key(store, key);
        if meta.is_empty() && body.is_empty() {
            physical_delete(&mut state, phys);
        } else {
            let record = RecordValue { meta, body };
            physical_set(&mut state, phys, bincode::serialize(&record)?);
        }
        Ok(())
    }

    /// Reads a document by id from `store`, or an empty [`VersionedDocument`]
    /// if none exists.
    pub fn get_document(&self, store: &str, doc_id: &[u8]) -> CResult<VersionedDocument> {
        let mut state = self.state.lock().expect("database mutex poisoned");
        let phys = keycode::record_key(store, doc_id);
        match physical_get(&mut state, &phys)? {
            None => Ok(VersionedDocument::new(doc_id.to_vec())),
            Some(raw) => {
                let record: RecordValue = bincode::deserialize(&raw)?;
                VersionedDocument::from_meta(doc_id.to_vec(), &record.meta)
            }
        }
    }

    /// Saves a dirty document: assigns sequence numbers to its new revisions,
    /// relocates oversized or non-winning bodies to the overflow store,
    /// prunes history past `max_depth` (0 disables pruning), and optionally
    /// schedules an expiry. Must be called with an open transaction. A no-op
    /// if the document has no pending changes.
    pub fn save_document(
        &self,
        txn: &Transaction<'_, E>,
        doc: &mut VersionedDocument,
        store: &str,
        max_depth: u32,
        expire_at: Option<f64>,
    ) -> CResult<()> {
        self.check_transaction(txn)?;
        if !doc.is_dirty() {
            return Ok(());
        }
        doc.prune(max_depth);

        let mut state = self.state.lock().expect("database mutex poisoned");
        require_transaction(&state)?;

        let store_owned = store.to_string();
        let assigned = doc.assign_sequences(|| next_sequence(&mut state, &store_owned))?;

        let winner = doc.current_index();
        for idx in assigned {
            let seq = doc.revision_at(idx).sequence;
            physical_set(&mut state, keycode::seq_index_key(store, seq), doc.doc_id().to_vec());

            if let Some(body) = doc.take_inline_body_if_any(idx) {
                if body.is_empty() {
                    // leave as Empty
                } else if Some(idx) == winner && body.len() <= INLINE_BODY_MAX_BYTES {
                    doc.restore_inline_body(idx, body);
                } else {
                    physical_set(&mut state, keycode::body_key(store, doc.doc_id(), seq), body);
                    doc.mark_external(idx);
                }
            }
        }

        let meta = doc.to_meta_bytes()?;
        let body = doc.inline_body().map(|b| b.to_vec()).unwrap_or_default();
        let record = RecordValue { meta, body };
        physical_set(&mut state, keycode::record_key(store, doc.doc_id()), bincode::serialize(&record)?);

        clear_expiry(&mut state, doc.doc_id())?;
        if let Some(at) = expire_at {
            write_expiry(&mut state, doc.doc_id(), at)?;
        }

        info!("saved document {:?} in store {}", String::from_utf8_lossy(doc.doc_id()), store);
        Ok(())
    }

    /// Fetches a revision's body, loading it from the overflow store if it
    /// was previously externalized. Returns `Gone` if the body was compacted
    /// away.
    pub fn read_body(&self, store: &str, doc: &mut VersionedDocument, index: usize) -> CResult<Vec<u8>> {
        match doc.revision_at(index).body.clone() {
            crate::doc::revision::Body::Inline(b) => Ok(b),
            crate::doc::revision::Body::Empty => Ok(Vec::new()),
            crate::doc::revision::Body::Compacted => {
                Err(Error::Gone(format!("revision body has been compacted: {}", doc.revision_at(index).rev_id)))
            }
            crate::doc::revision::Body::External => {
                let mut state = self.state.lock().expect("database mutex poisoned");
                let seq = doc.revision_at(index).sequence;
                let key = keycode::body_key(store, doc.doc_id(), seq);
                match physical_get(&mut state, &key)? {
                    Some(bytes) => Ok(bytes),
                    None => {
                        drop(state);
                        doc.mark_compacted(index);
                        Err(Error::Gone(format!(
                            "external body missing for revision {}, treating as compacted",
                            doc.revision_at(index).rev_id
                        )))
                    }
                }
            }
        }
    }

    /// Enumerates documents in `store` by doc-id range. `start`/`end` of
    /// `None` are unbounded on that side.
    pub fn enumerate_by_key_range(
        &self,
        store: &str,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        opts: DocEnumeratorOptions,
    ) -> CResult<DocEnumerator> {
        let prefix = keycode::record_prefix(store);
        let lo = match start {
            Some(k) => Bound::Included(keycode::record_key(store, k)),
            None => Bound::Included(prefix.clone()),
        };
        let hi = match end {
            Some(k) if opts.inclusive_end => Bound::Included(keycode::record_key(store, k)),
            Some(k) => Bound::Excluded(keycode::record_key(store, k)),
            None => keycode::prefix_end(&prefix),
        };

        let mut state = self.state.lock().expect("database mutex poisoned");
        let items = physical_scan(&mut state, (lo, hi))?;
        let mut out = Vec::with_capacity(items.len());
        for (phys_key, raw) in items {
            let doc_id = keycode::strip_record_prefix(store, &phys_key);
            let record: RecordValue = bincode::deserialize(&raw)?;
            let mut doc = VersionedDocument::from_meta(doc_id.clone(), &record.meta)?;
            let body = resolve_body(&mut state, store, &mut doc, opts.content)?;
            out.push(DocEnumeratorItem { key: doc_id, document: doc, body });
        }
        Ok(DocEnumerator::new(out, &opts))
    }

    /// Enumerates documents in `store` by sequence range (inclusive of
    /// `start_seq`). `end_seq` of `None` is unbounded.
    pub fn enumerate_by_sequence_range(
        &self,
        store: &str,
        start_seq: u64,
        end_seq: Option<u64>,
        opts: DocEnumeratorOptions,
    ) -> CResult<DocEnumerator> {
        let lo = Bound::Included(keycode::seq_index_key(store, start_seq));
        let hi = match end_seq {
            Some(s) if opts.inclusive_end => Bound::Included(keycode::seq_index_key(store, s)),
            Some(s) => Bound::Excluded(keycode::seq_index_key(store, s)),
            None => keycode::prefix_end(&keycode::seq_index_prefix(store)),
        };

        let mut state = self.state.lock().expect("database mutex poisoned");
        let seq_items = physical_scan(&mut state, (lo, hi))?;
        let mut out = Vec::with_capacity(seq_items.len());
        for (_, doc_id) in seq_items {
            let phys = keycode::record_key(store, &doc_id);
            let raw = match physical_get(&mut state, &phys)? {
                Some(raw) => raw,
                None => continue, // record was deleted after the seq-index entry was written
            };
            let record: RecordValue = bincode::deserialize(&raw)?;
            let mut doc = VersionedDocument::from_meta(doc_id.clone(), &record.meta)?;
            let body = resolve_body(&mut state, store, &mut doc, opts.content)?;
            out.push(DocEnumeratorItem { key: doc_id, document: doc, body });
        }
        Ok(DocEnumerator::new(out, &opts))
    }

    /// Builds an enumerator over documents whose expiry has passed `now`.
    pub fn expiry_enumerator(&self, now: f64) -> CResult<ExpiryEnumerator> {
        Ok(ExpiryEnumerator::new(self.collect_expiry_entries(now)?))
    }

    /// Rebuilds `enumerator` against a fresh `now` snapshot, replacing its
    /// entries and rewinding it. Unlike [`Self::expiry_enumerator`] this
    /// reuses the caller's existing [`ExpiryEnumerator`] rather than handing
    /// back a new one.
    pub fn reset_expiry_enumerator(&self, enumerator: &mut ExpiryEnumerator, now: f64) -> CResult<()> {
        enumerator.reset(self.collect_expiry_entries(now)?);
        Ok(())
    }

    fn collect_expiry_entries(&self, now: f64) -> CResult<Vec<(Vec<u8>, String)>> {
        let store = forward_store();
        let prefix = keycode::record_prefix(&store);
        let hi = collation::encode_expiry_key(now, "\u{10ffff}");
        let mut state = self.state.lock().expect("database mutex poisoned");
        let items = physical_scan(
            &mut state,
            (Bound::Included(prefix.clone()), Bound::Excluded(keycode::record_key(&store, &hi))),
        )?;
        drop(state);

        let mut entries = Vec::with_capacity(items.len());
        for (phys_key, _) in items {
            let forward_key = keycode::strip_record_prefix(&store, &phys_key);
            let (ts, doc_id) = collation::decode_expiry_key(&forward_key)?;
            if ts <= now {
                entries.push((forward_key, doc_id));
            }
        }
        Ok(entries)
    }

    /// Deletes the forward and reverse expiry-index entries for one expired
    /// document. Must be called with an open transaction; does not touch the
    /// document record itself.
    pub fn purge_expiry(&self, txn: &Transaction<'_, E>, forward_key: &[u8], doc_id: &str) -> CResult<()> {
        self.check_transaction(txn)?;
        let mut state = self.state.lock().expect("database mutex poisoned");
        require_transaction(&state)?;
        physical_delete(&mut state, keycode::record_key(&forward_store(), forward_key));
        physical_delete(&mut state, keycode::record_key(&reverse_store(), doc_id.as_bytes()));
        Ok(())
    }
}

fn resolve_body<E: Engine>(
    state: &mut DbState<E>,
    store: &str,
    doc: &mut VersionedDocument,
    content: crate::enumerator::ContentOptions,
) -> CResult<Option<Vec<u8>>> {
    if content != crate::enumerator::ContentOptions::Full {
        return Ok(None);
    }
    let idx = match doc.current_index() {
        Some(idx) => idx,
        None => return Ok(None),
    };
    match doc.revision_at(idx).body.clone() {
        crate::doc::revision::Body::Inline(b) => Ok(Some(b)),
        crate::doc::revision::Body::Empty => Ok(Some(Vec::new())),
        crate::doc::revision::Body::Compacted => Ok(None),
        crate::doc::revision::Body::External => {
            let seq = doc.revision_at(idx).sequence;
            let key = keycode::body_key(store, doc.doc_id(), seq);
            match physical_get(state, &key)? {
                Some(bytes) => Ok(Some(bytes)),
                None => {
                    doc.mark_compacted(idx);
                    Ok(None)
                }
            }
        }
    }
}

fn require_transaction<E: Engine>(state: &DbState<E>) -> CResult<()> {
    if state.tx_depth == 0 {
        return Err(Error::Internal("operation requires an open transaction".into()));
    }
    Ok(())
}

pub(crate) fn physical_get<E: Engine>(state: &mut DbState<E>, key: &[u8]) -> CResult<Option<Vec<u8>>> {
    if let Some(pv) = state.pending.get(key) {
        return Ok(match pv {
            PendingValue::Set(v) => Some(v.clone()),
            PendingValue::Delete => None,
        });
    }
    state.engine.get(key)
}

pub(crate) fn physical_scan<E: Engine>(
    state: &mut DbState<E>,
    range: (Bound<Vec<u8>>, Bound<Vec<u8>>),
) -> CResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
    for item in state.engine.scan_dyn(range.clone()) {
        let (k, v) = item?;
        merged.insert(k, Some(v));
    }
    for (k, pv) in state.pending.range(range) {
        match pv {
            PendingValue::Set(v) => {
                merged.insert(k.clone(), Some(v.clone()));
            }
            PendingValue::Delete => {
                merged.insert(k.clone(), None);
            }
        }
    }
    Ok(merged.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
}

pub(crate) fn physical_set<E: Engine>(state: &mut DbState<E>, key: Vec<u8>, value: Vec<u8>) {
    state.pending.insert(key, PendingValue::Set(value));
}

pub(crate) fn physical_delete<E: Engine>(state: &mut DbState<E>, key: Vec<u8>) {
    state.pending.insert(key, PendingValue::Delete);
}

fn compute_last_sequence<E: Engine>(state: &mut DbState<E>, store: &str) -> CResult<u64> {
    if let Some(&v) = state.last_sequence.get(store) {
        return Ok(v);
    }
    let prefix = keycode::seq_index_prefix(store);
    let end = keycode::prefix_end(&prefix);
    let items = physical_scan(state, (Bound::Included(prefix), end))?;
    let max = items
        .iter()
        .filter_map(|(k, _)| {
            let tail = &k[k.len() - 8..];
            Some(u64::from_be_bytes(tail.try_into().ok()?))
        })
        .max()
        .unwrap_or(0);
    state.last_sequence.insert(store.to_string(), max);
    Ok(max)
}

pub(crate) fn next_sequence<E: Engine>(state: &mut DbState<E>, store: &str) -> CResult<u64> {
    let current = compute_last_sequence(state, store)?;
    let next = current + 1;
    state.last_sequence.insert(store.to_string(), next);
    Ok(next)
}

pub(crate) fn write_expiry<E: Engine>(state: &mut DbState<E>, doc_id: &[u8], at: f64) -> CResult<()> {
    let doc_id_str = String::from_utf8_lossy(doc_id).into_owned();
    let forward = collation::encode_expiry_key(at, &doc_id_str);
    physical_set(state, keycode::record_key(&forward_store(), &forward), doc_id.to_vec());
    physical_set(state, keycode::record_key(&reverse_store(), doc_id), forward);
    Ok(())
}

pub(crate) fn clear_expiry<E: Engine>(state: &mut DbState<E>, doc_id: &[u8]) -> CResult<()> {
    if let Some(old_forward) = physical_get(state, &keycode::record_key(&reverse_store(), doc_id))? {
        physical_delete(state, keycode::record_key(&forward_store(), &old_forward));
        physical_delete(state, keycode::record_key(&reverse_store(), doc_id));
    }
    Ok(())
}

pub(crate) fn forward_store() -> String {
    format!("{}#fwd", EXPIRY_STORE)
}

pub(crate) fn reverse_store() -> String {
    format!("{}#rev", EXPIRY_STORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;

    #[test]
    fn open_memory_starts_empty() {
        let db = Database::open_memory(false);
        assert_eq!(db.document_count().unwrap(), 0);
        assert_eq!(db.last_sequence(DEFAULT_STORE).unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "end_transaction called with no transaction open")]
    fn ending_a_transaction_at_depth_zero_panics() {
        let db: Database<Memory> = Database::open_memory(false);
        db.end_transaction(true);
    }

    #[test]
    fn require_transaction_rejects_a_database_with_no_open_frame() {
        let db = Database::open_memory(false);
        let state = db.state.lock().unwrap();
        assert!(require_transaction(&state).is_err());
    }

    #[test]
    fn require_transaction_accepts_an_open_frame() {
        let db = Database::open_memory(false);
        let txn = db.begin_transaction();
        {
            let state = db.state.lock().unwrap();
            assert!(require_transaction(&state).is_ok());
        }
        drop(txn);
    }
}
