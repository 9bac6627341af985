//! End-to-end scenarios exercising a [`Database`] end to end: saving and
//! reopening, conflicting branches, history merges, pruning, and expiry.

use docstore::database::Database;
use docstore::enumerator::{ContentOptions, DocEnumeratorOptions};
use docstore::storage::log_cask::LogCask;
use docstore::storage::memory::Memory;
use docstore::{RevID, VersionedDocument};

fn rid(s: &str) -> RevID {
    RevID::parse_ascii(s).unwrap()
}

#[test]
fn insert_save_and_reread_round_trips() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    assert!(!doc.exists());

    doc.insert(rid("1-aa"), Some(b"{\"v\":1}".to_vec()), false, false, None, false).unwrap();

    let txn = db.begin_transaction();
    db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    drop(txn);

    let reread = db.get_document("default", b"doc1").unwrap();
    assert!(reread.exists());
    assert_eq!(reread.rev_id().unwrap().to_ascii(), "1-aa");
    assert_eq!(reread.inline_body(), Some(b"{\"v\":1}".as_slice()));
    assert_eq!(db.document_count().unwrap(), 1);
}

#[test]
fn aborted_transaction_discards_writes() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();

    let txn = db.begin_transaction();
    db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    txn.abort();

    let reread = db.get_document("default", b"doc1").unwrap();
    assert!(!reread.exists());
    assert_eq!(db.document_count().unwrap(), 0);
}

#[test]
fn nested_transaction_abort_poisons_the_outer_commit() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();

    let outer = db.begin_transaction();
    db.save_document(&outer, &mut doc, "default", 0, None).unwrap();
    {
        let inner = db.begin_transaction();
        inner.abort();
    }
    drop(outer);

    let reread = db.get_document("default", b"doc1").unwrap();
    assert!(!reread.exists(), "an aborted nested frame must poison the outer commit");
}

#[test]
fn revision_chain_builds_up_across_saves() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();

    doc.insert(rid("1-aa"), Some(b"v1".to_vec()), false, false, None, false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("2-bb"), Some(b"v2".to_vec()), false, false, Some(&rid("1-aa")), false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let reread = db.get_document("default", b"doc1").unwrap();
    assert_eq!(reread.rev_id().unwrap().to_ascii(), "2-bb");
    assert_eq!(reread.revision_count(), 2);
    let parent = reread.current().unwrap().parent().unwrap();
    assert_eq!(parent.rev_id().to_ascii(), "1-aa");
}

#[test]
fn conflicting_branch_requires_allow_flag_and_flags_the_document() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
    doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let mut doc = db.get_document("default", b"doc1").unwrap();
    assert!(doc.insert(rid("2-zz"), None, false, false, Some(&rid("1-aa")), false).is_err());
    doc.insert(rid("2-zz"), None, false, false, Some(&rid("1-aa")), true).unwrap();
    assert!(doc.is_conflicted());

    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }
    let reread = db.get_document("default", b"doc1").unwrap();
    assert!(reread.is_conflicted());
}

#[test]
fn insert_history_merges_a_replicated_branch() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let mut doc = db.get_document("default", b"doc1").unwrap();
    let history = vec![rid("3-cc"), rid("2-bb"), rid("1-aa")];
    doc.insert_history(&history, Some(b"merged".to_vec()), false, false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let reread = db.get_document("default", b"doc1").unwrap();
    assert_eq!(reread.rev_id().unwrap().to_ascii(), "3-cc");
    assert_eq!(reread.revision_count(), 3);
}

#[test]
fn save_document_prunes_history_beyond_max_depth() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
    doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();
    doc.insert(rid("3-cc"), None, false, false, Some(&rid("2-bb")), false).unwrap();
    doc.insert(rid("4-dd"), None, false, false, Some(&rid("3-cc")), false).unwrap();

    let txn = db.begin_transaction();
    db.save_document(&txn, &mut doc, "default", 2, None).unwrap();
    drop(txn);

    let reread = db.get_document("default", b"doc1").unwrap();
    assert_eq!(reread.revision_count(), 2);
    assert!(reread.get(&rid("1-aa")).is_none());
    assert_eq!(reread.rev_id().unwrap().to_ascii(), "4-dd");
}

#[test]
fn large_bodies_are_relocated_to_the_overflow_store_and_read_back() {
    let db = Database::open_memory(false);
    let big = vec![b'x'; docstore::config::INLINE_BODY_MAX_BYTES + 1];
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), Some(big.clone()), false, false, None, false).unwrap();

    let txn = db.begin_transaction();
    db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    drop(txn);

    let mut reread = db.get_document("default", b"doc1").unwrap();
    assert!(reread.inline_body().is_none(), "oversized body must not stay inline");
    let idx = reread.current().unwrap().index();
    let body = db.read_body("default", &mut reread, idx).unwrap();
    assert_eq!(body, big);
}

#[test]
fn expiry_enumerator_lists_and_purges_expired_documents() {
    let db = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();

    let txn = db.begin_transaction();
    db.save_document(&txn, &mut doc, "default", 0, Some(1000.0)).unwrap();
    drop(txn);

    let mut expired = db.expiry_enumerator(2000.0).unwrap();
    assert!(expired.next());
    assert_eq!(expired.doc_id(), Some("doc1"));
    let key = expired.key().unwrap().to_vec();
    let id = expired.doc_id().unwrap().to_string();

    let txn = db.begin_transaction();
    db.purge_expiry(&txn, &key, &id).unwrap();
    drop(txn);

    let mut expired_again = db.expiry_enumerator(2000.0).unwrap();
    assert!(!expired_again.next());
}

#[test]
fn enumerate_by_key_range_skips_deleted_unless_asked() {
    let db = Database::open_memory(false);

    for (id, rev) in [("a", "1-11"), ("b", "1-22"), ("c", "1-33")] {
        let mut doc = db.get_document("default", id.as_bytes()).unwrap();
        doc.insert(rid(rev), Some(b"{}".to_vec()), false, false, None, false).unwrap();
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    }

    let mut b = db.get_document("default", b"b").unwrap();
    b.insert(rid("2-99"), None, true, false, Some(&rid("1-22")), false).unwrap();
    let txn = db.begin_transaction();
    db.save_document(&txn, &mut b, "default", 0, None).unwrap();
    drop(txn);

    let items: Vec<_> = db
        .enumerate_by_key_range("default", None, None, DocEnumeratorOptions::default())
        .unwrap()
        .collect();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.key != b"b"));

    let opts = DocEnumeratorOptions { include_deleted: true, content: ContentOptions::Full, ..Default::default() };
    let all: Vec<_> = db.enumerate_by_key_range("default", None, None, opts).unwrap().collect();
    assert_eq!(all.len(), 3);
}

#[test]
fn reopening_a_log_cask_backed_database_preserves_documents() {
    let dir = tempdir::TempDir::new("docstore-test").unwrap();
    let path = dir.path().join("store.db");

    {
        let engine = LogCask::new(path.clone()).unwrap();
        let db = Database::from_engine(engine, false);
        let mut doc = db.get_document("default", b"doc1").unwrap();
        doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
        drop(txn);
        db.close().unwrap();
    }

    let engine = LogCask::new(path).unwrap();
    let db = Database::from_engine(engine, false);
    let reread = db.get_document("default", b"doc1").unwrap();
    assert_eq!(reread.rev_id().unwrap().to_ascii(), "1-aa");
}

#[test]
fn dropping_a_transaction_without_abort_commits() {
    let db: Database<Memory> = Database::open_memory(false);
    let mut doc = db.get_document("default", b"doc1").unwrap();
    doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None).unwrap();
    } // commits here, on drop
    assert!(db.get_document("default", b"doc1").unwrap().exists());
}
