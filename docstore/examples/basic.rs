//! Opens an in-memory database, saves a couple of document revisions, and
//! walks them back out through an enumerator.

use docstore::enumerator::DocEnumeratorOptions;
use docstore::{Database, RevID};
use docstore::storage::memory::Memory;

fn main() -> docstore::CResult<()> {
    docstore::logging::init_logging("info").ok();

    let db: Database<Memory> = Database::open_memory(false);

    let mut doc = db.get_document("default", b"user:42")?;
    doc.insert(
        RevID::parse_ascii("1-d34db33f")?,
        Some(br#"{"name":"ada"}"#.to_vec()),
        false,
        false,
        None,
        false,
    )?;
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None)?;
    }

    let mut doc = db.get_document("default", b"user:42")?;
    doc.insert(
        RevID::parse_ascii("2-cafef00d")?,
        Some(br#"{"name":"ada lovelace"}"#.to_vec()),
        false,
        false,
        Some(&RevID::parse_ascii("1-d34db33f")?),
        false,
    )?;
    {
        let txn = db.begin_transaction();
        db.save_document(&txn, &mut doc, "default", 0, None)?;
    }

    println!("document count: {}", db.document_count()?);

    for item in db.enumerate_by_key_range("default", None, None, DocEnumeratorOptions::default())? {
        let rev_id = item.document.rev_id().map(|r| r.to_ascii()).unwrap_or_default();
        println!("{} @ {}", String::from_utf8_lossy(&item.key), rev_id);
    }

    Ok(())
}
