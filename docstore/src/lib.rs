//! A document-oriented storage façade over a pluggable ordered key-value
//! [`storage::engine::Engine`].
//!
//! A [`database::Database`] namespaces a single engine into logical
//! KeyStores, keeps each document's revision history in a
//! [`doc::document::VersionedDocument`] rev-tree, and layers nested
//! [`transaction::Transaction`]s and an expiry index
//! ([`expiry::ExpiryEnumerator`]) on top. See `SPEC_FULL.md` for the full
//! component design.

pub mod collation;
pub mod config;
pub mod database;
pub mod doc;
pub mod enumerator;
pub mod error;
pub mod expiry;
pub mod keycode;
pub mod logging;
pub mod storage;
pub mod transaction;

pub use database::Database;
pub use doc::document::{RevisionCursor, VersionedDocument};
pub use doc::revid::RevID;
pub use enumerator::{ContentOptions, DocEnumerator, DocEnumeratorItem, DocEnumeratorOptions};
pub use error::{CResult, Domain, Error};
pub use expiry::ExpiryEnumerator;
pub use storage::engine::Engine;
pub use storage::log_cask::LogCask;
pub use storage::memory::Memory;
pub use transaction::Transaction;
