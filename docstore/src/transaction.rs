//! A scoped handle proving a [`crate::database::Database`] transaction is
//! open. Transactions nest: [`Database::begin_transaction`] increments a
//! depth counter and only the outermost frame's drop (or explicit
//! [`Transaction::abort`]) actually commits or discards the accumulated
//! writes -- see `crate::database` for where that bookkeeping lives.
//!
//! [`Database::begin_transaction`]: crate::database::Database::begin_transaction

use crate::database::Database;
use crate::storage::engine::Engine;

/// Proof that a transaction is open on a particular [`Database`]. Database
/// mutators (`save_document`, `put_raw`, `purge_expiry`, ...) require one to
/// be passed in.
///
/// Commits on drop unless [`Transaction::abort`] was called first. Dropping
/// the outermost frame without an explicit abort is the common path: `let
/// txn = db.begin_transaction(); ...; // txn drops here, committing`.
pub struct Transaction<'db, E: Engine> {
    pub(crate) db: &'db Database<E>,
    finished: bool,
}

impl<'db, E: Engine> Transaction<'db, E> {
    pub(crate) fn new(db: &'db Database<E>) -> Self {
        Self { db, finished: false }
    }

    /// Aborts this frame, discarding every write made since the outermost
    /// `begin_transaction` if this is the last open frame, or poisoning the
    /// outer frames' eventual commit otherwise.
    pub fn abort(mut self) {
        self.db.end_transaction(false);
        self.finished = true;
    }
}

impl<'db, E: Engine> Drop for Transaction<'db, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.db.end_transaction(true);
            self.finished = true;
        }
    }
}
