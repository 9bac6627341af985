//! Snapshot-at-construction enumeration over documents in a key or sequence
//! range. The snapshot is taken when the enumerator is built, under the
//! database's mutex; later mutations to the database are not observed,
//! matching the documented "define behavior if the store is mutated during
//! enumeration" choice of snapshotting rather than live-tailing.

use crate::doc::document::VersionedDocument;

/// Whether an enumerator resolves the current revision's body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentOptions {
    /// Rev-tree metadata only; no overflow-store fetch is attempted, so
    /// externally-stored bodies are left unresolved.
    MetaOnly,
    /// Eagerly resolve the current revision's body, fetching it from the
    /// overflow store if necessary.
    Full,
}

/// Options governing a [`crate::database::Database::enumerate_by_key_range`]
/// or [`crate::database::Database::enumerate_by_sequence_range`] call.
#[derive(Clone, Debug)]
pub struct DocEnumeratorOptions {
    pub skip: usize,
    pub descending: bool,
    pub inclusive_end: bool,
    pub include_deleted: bool,
    pub content: ContentOptions,
}

impl Default for DocEnumeratorOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            descending: false,
            inclusive_end: false,
            include_deleted: false,
            content: ContentOptions::MetaOnly,
        }
    }
}

/// One document yielded by a [`DocEnumerator`].
pub struct DocEnumeratorItem {
    pub key: Vec<u8>,
    pub document: VersionedDocument,
    /// The current revision's body, resolved only when the enumerator was
    /// built with [`ContentOptions::Full`].
    pub body: Option<Vec<u8>>,
}

/// An owned, already-filtered iterator over a database snapshot.
pub struct DocEnumerator {
    items: std::vec::IntoIter<DocEnumeratorItem>,
}

impl DocEnumerator {
    pub(crate) fn new(mut items: Vec<DocEnumeratorItem>, opts: &DocEnumeratorOptions) -> Self {
        if !opts.include_deleted {
            items.retain(|item| !item.document.is_deleted());
        }
        if opts.descending {
            items.reverse();
        }
        if opts.skip > 0 {
            items.drain(..opts.skip.min(items.len()));
        }
        Self { items: items.into_iter() }
    }
}

impl Iterator for DocEnumerator {
    type Item = DocEnumeratorItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}
