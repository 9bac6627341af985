//! A single node of a document's revision tree.

use crate::doc::revid::RevID;
use serde_derive::{Deserialize, Serialize};

/// Bit flags carried by a [`Revision`].
pub mod flags {
    pub const DELETED: u8 = 1 << 0;
    pub const LEAF: u8 = 1 << 1;
    pub const NEW: u8 = 1 << 2;
    pub const HAS_ATTACHMENTS: u8 = 1 << 3;
}

/// Where a revision's body currently lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// Small body stored inline, alongside the revision metadata.
    Inline(Vec<u8>),
    /// Body lives in the overflow store under `(docID, sequence)`, not yet loaded.
    External,
    /// No body was ever recorded for this revision (e.g. a deletion tombstone).
    Empty,
    /// The body used to be external but has since been compacted away.
    Compacted,
}

/// One node in a document's rev-tree.
///
/// `parent` is an index into the owning [`crate::doc::document::VersionedDocument`]'s
/// revision arena, never a pointer -- this keeps grafting and pruning free of
/// cyclic-ownership concerns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Revision {
    pub rev_id: RevID,
    pub flags: u8,
    pub sequence: u64,
    pub parent: Option<usize>,
    pub body: Body,
}

impl Revision {
    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    pub fn is_leaf(&self) -> bool {
        self.flags & flags::LEAF != 0
    }

    pub fn is_new(&self) -> bool {
        self.flags & flags::NEW != 0
    }

    pub fn has_attachments(&self) -> bool {
        self.flags & flags::HAS_ATTACHMENTS != 0
    }

    pub fn generation(&self) -> u64 {
        self.rev_id.generation()
    }

    pub(crate) fn set_flag(&mut self, bit: u8, on: bool) {
        if on {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }
}
