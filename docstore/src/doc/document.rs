//! The in-memory representation of one logical document: its id, a rev-tree
//! of [`Revision`] nodes, aggregate flags, doc-type, and a dirty bit.
//!
//! Revisions are held in a flat arena (`Vec<Revision>`) owned by the
//! document; `Revision::parent` is an index into that arena rather than a
//! pointer, so grafting (`insert_history`) and pruning never have to reason
//! about cyclic ownership. Callers walk the tree through [`RevisionCursor`],
//! a non-owning view that borrows the document.

use crate::doc::revid::RevID;
use crate::doc::revision::{flags as rev_flags, Body, Revision};
use crate::error::{CResult, Error};
use serde_derive::{Deserialize, Serialize};

/// Bit flags carried by a [`VersionedDocument`].
pub mod flags {
    pub const EXISTS: u8 = 1 << 0;
    pub const DELETED: u8 = 1 << 1;
    pub const CONFLICTED: u8 = 1 << 2;
    pub const HAS_ATTACHMENTS: u8 = 1 << 3;
}

/// Serialized form of the rev-tree, written as the record's `meta` bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct DocMeta {
    pub doc_type: Option<Vec<u8>>,
    pub revisions: Vec<Revision>,
}

/// The in-memory representation of one logical document.
#[derive(Clone, Debug)]
pub struct VersionedDocument {
    doc_id: Vec<u8>,
    revisions: Vec<Revision>,
    current: Option<usize>,
    flags: u8,
    doc_type: Option<Vec<u8>>,
    dirty: bool,
    /// The winning revision's sequence, mirrored here for cheap access.
    sequence: u64,
}

impl VersionedDocument {
    /// Constructs an empty, non-existent document with the given id.
    pub fn new(doc_id: impl Into<Vec<u8>>) -> Self {
        Self {
            doc_id: doc_id.into(),
            revisions: Vec::new(),
            current: None,
            flags: 0,
            doc_type: None,
            dirty: false,
            sequence: 0,
        }
    }

    /// Rebuilds a document from its serialized rev-tree metadata blob. Any
    /// revision whose body was small enough to stay inline carries its bytes
    /// directly in the deserialized tree; external/compacted bodies are
    /// fetched on demand via [`crate::database::Database::read_body`].
    pub(crate) fn from_meta(doc_id: Vec<u8>, meta_bytes: &[u8]) -> CResult<Self> {
        let meta: DocMeta = bincode::deserialize(meta_bytes)?;
        let mut doc = Self {
            doc_id,
            revisions: meta.revisions,
            current: None,
            flags: flags::EXISTS,
            doc_type: meta.doc_type,
            dirty: false,
            sequence: 0,
        };
        doc.recompute_winner();
        Ok(doc)
    }

    pub(crate) fn to_meta_bytes(&self) -> CResult<Vec<u8>> {
        let meta = DocMeta { doc_type: self.doc_type.clone(), revisions: self.revisions.clone() };
        Ok(bincode::serialize(&meta)?)
    }

    pub fn doc_id(&self) -> &[u8] {
        &self.doc_id
    }

    pub fn exists(&self) -> bool {
        self.flags & flags::EXISTS != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & flags::DELETED != 0
    }

    pub fn is_conflicted(&self) -> bool {
        self.flags & flags::CONFLICTED != 0
    }

    pub fn has_attachments(&self) -> bool {
        self.flags & flags::HAS_ATTACHMENTS != 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn doc_type(&self) -> Option<&[u8]> {
        self.doc_type.as_deref()
    }

    pub fn set_doc_type(&mut self, doc_type: Option<Vec<u8>>) {
        self.doc_type = doc_type;
        self.dirty = true;
    }

    /// The current (winning) revision's id, if the document has any revisions.
    pub fn rev_id(&self) -> Option<&RevID> {
        self.current.map(|i| &self.revisions[i].rev_id)
    }

    /// A non-owning cursor onto the current (winning) revision.
    pub fn current(&self) -> Option<RevisionCursor<'_>> {
        self.current.map(|index| RevisionCursor { doc: self, index })
    }

    /// A non-owning cursor onto the first revision in arena order -- the
    /// starting point for a fresh pre-order traversal via [`RevisionCursor::next`].
    pub fn first(&self) -> Option<RevisionCursor<'_>> {
        if self.revisions.is_empty() {
            None
        } else {
            Some(RevisionCursor { doc: self, index: 0 })
        }
    }

    /// Looks up a revision by id.
    pub fn get(&self, rev_id: &RevID) -> Option<RevisionCursor<'_>> {
        self.revisions
            .iter()
            .position(|r| &r.rev_id == rev_id)
            .map(|index| RevisionCursor { doc: self, index })
    }

    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    fn find_index(&self, rev_id: &RevID) -> Option<usize> {
        self.revisions.iter().position(|r| &r.rev_id == rev_id)
    }

    /// Recomputes the winning revision and the document's aggregate flags.
    /// Winner order: non-deleted before deleted, then higher generation,
    /// then lexicographically larger digest.
    fn recompute_winner(&mut self) {
        let mut best: Option<usize> = None;
        let mut non_deleted_leaves = 0usize;
        for (i, rev) in self.revisions.iter().enumerate() {
            if !rev.is_leaf() {
                continue;
            }
            if !rev.is_deleted() {
                non_deleted_leaves += 1;
            }
            best = Some(match best {
                None => i,
                Some(b) => {
                    if Self::is_better(rev, &self.revisions[b]) {
                        i
                    } else {
                        b
                    }
                }
            });
        }

        self.current = best;
        self.flags |= flags::EXISTS;
        self.flags &= !(flags::DELETED | flags::CONFLICTED | flags::HAS_ATTACHMENTS);
        if let Some(idx) = best {
            let rev = &self.revisions[idx];
            if rev.is_deleted() {
                self.flags |= flags::DELETED;
            }
            if rev.has_attachments() {
                self.flags |= flags::HAS_ATTACHMENTS;
            }
            self.sequence = rev.sequence;
        }
        if non_deleted_leaves > 1 {
            self.flags |= flags::CONFLICTED;
        }
    }

    /// True if `a` should be preferred over `b` as the current revision.
    fn is_better(a: &Revision, b: &Revision) -> bool {
        match (a.is_deleted(), b.is_deleted()) {
            (false, true) => return true,
            (true, false) => return false,
            _ => {}
        }
        a.rev_id.cmp(&b.rev_id) == std::cmp::Ordering::Greater
    }

    /// Inserts a new revision as a child of `parent`. See module docs for
    /// the exact rule ordering.
    pub fn insert(
        &mut self,
        new_rev_id: RevID,
        body: Option<Vec<u8>>,
        deleted: bool,
        has_attachments: bool,
        parent: Option<&RevID>,
        allow_conflict: bool,
    ) -> CResult<RevisionCursor<'_>> {
        // Rule 1: idempotent re-insert.
        if let Some(existing_idx) = self.find_index(&new_rev_id) {
            let existing_body_matches = match (&self.revisions[existing_idx].body, &body) {
                (Body::Inline(existing), Some(requested)) => existing == requested,
                (Body::Inline(_), None) => false,
                (Body::Empty, Some(requested)) => requested.is_empty(),
                (Body::Empty, None) => true,
                (Body::External, None) | (Body::Compacted, None) => true,
                // The existing body lives outside the arena (or was
                // compacted away) and isn't loaded here, so its content
                // can't be compared against `requested`. Treat this as a
                // conflict rather than silently accepting a possibly
                // different body.
                (Body::External, Some(_)) | (Body::Compacted, Some(_)) => false,
            };
            if !existing_body_matches {
                return Err(Error::Conflict(format!(
                    "revision {} already exists with a different body",
                    new_rev_id
                )));
            }
            return Ok(RevisionCursor { doc: self, index: existing_idx });
        }

        let parent_idx = match parent {
            Some(parent_id) => {
                let idx = self
                    .find_index(parent_id)
                    .ok_or_else(|| Error::BadRequest(format!("no such parent revision: {}", parent_id)))?;
                // Rule 3
                if !self.revisions[idx].is_leaf() && !allow_conflict {
                    return Err(Error::Conflict(format!(
                        "revision {} is not a leaf",
                        parent_id
                    )));
                }
                // Rule 4
                if self.revisions[idx].generation() + 1 != new_rev_id.generation() {
                    return Err(Error::BadRequest(format!(
                        "new revision {} is not a direct child of {}",
                        new_rev_id, parent_id
                    )));
                }
                Some(idx)
            }
            None => {
                // Rule 2
                let has_current_non_deleted =
                    self.current.map(|i| !self.revisions[i].is_deleted()).unwrap_or(false);
                if has_current_non_deleted && !allow_conflict {
                    return Err(Error::Conflict(
                        "document already has a current revision".into(),
                    ));
                }
                if new_rev_id.generation() != 1 {
                    return Err(Error::BadRequest(
                        "a root revision must have generation 1".into(),
                    ));
                }
                None
            }
        };

        let mut new_flags = rev_flags::LEAF | rev_flags::NEW;
        if deleted {
            new_flags |= rev_flags::DELETED;
        }
        if has_attachments {
            new_flags |= rev_flags::HAS_ATTACHMENTS;
        }

        let new_body = match body {
            Some(b) => Body::Inline(b),
            None => Body::Empty,
        };

        self.revisions.push(Revision {
            rev_id: new_rev_id,
            flags: new_flags,
            sequence: 0,
            parent: parent_idx,
            body: new_body,
        });
        let new_idx = self.revisions.len() - 1;

        if let Some(idx) = parent_idx {
            self.revisions[idx].set_flag(rev_flags::LEAF, false);
        }

        self.recompute_winner();
        self.dirty = true;
        Ok(RevisionCursor { doc: self, index: new_idx })
    }

    /// Merges a history vector (newest first) into the tree, grafting
    /// whichever prefix isn't already present. Returns the index within
    /// `history` of the common ancestor, or `history.len()` if the chain
    /// was grafted as an entirely new branch.
    pub fn insert_history(
        &mut self,
        history: &[RevID],
        body: Option<Vec<u8>>,
        deleted: bool,
        has_attachments: bool,
    ) -> CResult<usize> {
        if history.is_empty() {
            return Err(Error::BadRequest("empty history".into()));
        }

        for pair in history.windows(2) {
            if pair[1].generation() >= pair[0].generation() {
                return Err(Error::BadRequest(
                    "history generations must strictly decrease from newest to oldest".into(),
                ));
            }
        }

        let ancestor_pos = history.iter().position(|id| self.find_index(id).is_some());
        let common_ancestor_index = ancestor_pos.unwrap_or(history.len());

        // Nothing to do: the newest entry is already present.
        if common_ancestor_index == 0 {
            return Ok(0);
        }

        // `attach_to` is the arena index new nodes get grafted onto; None for a fresh root.
        let mut attach_to: Option<usize> = match ancestor_pos {
            Some(pos) => self.find_index(&history[pos]),
            None => None,
        };

        // Insert history[new_count-1 ..= 0] oldest-to-newest so each parent exists
        // before its child is appended.
        let new_count = common_ancestor_index;
        for i in (0..new_count).rev() {
            let rev_id = history[i].clone();
            if let Some(parent_idx) = attach_to {
                if self.revisions[parent_idx].generation() + 1 != rev_id.generation() {
                    return Err(Error::BadRequest(format!(
                        "history entry {} does not follow its ancestor",
                        rev_id
                    )));
                }
            } else if rev_id.generation() != 1 {
                return Err(Error::BadRequest(
                    "root of a grafted history must have generation 1".into(),
                ));
            }

            let is_tip = i == 0;
            let mut new_flags = rev_flags::NEW;
            if is_tip {
                new_flags |= rev_flags::LEAF;
                if deleted {
                    new_flags |= rev_flags::DELETED;
                }
                if has_attachments {
                    new_flags |= rev_flags::HAS_ATTACHMENTS;
                }
            }
            let new_body = if is_tip {
                match &body {
                    Some(b) => Body::Inline(b.clone()),
                    None => Body::Empty,
                }
            } else {
                Body::Empty
            };

            self.revisions.push(Revision {
                rev_id,
                flags: new_flags,
                sequence: 0,
                parent: attach_to,
                body: new_body,
            });
            let new_idx = self.revisions.len() - 1;
            if let Some(parent_idx) = attach_to {
                self.revisions[parent_idx].set_flag(rev_flags::LEAF, false);
            }
            attach_to = Some(new_idx);
        }

        self.recompute_winner();
        self.dirty = true;
        Ok(common_ancestor_index)
    }

    /// Removes revisions further than `max_depth - 1` from the nearest leaf
    /// in their branch. Never removes a leaf. `max_depth == 0` disables pruning.
    pub fn prune(&mut self, max_depth: u32) -> usize {
        if max_depth == 0 || self.revisions.is_empty() {
            return 0;
        }

        let n = self.revisions.len();
        let mut dist_to_leaf = vec![u32::MAX; n];
        for i in 0..n {
            if self.revisions[i].is_leaf() {
                let mut cur = Some(i);
                let mut d = 0u32;
                while let Some(idx) = cur {
                    if dist_to_leaf[idx] <= d {
                        break;
                    }
                    dist_to_leaf[idx] = d;
                    cur = self.revisions[idx].parent;
                    d += 1;
                }
            }
        }

        let keep: Vec<bool> =
            (0..n).map(|i| dist_to_leaf[i] <= max_depth.saturating_sub(1)).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }

        // Map old index -> new index for kept revisions, and find each kept
        // revision's nearest retained ancestor.
        let mut new_index = vec![None; n];
        let mut next = 0usize;
        for i in 0..n {
            if keep[i] {
                new_index[i] = Some(next);
                next += 1;
            }
        }

        let nearest_kept_ancestor = |mut parent: Option<usize>, revisions: &[Revision]| -> Option<usize> {
            while let Some(p) = parent {
                if keep[p] {
                    return new_index[p];
                }
                parent = revisions[p].parent;
            }
            None
        };

        let mut pruned = Vec::with_capacity(next);
        for i in 0..n {
            if !keep[i] {
                continue;
            }
            let mut rev = self.revisions[i].clone();
            rev.parent = nearest_kept_ancestor(rev.parent, &self.revisions);
            pruned.push(rev);
        }

        self.revisions = pruned;
        self.current = self.current.and_then(|i| new_index[i]);
        removed
    }

    /// Returns the current revision's inline body, if any.
    pub fn inline_body(&self) -> Option<&[u8]> {
        let idx = self.current?;
        match &self.revisions[idx].body {
            Body::Inline(b) => Some(b),
            _ => None,
        }
    }

    /// Marks the winning revision's body as stored externally under
    /// `(docID, sequence)`, to be fetched on demand by the caller via the
    /// body-overflow store.
    pub(crate) fn mark_external(&mut self, index: usize) {
        self.revisions[index].body = Body::External;
    }

    /// Marks a revision's body as compacted away; further reads return `Gone`.
    pub(crate) fn mark_compacted(&mut self, index: usize) {
        self.revisions[index].body = Body::Compacted;
    }

    /// The arena index of the current (winning) revision, if any.
    pub(crate) fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Takes a revision's inline body out, leaving it `Empty` in its place.
    /// The caller decides whether to restore it inline or relocate it to the
    /// overflow store. Returns `None` if the revision carried no inline body.
    pub(crate) fn take_inline_body_if_any(&mut self, index: usize) -> Option<Vec<u8>> {
        match std::mem::replace(&mut self.revisions[index].body, Body::Empty) {
            Body::Inline(b) => Some(b),
            other => {
                self.revisions[index].body = other;
                None
            }
        }
    }

    pub(crate) fn restore_inline_body(&mut self, index: usize, body: Vec<u8>) {
        self.revisions[index].body = Body::Inline(body);
    }

    pub(crate) fn revision_at(&self, index: usize) -> &Revision {
        &self.revisions[index]
    }

    pub(crate) fn revision_at_mut(&mut self, index: usize) -> &mut Revision {
        &mut self.revisions[index]
    }

    /// Assigns sequence numbers to every revision still flagged `New`, in
    /// arena order, via `allocate`. Returns the arena indices assigned.
    pub(crate) fn assign_sequences(
        &mut self,
        mut allocate: impl FnMut() -> CResult<u64>,
    ) -> CResult<Vec<usize>> {
        let mut assigned = Vec::new();
        for i in 0..self.revisions.len() {
            if self.revisions[i].is_new() {
                self.revisions[i].sequence = allocate()?;
                self.revisions[i].set_flag(rev_flags::NEW, false);
                assigned.push(i);
            }
        }
        if !assigned.is_empty() {
            if let Some(idx) = self.current {
                self.sequence = self.revisions[idx].sequence;
            }
        }
        self.dirty = false;
        Ok(assigned)
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// Index of the first arena entry whose `parent` is `parent`, in arena
/// (insertion) order. Used as "first child" when `parent` is `Some`, or
/// "first root" when `parent` is `None`.
fn first_child_index(revisions: &[Revision], parent: Option<usize>) -> Option<usize> {
    revisions.iter().enumerate().find(|(_, r)| r.parent == parent).map(|(i, _)| i)
}

/// Index of the next arena entry after `after` whose `parent` is `parent`.
fn next_sibling_index(revisions: &[Revision], parent: Option<usize>, after: usize) -> Option<usize> {
    revisions.iter().enumerate().skip(after + 1).find(|(_, r)| r.parent == parent).map(|(i, _)| i)
}

/// A non-owning cursor onto one revision of a [`VersionedDocument`]'s tree.
#[derive(Clone, Copy)]
pub struct RevisionCursor<'a> {
    doc: &'a VersionedDocument,
    index: usize,
}

impl<'a> RevisionCursor<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rev_id(&self) -> &'a RevID {
        &self.doc.revisions[self.index].rev_id
    }

    pub fn is_leaf(&self) -> bool {
        self.doc.revisions[self.index].is_leaf()
    }

    pub fn is_deleted(&self) -> bool {
        self.doc.revisions[self.index].is_deleted()
    }

    pub fn has_attachments(&self) -> bool {
        self.doc.revisions[self.index].has_attachments()
    }

    pub fn sequence(&self) -> u64 {
        self.doc.revisions[self.index].sequence
    }

    pub fn inline_body(&self) -> Option<&'a [u8]> {
        match &self.doc.revisions[self.index].body {
            Body::Inline(b) => Some(b),
            _ => None,
        }
    }

    pub fn body_is_external(&self) -> bool {
        matches!(self.doc.revisions[self.index].body, Body::External)
    }

    pub fn body_is_compacted(&self) -> bool {
        matches!(self.doc.revisions[self.index].body, Body::Compacted)
    }

    pub fn parent(&self) -> Option<RevisionCursor<'a>> {
        self.doc.revisions[self.index].parent.map(|index| RevisionCursor { doc: self.doc, index })
    }

    /// Depth-first pre-order successor within the tree. Stable across a
    /// single traversal; callers must not mutate the document mid-iteration.
    ///
    /// Descends to the first child if there is one; otherwise climbs parent
    /// links looking for the next unvisited sibling at each level, treating
    /// multiple root revisions (a forest, e.g. after two independent history
    /// grafts) as siblings of an implicit top level. Arena index alone is
    /// insertion order, not tree order, so this cannot just be `index + 1` --
    /// a branch started earlier can still gain children after a sibling
    /// branch already exists.
    pub fn next(&self) -> Option<RevisionCursor<'a>> {
        let revisions = &self.doc.revisions;
        if let Some(child) = first_child_index(revisions, Some(self.index)) {
            return Some(RevisionCursor { doc: self.doc, index: child });
        }
        let mut current = self.index;
        loop {
            let parent = revisions[current].parent;
            if let Some(sibling) = next_sibling_index(revisions, parent, current) {
                return Some(RevisionCursor { doc: self.doc, index: sibling });
            }
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    /// Advances via [`Self::next`] until a leaf matching `include_deleted` is found.
    pub fn select_next_leaf(&self, include_deleted: bool) -> Option<RevisionCursor<'a>> {
        let mut cursor = self.next();
        while let Some(c) = cursor {
            if c.is_leaf() && (include_deleted || !c.is_deleted()) {
                return Some(c);
            }
            cursor = c.next();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(s: &str) -> RevID {
        RevID::parse_ascii(s).unwrap()
    }

    #[test]
    fn insert_root_then_chain() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), Some(b"{}".to_vec()), false, false, Some(&rid("1-aa")), false).unwrap();
        doc.insert(rid("3-cc"), Some(b"{}".to_vec()), false, false, Some(&rid("2-bb")), false).unwrap();

        assert_eq!(doc.rev_id().unwrap().to_ascii(), "3-cc");
        let cur = doc.current().unwrap();
        let parent = cur.parent().unwrap();
        assert_eq!(parent.rev_id().to_ascii(), "2-bb");

        let first = doc.get(&rid("1-aa")).unwrap();
        let next = first.next().unwrap();
        assert_eq!(next.rev_id().to_ascii(), "2-bb");
    }

    #[test]
    fn conflict_requires_allow_flag() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();

        let err = doc.insert(rid("2-xx"), None, false, false, Some(&rid("1-aa")), false);
        assert!(matches!(err, Err(Error::Conflict(_))));

        doc.insert(rid("2-xx"), None, false, false, Some(&rid("1-aa")), true).unwrap();
        assert!(doc.is_conflicted());
        assert_eq!(doc.rev_id().unwrap().to_ascii(), "2-xx");
    }

    #[test]
    fn pre_order_traversal_visits_subtree_before_siblings() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();
        doc.insert(rid("2-xx"), None, false, false, Some(&rid("1-aa")), true).unwrap();
        doc.insert(rid("3-cc"), None, false, false, Some(&rid("2-bb")), false).unwrap();

        let mut order = Vec::new();
        let mut cursor = doc.first();
        while let Some(c) = cursor {
            order.push(c.rev_id().to_ascii());
            cursor = c.next();
        }
        assert_eq!(order, vec!["1-aa", "2-bb", "3-cc", "2-xx"]);
    }

    #[test]
    fn insert_history_merge() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();

        let history = vec![rid("3-cc"), rid("2-bb"), rid("1-aa")];
        let ancestor = doc.insert_history(&history, Some(b"{}".to_vec()), false, false).unwrap();
        assert_eq!(ancestor, 1);
        assert_eq!(doc.rev_id().unwrap().to_ascii(), "3-cc");
    }

    #[test]
    fn insert_history_rejects_non_monotone() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        let history = vec![rid("2-cc"), rid("2-bb")];
        let err = doc.insert_history(&history, None, false, false);
        assert!(matches!(err, Err(Error::BadRequest(_))));
    }

    #[test]
    fn prune_keeps_leaves_and_reparents() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();
        doc.insert(rid("3-cc"), None, false, false, Some(&rid("2-bb")), false).unwrap();
        doc.insert(rid("4-dd"), None, false, false, Some(&rid("3-cc")), false).unwrap();

        let removed = doc.prune(2);
        assert_eq!(removed, 2);
        assert!(doc.get(&rid("1-aa")).is_none());
        assert!(doc.get(&rid("2-bb")).is_none());
        let tip = doc.get(&rid("4-dd")).unwrap();
        let parent = tip.parent().unwrap();
        assert_eq!(parent.rev_id().to_ascii(), "3-cc");
        assert!(parent.parent().is_none());
    }

    #[test]
    fn prune_monotone() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), None, false, false, None, false).unwrap();
        doc.insert(rid("2-bb"), None, false, false, Some(&rid("1-aa")), false).unwrap();
        doc.insert(rid("3-cc"), None, false, false, Some(&rid("2-bb")), false).unwrap();

        doc.prune(10);
        let before = doc.revision_count();
        doc.prune(20);
        assert_eq!(doc.revision_count(), before);
    }

    #[test]
    fn idempotent_insert() {
        let mut doc = VersionedDocument::new(b"a".to_vec());
        doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();
        let count_before = doc.revision_count();
        doc.insert(rid("1-aa"), Some(b"{}".to_vec()), false, false, None, false).unwrap();
        assert_eq!(doc.revision_count(), count_before);
    }
}
