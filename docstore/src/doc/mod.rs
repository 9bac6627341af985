//! The revision-tree document model: [`document::VersionedDocument`], its
//! [`revision::Revision`] nodes, and [`revid::RevID`] identifiers.

pub mod document;
pub mod revid;
pub mod revision;
