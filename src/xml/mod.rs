//! Owned XML tree, compact writer and Canonical XML 1.0.
//!
//! The tree is what outbound payloads are built with and what the
//! canonicalizer reads; response parsing streams with quick-xml directly.

mod c14n;
mod tree;
pub(crate) mod writer;

pub use c14n::{C14N_ALGORITHM, NamespaceScope, canonicalize, canonicalize_document};
pub use tree::{Attribute, Element, Node};
