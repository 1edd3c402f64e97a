//! Git-backed object model and index/commit machinery for a
//! version-controlled RDF quad store.
//!
//! This crate covers the hard part of such a system: a revision-graph
//! navigator over a Git object database, a content-addressed staging index
//! that materializes a new tree by mutating only the subtrees it has to,
//! a history walker that projects the evolution of a single path, and the
//! credential/push negotiation with remotes. Parsing or executing SPARQL,
//! n-quads file I/O, an HTTP surface, and three-way content merges of graph
//! files are out of scope; callers compose those around this crate.
//!
//! The entry point is [`Repository::open`] (or [`Repository::init`] /
//! [`Repository::clone`]). From there, [`Repository::revision`] returns a
//! [`Revision`], [`Revision::node`] drills into a file or directory, and
//! [`Repository::index`] opens a staging area for a new commit.

mod config;
mod credentials;
mod error;
mod index;
mod index_heap;
mod index_tree;
mod node;
mod objects;
mod oid;
mod refs;
mod repository;
mod revision;
mod signature;
mod transport;

pub use config::RepositoryConfig;
pub use error::QuitGitError;
pub use index::Index;
pub use node::Node;
pub use objects::EntryMode;
pub use oid::Oid;
pub use refs::SortOrder;
pub use repository::Repository;
pub use revision::Revision;
pub use signature::Signature;
