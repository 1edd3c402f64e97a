//! Low-level blob/tree/commit read and write operations (component A).
//!
//! Grounded directly on the teacher crate's `objects_impl.rs`: the oid
//! conversions, `find_blob`/`find_tree`/`find_commit`/`write_blob` calls and
//! the `commit.decode()` pattern for reading parents/author/committer are
//! carried over unchanged. The tree-builder half of that file (`edit_tree`
//! via gix's own tree editor) is not reused here: the staging protocol this
//! crate implements is the heap-ordered builder described in `index_tree.rs`,
//! not gix's editor.

use crate::error::QuitGitError;
use crate::oid::Oid;
use crate::signature::Signature;

/// One entry inside a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: EntryMode,
    pub oid: Oid,
}

/// The subset of git file modes this crate cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryMode {
    Blob,
    BlobExecutable,
    Tree,
    Link,
    Commit,
}

impl EntryMode {
    pub(crate) fn from_gix(mode: gix::objs::tree::EntryMode) -> Self {
        match mode.kind() {
            gix::objs::tree::EntryKind::Tree => Self::Tree,
            gix::objs::tree::EntryKind::Blob => Self::Blob,
            gix::objs::tree::EntryKind::BlobExecutable => Self::BlobExecutable,
            gix::objs::tree::EntryKind::Link => Self::Link,
            gix::objs::tree::EntryKind::Commit => Self::Commit,
        }
    }

    pub(crate) fn to_gix(self) -> gix::objs::tree::EntryKind {
        match self {
            Self::Blob => gix::objs::tree::EntryKind::Blob,
            Self::BlobExecutable => gix::objs::tree::EntryKind::BlobExecutable,
            Self::Tree => gix::objs::tree::EntryKind::Tree,
            Self::Link => gix::objs::tree::EntryKind::Link,
            Self::Commit => gix::objs::tree::EntryKind::Commit,
        }
    }
}

/// The decoded fields of a commit object this crate needs.
pub struct CommitInfo {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

pub(crate) fn read_blob(repo: &gix::Repository, oid: Oid) -> Result<Vec<u8>, QuitGitError> {
    let mut blob = repo
        .find_blob(oid.to_gix())
        .map_err(|e| QuitGitError::backend("find_blob", e))?;
    Ok(blob.take_data())
}

pub(crate) fn read_tree(repo: &gix::Repository, oid: Oid) -> Result<Vec<TreeEntry>, QuitGitError> {
    let tree = repo
        .find_tree(oid.to_gix())
        .map_err(|e| QuitGitError::backend("find_tree", e))?;

    let mut entries = Vec::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| QuitGitError::backend("decode tree entry", e))?;
        entries.push(TreeEntry {
            name: entry.inner.filename.to_string(),
            mode: EntryMode::from_gix(entry.inner.mode),
            oid: Oid::from_gix(entry.inner.oid.into()),
        });
    }
    Ok(entries)
}

pub(crate) fn read_commit(repo: &gix::Repository, oid: Oid) -> Result<CommitInfo, QuitGitError> {
    let commit = repo
        .find_commit(oid.to_gix())
        .map_err(|e| QuitGitError::backend("find_commit", e))?;
    let decoded = commit
        .decode()
        .map_err(|e| QuitGitError::backend("decode commit", e))?;

    Ok(CommitInfo {
        tree: Oid::from_gix(decoded.tree()),
        parents: decoded.parents().map(Oid::from_gix).collect(),
        message: decoded.message.to_string(),
        author: Signature::from_gix(&decoded.author()),
        committer: Signature::from_gix(&decoded.committer()),
    })
}

pub(crate) fn write_blob(repo: &gix::Repository, data: &[u8]) -> Result<Oid, QuitGitError> {
    let id = repo
        .write_blob(data)
        .map_err(|e| QuitGitError::backend("write_blob", e))?;
    Ok(Oid::from_gix(id.detach()))
}

/// Serialize a flat list of entries into a tree object. Entries must already
/// be sorted the way git expects (byte order, directories as if suffixed
/// with `/`); callers in `index_tree.rs` are responsible for that ordering.
pub(crate) fn write_tree(repo: &gix::Repository, entries: &[TreeEntry]) -> Result<Oid, QuitGitError> {
    let tree = gix::objs::Tree {
        entries: entries
            .iter()
            .map(|e| gix::objs::tree::Entry {
                mode: e.mode.to_gix().into(),
                filename: e.name.as_str().into(),
                oid: e.oid.to_gix(),
            })
            .collect(),
    };
    let id = repo
        .write_object(&tree)
        .map_err(|e| QuitGitError::backend("write_tree", e))?;
    Ok(Oid::from_gix(id.detach()))
}

/// Create a commit object and, if `update_ref` is given, advance that ref to
/// point at it.
pub(crate) fn create_commit(
    repo: &gix::Repository,
    tree: Oid,
    parents: &[Oid],
    message: &str,
    author: &Signature,
    committer: &Signature,
    update_ref: Option<&str>,
) -> Result<Oid, QuitGitError> {
    let parent_oids: Vec<gix::ObjectId> = parents.iter().map(|p| p.to_gix()).collect();

    match update_ref {
        Some(ref_name) => {
            let id = repo
                .commit_as(
                    committer.to_gix(),
                    author.to_gix(),
                    ref_name,
                    message,
                    tree.to_gix(),
                    parent_oids,
                )
                .map_err(|e| QuitGitError::backend("create_commit", e))?;
            Ok(Oid::from_gix(id.detach()))
        }
        None => {
            let commit = gix::objs::Commit {
                message: message.into(),
                tree: tree.to_gix(),
                author: author.to_gix(),
                committer: committer.to_gix(),
                encoding: None,
                parents: parent_oids.into_iter().collect(),
                extra_headers: Vec::new(),
            };
            let id = repo
                .write_object(&commit)
                .map_err(|e| QuitGitError::backend("write commit object", e))?;
            Ok(Oid::from_gix(id.detach()))
        }
    }
}
