//! Error types surfaced by the core.
//!
//! [`QuitGitError`] is the single error type returned by every public
//! operation in this crate. It uses rich enum variants so callers (the
//! SPARQL executor, the HTTP surface) can match on specific failure modes
//! without parsing error messages — mirroring the distinct exception
//! classes `RepositoryNotFound`, `RevisionNotFound`, `NodeNotFound`,
//! `IndexError`, and `QuitGitPushError` from the system this crate
//! implements.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum QuitGitError {
    /// No git repository exists at the given path, and neither `create`
    /// nor `origin` was supplied to [`crate::Repository::open`].
    #[error("repository \"{path}\" does not exist")]
    RepositoryNotFound {
        /// The path that was opened.
        path: PathBuf,
    },

    /// A revision specifier did not resolve to a commit.
    #[error("revision not found: {spec}")]
    RevisionNotFound {
        /// The ref name, tag name, or revspec that failed to resolve.
        spec: String,
    },

    /// A path did not resolve to an entry inside a commit's tree.
    #[error("node not found: \"{path}\" in commit {commit}")]
    NodeNotFound {
        /// The path that was looked up.
        path: String,
        /// The commit the lookup was performed against.
        commit: String,
    },

    /// A staging-area precondition was violated: committing twice, or
    /// staging a path that collides with a file/directory in the base tree.
    #[error("index error: {message}")]
    IndexError {
        /// Human-readable description of the violated precondition.
        message: String,
    },

    /// A push to a remote was rejected by the remote end, or the named
    /// remote does not exist.
    #[error("push to ref \"{ref_name}\" failed: {message}")]
    QuitGitPushError {
        /// The ref that was being pushed.
        ref_name: String,
        /// The rejection message reported by the remote, or a local
        /// diagnostic (e.g. "no such remote").
        message: String,
    },

    /// `pull` encountered a normal merge that produced conflicts.
    #[error("merge conflict pulling {branch} from {remote}: {} path(s) conflicted", paths.len())]
    MergeConflict {
        /// The remote that was pulled from.
        remote: String,
        /// The local branch the merge was applied to.
        branch: String,
        /// The conflicting paths, in the order reported by the index.
        paths: Vec<String>,
    },

    /// `merge`/`revert` are not supported by the core (see the upstream
    /// `pygit2` limitation this mirrors — libgit2/pygit2#725).
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// Which operation, and why.
        message: String,
    },

    /// An I/O error occurred (file system, process spawn, subprocess exit).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The underlying git backend (`gix`, or the `git` CLI for
    /// transport operations it doesn't yet cover) returned an
    /// unclassified error, or a merge-analysis result outside the
    /// four known outcomes was observed (a library contract violation).
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl QuitGitError {
    /// Build a [`QuitGitError::BackendError`] from any `gix` error, tagging
    /// it with the operation that failed.
    pub(crate) fn backend(context: &str, source: impl std::fmt::Display) -> Self {
        Self::BackendError {
            message: format!("{context}: {source}"),
        }
    }
}
