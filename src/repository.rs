//! The Repository façade (component E) binding the object-database handle
//! (component A) to revisions, nodes, the staging index, and remote
//! transport.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;

use tracing::{error, info, instrument, warn};

use crate::config::RepositoryConfig;
use crate::credentials::RemoteCredentialAdapter;
use crate::error::QuitGitError;
use crate::oid::Oid;
use crate::refs::SortOrder;
use crate::revision::Revision;

/// A version-controlled quad store's git repository.
///
/// Owns the filesystem path and a `gix::Repository` handle, plus a
/// [`RemoteCredentialAdapter`] shared by every pull/push. `Revision`,
/// `Node`, and `Index` borrow from a `Repository` and cannot outlive it.
pub struct Repository {
    path: PathBuf,
    inner: gix::Repository,
    config: RepositoryConfig,
    credentials: RemoteCredentialAdapter,
}

impl Repository {
    /// Open the repository at `path`. If none exists: clone `origin` into
    /// `path` when given, else initialize a fresh repository when `create`
    /// is `true`, else fail with [`QuitGitError::RepositoryNotFound`].
    ///
    /// When `enable_gc` is `true`, `gc.auto` is read from config; if unset,
    /// it is set to the configured threshold (default 256) and logged.
    /// Failure to read or set it is logged and swallowed — GC stays
    /// unconfigured rather than blocking repository access.
    #[instrument(skip(origin))]
    pub fn open(
        path: &Path,
        create: bool,
        origin: Option<&str>,
        enable_gc: bool,
    ) -> Result<Self, QuitGitError> {
        let config = RepositoryConfig::load(path)?;
        let credentials = RemoteCredentialAdapter::new(config.ssh_key_home.clone());

        let inner = if path.join(".git").exists() || is_bare_repo_dir(path) {
            gix::open(path).map_err(|e| QuitGitError::backend("open repository", e))?
        } else if let Some(origin) = origin {
            info!(origin, path = %path.display(), "cloning repository");
            crate::transport::clone(origin, path, &credentials)?;
            gix::open(path).map_err(|e| QuitGitError::backend("open cloned repository", e))?
        } else if create {
            info!(path = %path.display(), "initializing repository");
            gix::init(path).map_err(|e| QuitGitError::backend("init repository", e))?
        } else {
            return Err(QuitGitError::RepositoryNotFound {
                path: path.to_path_buf(),
            });
        };

        let mut repo = Self {
            path: path.to_path_buf(),
            inner,
            config,
            credentials,
        };
        if enable_gc {
            repo.ensure_gc_configured();
        }
        Ok(repo)
    }

    /// Convenience wrapper for `open(path, true, None, gc)`.
    pub fn init(path: &Path, enable_gc: bool) -> Result<Self, QuitGitError> {
        Self::open(path, true, None, enable_gc)
    }

    /// Convenience wrapper for `open(path, false, Some(origin), gc)`.
    pub fn clone(origin: &str, path: &Path, enable_gc: bool) -> Result<Self, QuitGitError> {
        Self::open(path, false, Some(origin), enable_gc)
    }

    fn ensure_gc_configured(&mut self) {
        let check = Command::new("git")
            .current_dir(&self.path)
            .args(["config", "--get", "gc.auto"])
            .output();
        let already_set = matches!(&check, Ok(output) if output.status.success() && !output.stdout.is_empty());
        if already_set {
            return;
        }
        let threshold = self.config.gc_auto_threshold.to_string();
        match Command::new("git")
            .current_dir(&self.path)
            .args(["config", "gc.auto", &threshold])
            .status()
        {
            Ok(status) if status.success() => {
                info!(threshold = %self.config.gc_auto_threshold, "configured gc.auto");
            }
            Ok(status) => {
                warn!(%status, "git config gc.auto exited non-zero; continuing with GC unconfigured");
            }
            Err(error) => {
                warn!(%error, "failed to run git config gc.auto; continuing with GC unconfigured");
            }
        }
    }

    pub(crate) fn inner(&self) -> &gix::Repository {
        &self.inner
    }

    /// The repository's configuration.
    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// The filesystem path this repository was opened at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if the repository has no commits yet.
    pub fn is_empty(&self) -> Result<bool, QuitGitError> {
        Ok(self.inner.head_id().is_err())
    }

    /// `true` if the repository has no working tree.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.inner.workdir().is_none()
    }

    /// Release the underlying handle early and deterministically. Kept for
    /// parity with the system this crate implements; dropping a
    /// `Repository` has the same effect.
    pub fn close(self) {}

    /// Resolve `spec` (a ref name, oid, or revspec; `"HEAD"` by default) to
    /// a [`Revision`].
    pub fn revision(&self, spec: &str) -> Result<Revision<'_>, QuitGitError> {
        let oid = crate::refs::rev_parse(&self.inner, spec)?;
        Revision::new(self, oid)
    }

    /// Enumerate revisions. If `name` is `None`, walks every local branch
    /// (`refs/heads/*`) in `order`, deduplicating commits reachable from
    /// more than one branch. Otherwise resolves `name` against
    /// `refs/heads/<name>` then `refs/tags/<name>`.
    pub fn revisions(&self, name: Option<&str>, order: SortOrder) -> Result<Vec<Revision<'_>>, QuitGitError> {
        let starts: Vec<Oid> = match name {
            Some(name) => {
                let heads = format!("refs/heads/{name}");
                let tags = format!("refs/tags/{name}");
                let oid = crate::refs::read_ref(&self.inner, &heads)?
                    .or(crate::refs::read_ref(&self.inner, &tags)?)
                    .ok_or_else(|| QuitGitError::RevisionNotFound { spec: name.to_owned() })?;
                vec![oid]
            }
            None => crate::refs::list_refs(&self.inner, "refs/heads/")?
                .into_iter()
                .filter_map(|name| crate::refs::read_ref(&self.inner, &name).transpose())
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut seen = HashSet::new();
        let mut oids = Vec::new();
        for start in starts {
            for oid in crate::refs::walk(&self.inner, start, order)? {
                if seen.insert(oid) {
                    oids.push(oid);
                }
            }
        }

        oids.into_iter().map(|oid| Revision::new(self, oid)).collect()
    }

    /// Local branch names (`refs/heads/*`, prefix stripped).
    pub fn branches(&self) -> Result<Vec<String>, QuitGitError> {
        Ok(crate::refs::list_refs(&self.inner, "refs/heads/")?
            .into_iter()
            .map(|name| name.trim_start_matches("refs/heads/").to_owned())
            .collect())
    }

    /// Tag names (`refs/tags/*`, prefix stripped).
    pub fn tags(&self) -> Result<Vec<String>, QuitGitError> {
        Ok(crate::refs::list_refs(&self.inner, "refs/tags/")?
            .into_iter()
            .map(|name| name.trim_start_matches("refs/tags/").to_owned())
            .collect())
    }

    /// Branch and tag names combined.
    pub fn tags_or_branches(&self) -> Result<Vec<String>, QuitGitError> {
        let mut names = self.branches()?;
        names.extend(self.tags()?);
        Ok(names)
    }

    /// Open a new staging [`crate::Index`] against `base` (`"HEAD"` by
    /// default), or an orphan index with no base if `base` resolves to no
    /// commits yet in an empty repository.
    pub fn index(&self, base: Option<&str>) -> Result<crate::index::Index<'_>, QuitGitError> {
        let base_oid = match crate::refs::rev_parse_opt(&self.inner, base.unwrap_or("HEAD"))? {
            Some(oid) => Some(oid),
            None if self.is_empty().unwrap_or(true) => None,
            None => {
                return Err(QuitGitError::RevisionNotFound {
                    spec: base.unwrap_or("HEAD").to_owned(),
                })
            }
        };
        Ok(crate::index::Index::new(self, base_oid))
    }

    /// Fetch from `remote` and integrate `branch` into the matching local
    /// branch. Delegates the actual three-way content merge to the system
    /// `git` engine (§1 Non-goals); this crate only distinguishes
    /// up-to-date, fast-forward, and normal-merge-with-conflicts.
    #[instrument(skip(self))]
    pub fn pull(&self, remote: Option<&str>, branch: Option<&str>) -> Result<(), QuitGitError> {
        let remote = remote.unwrap_or(&self.config.default_remote).to_owned();
        let branch = branch.unwrap_or(&self.config.default_branch).to_owned();

        if crate::refs::list_refs(&self.inner, &format!("refs/remotes/{remote}/"))?.is_empty()
            && Command::new("git")
                .current_dir(&self.path)
                .args(["remote", "get-url", &remote])
                .output()
                .map(|o| !o.status.success())
                .unwrap_or(true)
        {
            // Unknown remote is silently skipped: the contract this crate
            // implements does the same (flagged as a possible bug in
            // DESIGN.md, not fixed here).
            warn!(remote, "pull: remote does not exist, skipping");
            return Ok(());
        }

        crate::transport::fetch(&self.path, &remote, &self.credentials)?;

        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        let local_ref = format!("refs/heads/{branch}");

        let remote_oid = crate::refs::read_ref(&self.inner, &remote_ref)?
            .ok_or_else(|| QuitGitError::backend("pull", format!("{remote_ref} missing after fetch")))?;
        let local_oid = crate::refs::read_ref(&self.inner, &local_ref)?;

        match local_oid {
            None => {
                self.checkout_tree(remote_oid)?;
                crate::refs::write_ref(&self.inner, &local_ref, remote_oid, "pull: initial checkout")?;
                crate::refs::write_ref(&self.inner, "HEAD", remote_oid, "pull: initial checkout")?;
                Ok(())
            }
            Some(local_oid) if local_oid == remote_oid => {
                info!("already up to date");
                Ok(())
            }
            Some(local_oid) if crate::refs::is_ancestor(&self.inner, local_oid, remote_oid)? => {
                self.checkout_tree(remote_oid)?;
                crate::refs::write_ref(&self.inner, &local_ref, remote_oid, "pull: fast-forward")?;
                crate::refs::write_ref(&self.inner, "HEAD", remote_oid, "pull: fast-forward")?;
                info!("fast-forwarded");
                Ok(())
            }
            Some(local_oid) if crate::refs::is_ancestor(&self.inner, remote_oid, local_oid)? => {
                info!("already up to date (local ahead of remote)");
                Ok(())
            }
            Some(_) => self.merge_remote(&remote, &branch, &remote_ref),
        }
    }

    fn merge_remote(&self, remote: &str, branch: &str, remote_ref: &str) -> Result<(), QuitGitError> {
        let conflicts = self.conflicting_paths(remote_ref)?;
        if !conflicts.is_empty() {
            for path in &conflicts {
                error!(path, "merge conflict");
            }
            let _ = Command::new("git").current_dir(&self.path).args(["merge", "--abort"]).status();
            return Err(QuitGitError::MergeConflict {
                remote: remote.to_owned(),
                branch: branch.to_owned(),
                paths: conflicts,
            });
        }

        let author = self.inner.committer().transpose().ok().flatten();
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path).args(["merge", "--no-edit", remote_ref]);
        if let Some(sig) = &author {
            cmd.env("GIT_AUTHOR_NAME", sig.name.to_string());
            cmd.env("GIT_AUTHOR_EMAIL", sig.email.to_string());
            cmd.env("GIT_COMMITTER_NAME", sig.name.to_string());
            cmd.env("GIT_COMMITTER_EMAIL", sig.email.to_string());
        }
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(QuitGitError::BackendError {
                message: format!("git merge failed: {}", String::from_utf8_lossy(&output.stderr)),
            });
        }
        info!("merge commit created");
        Ok(())
    }

    fn conflicting_paths(&self, remote_ref: &str) -> Result<Vec<String>, QuitGitError> {
        let output = Command::new("git")
            .current_dir(&self.path)
            .args(["merge", "--no-commit", "--no-ff", remote_ref])
            .output()?;
        if output.status.success() {
            let _ = Command::new("git").current_dir(&self.path).args(["merge", "--abort"]).status();
            return Ok(Vec::new());
        }
        let diff = Command::new("git")
            .current_dir(&self.path)
            .args(["diff", "--name-only", "--diff-filter=U"])
            .output()?;
        let paths = String::from_utf8_lossy(&diff.stdout)
            .lines()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let _ = Command::new("git").current_dir(&self.path).args(["merge", "--abort"]).status();
        Ok(paths)
    }

    /// Push `refspec` (default `refs/heads/<default_branch>:refs/heads/<default_branch>`)
    /// to `remote` (default the configured default remote).
    #[instrument(skip(self))]
    pub fn push(&self, remote: Option<&str>, refspec: Option<&str>) -> Result<(), QuitGitError> {
        let remote = remote.unwrap_or(&self.config.default_remote);
        let default_refspec = format!(
            "refs/heads/{branch}:refs/heads/{branch}",
            branch = self.config.default_branch
        );
        let refspec = refspec.unwrap_or(&default_refspec);
        crate::transport::push(&self.path, remote, refspec, &self.credentials)
    }

    /// Always fails: three-way content merge is explicitly out of scope
    /// (see the upstream `pygit2` limitation this mirrors).
    pub fn merge(&self, _their_oid: Oid) -> Result<(), QuitGitError> {
        Err(QuitGitError::Unsupported {
            message: "merge() is not supported; pull() delegates merging to the git engine".to_owned(),
        })
    }

    /// Always fails, for the same reason as [`Repository::merge`].
    pub fn revert(&self, _commit_oid: Oid) -> Result<(), QuitGitError> {
        Err(QuitGitError::Unsupported {
            message: "revert() is not supported".to_owned(),
        })
    }

    /// Check out `oid` (a commit or tree) into the working tree, removing
    /// stale files not present in the target tree. Grounded on the
    /// teacher crate's `checkout_impl::checkout_tree`.
    fn checkout_tree(&self, oid: Oid) -> Result<(), QuitGitError> {
        let Some(workdir) = self.inner.workdir().map(Path::to_path_buf) else {
            return Ok(());
        };

        let object = self
            .inner
            .find_object(oid.to_gix())
            .map_err(|e| QuitGitError::backend("find_object for checkout", e))?;
        let tree_oid = match object.kind {
            gix::object::Kind::Commit => object
                .into_commit()
                .tree_id()
                .map_err(|e| QuitGitError::backend("resolve commit tree", e))?
                .detach(),
            gix::object::Kind::Tree => oid.to_gix(),
            other => {
                return Err(QuitGitError::BackendError {
                    message: format!("expected commit or tree for checkout, got {other}"),
                });
            }
        };

        let mut index_file = self
            .inner
            .index_from_tree(&tree_oid)
            .map_err(|e| QuitGitError::backend("index_from_tree", e))?;

        let tree_paths: HashSet<String> = index_file
            .entries()
            .iter()
            .filter_map(|entry| entry.path(&index_file).to_str().ok().map(str::to_owned))
            .collect();

        let mut opts = self
            .inner
            .checkout_options(gix::worktree::stack::state::attributes::Source::IdMapping)
            .map_err(|e| QuitGitError::backend("checkout_options", e))?;
        opts.overwrite_existing = true;
        opts.destination_is_initially_empty = false;

        let objects = self
            .inner
            .objects
            .clone()
            .into_arc()
            .map_err(|e| QuitGitError::backend("object store to Arc", e))?;

        let outcome = gix::worktree::state::checkout(
            &mut index_file,
            &workdir,
            objects,
            &gix::progress::Discard,
            &gix::progress::Discard,
            &AtomicBool::new(false),
            opts,
        )
        .map_err(|e| QuitGitError::backend("checkout", e))?;

        if let Some(first) = outcome.errors.first() {
            return Err(QuitGitError::BackendError {
                message: format!(
                    "checkout had {} error(s), first: {}: {}",
                    outcome.errors.len(),
                    first.path,
                    first.error
                ),
            });
        }

        remove_stale_files(&workdir, &workdir, &tree_paths)
    }
}

fn is_bare_repo_dir(path: &Path) -> bool {
    path.join("HEAD").exists() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

/// Remove working-tree files not present in `tree_paths`, skipping `.git`.
fn remove_stale_files(workdir: &Path, dir: &Path, tree_paths: &HashSet<String>) -> Result<(), QuitGitError> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Ok(());
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
            continue;
        }
        if path.is_dir() {
            remove_stale_files(workdir, &path, tree_paths)?;
            if std::fs::read_dir(&path).map(|mut d| d.next().is_none()).unwrap_or(false) {
                let _ = std::fs::remove_dir(&path);
            }
        } else if let Ok(relative) = path.strip_prefix(workdir) {
            if let Some(relative) = relative.to_str() {
                if !tree_paths.contains(relative) {
                    std::fs::remove_file(&path)?;
                }
            }
        }
    }
    Ok(())
}
