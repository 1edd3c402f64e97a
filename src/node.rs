//! Typed view over a tree/blob entry inside a revision (component C).

use crate::error::QuitGitError;
use crate::objects::{EntryMode, TreeEntry};
use crate::oid::Oid;
use crate::refs::SortOrder;
use crate::Repository;

/// A directory or file reached by walking a commit's tree.
pub enum Node<'repo> {
    Directory {
        repo: &'repo Repository,
        commit: Oid,
        path: String,
        tree: Oid,
    },
    File {
        repo: &'repo Repository,
        commit: Oid,
        path: String,
        blob: Oid,
        content_length: usize,
    },
}

impl<'repo> Node<'repo> {
    /// Resolve `path` (or the root, if `None`/empty/`"."`) against `tree`,
    /// the root tree of `commit`.
    pub(crate) fn at(
        repo: &'repo Repository,
        commit: Oid,
        tree: Oid,
        path: Option<&str>,
    ) -> Result<Self, QuitGitError> {
        let path = normalize_path(path.unwrap_or(""));
        if path.is_empty() {
            return Ok(Node::Directory {
                repo,
                commit,
                path,
                tree,
            });
        }

        let (entry_oid, mode) = resolve_path(repo, tree, &path)?.ok_or_else(|| {
            QuitGitError::NodeNotFound {
                path: path.clone(),
                commit: commit.to_hex(),
            }
        })?;

        Ok(match mode {
            EntryMode::Tree => Node::Directory {
                repo,
                commit,
                path,
                tree: entry_oid,
            },
            _ => {
                let bytes = crate::objects::read_blob(repo.inner(), entry_oid)?;
                Node::File {
                    repo,
                    commit,
                    path,
                    blob: entry_oid,
                    content_length: bytes.len(),
                }
            }
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Node::Directory { path, .. } | Node::File { path, .. } => path,
        }
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Node::File { .. })
    }

    /// The file's bytes decoded as UTF-8. Only defined for files.
    pub fn content(&self) -> Result<String, QuitGitError> {
        match self {
            Node::File { repo, blob, .. } => {
                let bytes = crate::objects::read_blob(repo.inner(), *blob)?;
                String::from_utf8(bytes).map_err(|e| QuitGitError::BackendError {
                    message: format!("blob {blob} is not valid UTF-8: {e}"),
                })
            }
            Node::Directory { .. } => Err(QuitGitError::Unsupported {
                message: "content() is only defined for files".to_owned(),
            }),
        }
    }

    /// The file's byte length. Only defined for files.
    pub fn content_length(&self) -> Result<usize, QuitGitError> {
        match self {
            Node::File { content_length, .. } => Ok(*content_length),
            Node::Directory { .. } => Err(QuitGitError::Unsupported {
                message: "content_length() is only defined for files".to_owned(),
            }),
        }
    }

    /// Children of a directory node, in underlying tree order. When
    /// `recursive`, each directory is followed immediately by its own
    /// children before moving to the next sibling (pre-order).
    pub fn entries(&self, recursive: bool) -> Result<Vec<Node<'repo>>, QuitGitError> {
        let Node::Directory { repo, commit, path, tree } = self else {
            return Err(QuitGitError::Unsupported {
                message: "entries() is only defined for directories".to_owned(),
            });
        };
        let mut out = Vec::new();
        collect_entries(repo, *commit, path, *tree, recursive, &mut out)?;
        Ok(out)
    }

    /// Walk the owning commit's ancestors (time-descending order),
    /// emitting a new [`Node`] each time the tree entry at this node's path
    /// changes oid from the previously observed one. Stops as soon as the
    /// path is absent from some ancestor's tree; does not re-emit a Node
    /// for a path that disappears and is later re-added (documented
    /// limitation, preserved unchanged from the system this implements).
    pub fn history(&self) -> Result<Vec<Node<'repo>>, QuitGitError> {
        let (repo, commit, path) = match self {
            Node::Directory { repo, commit, path, .. } => (*repo, *commit, path.as_str()),
            Node::File { repo, commit, path, .. } => (*repo, *commit, path.as_str()),
        };

        let ancestors = crate::refs::walk(repo.inner(), commit, SortOrder::TimeDescending)?;
        let mut out = Vec::new();
        let mut last_oid: Option<Oid> = None;
        let mut seeded = false;

        for ancestor in ancestors {
            let info = crate::objects::read_commit(repo.inner(), ancestor)?;
            let normalized = normalize_path(path);
            let resolved = if normalized.is_empty() {
                Some((info.tree, EntryMode::Tree))
            } else {
                resolve_path(repo, info.tree, &normalized)?
            };

            let Some((entry_oid, _mode)) = resolved else {
                break;
            };

            if !seeded {
                last_oid = Some(entry_oid);
                seeded = true;
                continue;
            }

            if Some(entry_oid) != last_oid {
                out.push(Node::at(repo, ancestor, info.tree, Some(path))?);
                last_oid = Some(entry_oid);
            }
        }

        Ok(out)
    }
}

fn collect_entries<'repo>(
    repo: &'repo Repository,
    commit: Oid,
    dir_path: &str,
    tree: Oid,
    recursive: bool,
    out: &mut Vec<Node<'repo>>,
) -> Result<(), QuitGitError> {
    for entry in crate::objects::read_tree(repo.inner(), tree)? {
        let child_path = join_path(dir_path, &entry.name);
        let node = match entry.mode {
            EntryMode::Tree => Node::Directory {
                repo,
                commit,
                path: child_path.clone(),
                tree: entry.oid,
            },
            _ => {
                let bytes = crate::objects::read_blob(repo.inner(), entry.oid)?;
                Node::File {
                    repo,
                    commit,
                    path: child_path.clone(),
                    blob: entry.oid,
                    content_length: bytes.len(),
                }
            }
        };
        let is_dir = matches!(entry.mode, EntryMode::Tree);
        let child_tree = entry.oid;
        out.push(node);
        if recursive && is_dir {
            collect_entries(repo, commit, &child_path, child_tree, recursive, out)?;
        }
    }
    Ok(())
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

pub(crate) fn normalize_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `tree` down `path`'s components, returning the final entry's oid
/// and mode, or `None` if any component is absent.
pub(crate) fn resolve_path(
    repo: &Repository,
    tree: Oid,
    path: &str,
) -> Result<Option<(Oid, EntryMode)>, QuitGitError> {
    let mut current = tree;
    let components: Vec<&str> = path.split('/').collect();
    for (i, component) in components.iter().enumerate() {
        let entries: Vec<TreeEntry> = crate::objects::read_tree(repo.inner(), current)?;
        let Some(entry) = entries.into_iter().find(|e| e.name == *component) else {
            return Ok(None);
        };
        if i == components.len() - 1 {
            return Ok(Some((entry.oid, entry.mode)));
        }
        if !matches!(entry.mode, EntryMode::Tree) {
            return Ok(None);
        }
        current = entry.oid;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn normalize_strips_separators_and_dot_segments() {
        assert_eq!(normalize_path("/a/./b/"), "a/b");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("a//b"), "a/b");
    }
}
