//! Heap-ordered tree builder (component D): accumulates per-directory
//! mutations and writes a new root tree re-using every unchanged subtree
//! from the base revision.

use std::collections::HashMap;

use crate::error::QuitGitError;
use crate::index_heap::IndexHeap;
use crate::objects::{EntryMode, TreeEntry};
use crate::oid::Oid;
use crate::Repository;

type DirEntries = HashMap<String, (Oid, EntryMode)>;

pub(crate) struct IndexTree<'repo> {
    repo: &'repo Repository,
    base_tree: Option<Oid>,
    entries: HashMap<String, DirEntries>,
    parent_of: HashMap<String, Option<String>>,
    heap: IndexHeap<()>,
}

impl<'repo> IndexTree<'repo> {
    pub(crate) fn new(repo: &'repo Repository, base_tree: Option<Oid>) -> Result<Self, QuitGitError> {
        let mut tree = Self {
            repo,
            base_tree,
            entries: HashMap::new(),
            parent_of: HashMap::new(),
            heap: IndexHeap::new(),
        };
        tree.materialize(String::new())?;
        Ok(tree)
    }

    /// Stage a file/blob entry at `path`, creating intermediate directory
    /// builders as needed.
    pub(crate) fn add(&mut self, path: &str, oid: Oid, mode: EntryMode) -> Result<(), QuitGitError> {
        let (dir, name) = split_parent(path);
        self.ensure_builder(&dir)?;
        self.entries
            .get_mut(&dir)
            .expect("just ensured")
            .insert(name, (oid, mode));
        Ok(())
    }

    /// Stage removal of `path`. Fails if `path` is not present in the base
    /// revision.
    pub(crate) fn remove(&mut self, path: &str) -> Result<(), QuitGitError> {
        let exists = match self.base_tree {
            None => false,
            Some(base) => crate::node::resolve_path(self.repo, base, path)?.is_some(),
        };
        if !exists {
            return Err(QuitGitError::NodeNotFound {
                path: path.to_owned(),
                commit: self
                    .base_tree
                    .map(|t| t.to_hex())
                    .unwrap_or_else(|| "<no base>".to_owned()),
            });
        }
        let (dir, name) = split_parent(path);
        self.ensure_builder(&dir)?;
        self.entries.get_mut(&dir).expect("just ensured").remove(&name);
        Ok(())
    }

    /// Seal every builder, deepest-first, writing each sealed subtree's oid
    /// into its parent, and return the root tree's oid.
    pub(crate) fn write(mut self) -> Result<Oid, QuitGitError> {
        loop {
            let Some((path, ())) = self.heap.pop() else {
                unreachable!("root builder is always present and popped last")
            };
            let dir_entries = self.entries.remove(&path).unwrap_or_default();
            let tree_entries = sorted_tree_entries(dir_entries);
            let tree_oid = crate::objects::write_tree(self.repo.inner(), &tree_entries)?;

            match self.parent_of.get(&path).cloned().flatten() {
                Some(parent) => {
                    let (_, name) = split_parent(&path);
                    self.entries
                        .get_mut(&parent)
                        .expect("parent builder materialized before child")
                        .insert(name, (tree_oid, EntryMode::Tree));
                }
                None => return Ok(tree_oid),
            }
        }
    }

    /// Materialize the chain of builders from the root down to `dir_path`,
    /// reusing existing builders and seeding new ones from the base tree.
    fn ensure_builder(&mut self, dir_path: &str) -> Result<(), QuitGitError> {
        // The root builder is always materialized in `new`.
        if dir_path.is_empty() {
            return Ok(());
        }
        let mut current = String::new();
        for component in dir_path.split('/') {
            let parent = current.clone();
            current = if current.is_empty() {
                component.to_owned()
            } else {
                format!("{current}/{component}")
            };
            if !self.heap.contains(&current) {
                self.materialize_child(&parent, &current)?;
            }
        }
        Ok(())
    }

    fn materialize(&mut self, path: String) -> Result<(), QuitGitError> {
        let seed = self.seed(&path)?;
        self.entries.insert(path.clone(), seed);
        self.parent_of.insert(path.clone(), None);
        self.heap.insert(path, ());
        Ok(())
    }

    fn materialize_child(&mut self, parent: &str, path: &str) -> Result<(), QuitGitError> {
        let seed = self.seed(path)?;
        self.entries.insert(path.to_owned(), seed);
        self.parent_of.insert(path.to_owned(), Some(parent.to_owned()));
        self.heap.insert(path.to_owned(), ());
        Ok(())
    }

    /// Read the base revision's entries at `path` (or the root) to seed a
    /// freshly materialized builder. Fails if `path` names a file in the
    /// base revision.
    fn seed(&self, path: &str) -> Result<DirEntries, QuitGitError> {
        let Some(base_tree) = self.base_tree else {
            return Ok(HashMap::new());
        };
        let tree_oid = if path.is_empty() {
            base_tree
        } else {
            match crate::node::resolve_path(self.repo, base_tree, path)? {
                None => return Ok(HashMap::new()),
                Some((_, mode)) if !matches!(mode, EntryMode::Tree) => {
                    return Err(QuitGitError::IndexError {
                        message: format!(
                            "cannot stage under \"{path}\": a file already exists there in the base revision"
                        ),
                    });
                }
                Some((oid, EntryMode::Tree)) => oid,
            }
        };
        let entries = crate::objects::read_tree(self.repo.inner(), tree_oid)?;
        Ok(entries.into_iter().map(|e| (e.name, (e.oid, e.mode))).collect())
    }
}

/// Split `path` into its parent directory (possibly empty = root) and its
/// final component.
fn split_parent(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir.to_owned(), name.to_owned()),
        None => (String::new(), path.to_owned()),
    }
}

/// Order entries the way git does: byte order, with directory names
/// compared as if a trailing `/` were appended.
fn sorted_tree_entries(entries: DirEntries) -> Vec<TreeEntry> {
    let mut entries: Vec<TreeEntry> = entries
        .into_iter()
        .map(|(name, (oid, mode))| TreeEntry { name, mode, oid })
        .collect();
    entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    entries
}

fn sort_key(entry: &TreeEntry) -> Vec<u8> {
    let mut bytes = entry.name.clone().into_bytes();
    if matches!(entry.mode, EntryMode::Tree) {
        bytes.push(b'/');
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parent_handles_root_and_nested_paths() {
        assert_eq!(split_parent("a.nq"), (String::new(), "a.nq".to_owned()));
        assert_eq!(split_parent("sub/dir/x.nq"), ("sub/dir".to_owned(), "x.nq".to_owned()));
    }

    #[test]
    fn sort_key_orders_directories_as_if_slash_suffixed() {
        let file = TreeEntry {
            name: "a-file".to_owned(),
            mode: EntryMode::Blob,
            oid: Oid::from_gix(gix::ObjectId::null(gix::hash::Kind::Sha1)),
        };
        let dir = TreeEntry {
            name: "a".to_owned(),
            mode: EntryMode::Tree,
            oid: Oid::from_gix(gix::ObjectId::null(gix::hash::Kind::Sha1)),
        };
        // "a-file" < "a/" because '-' (0x2D) < '/' (0x2F).
        assert!(sort_key(&file) < sort_key(&dir));
    }
}
