//! Mutable staging area over a base revision (component D).

use std::collections::BTreeMap;

use crate::error::QuitGitError;
use crate::index_tree::IndexTree;
use crate::node::normalize_path;
use crate::objects::EntryMode;
use crate::oid::Oid;
use crate::signature::Signature;
use crate::Repository;

#[derive(Clone, Copy)]
enum StashEntry {
    Upsert { oid: Oid, mode: EntryMode },
    Tombstone,
}

/// Staging area for one new commit. Constructed via
/// [`Repository::index`](crate::Repository::index); single-shot — once
/// [`Index::commit`] succeeds the same instance refuses further commits.
pub struct Index<'repo> {
    repo: &'repo Repository,
    base: Option<Oid>,
    stash: BTreeMap<String, StashEntry>,
    dirty: bool,
}

impl<'repo> Index<'repo> {
    pub(crate) fn new(repo: &'repo Repository, base: Option<Oid>) -> Self {
        Self {
            repo,
            base,
            stash: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Stage a file write at `path`. `mode` defaults to a regular,
    /// non-executable blob. Overwrites any prior staged entry for the same
    /// path.
    pub fn add(&mut self, path: &str, bytes: &[u8], mode: Option<EntryMode>) -> Result<(), QuitGitError> {
        let oid = crate::objects::write_blob(self.repo.inner(), bytes)?;
        let path = normalize_path(path);
        self.stash.insert(
            path,
            StashEntry::Upsert {
                oid,
                mode: mode.unwrap_or(EntryMode::Blob),
            },
        );
        Ok(())
    }

    /// Stage deletion of `path`. Overwrites any prior staged entry for the
    /// same path with a tombstone.
    pub fn remove(&mut self, path: &str) {
        self.stash.insert(normalize_path(path), StashEntry::Tombstone);
    }

    /// Build the new tree from the staged entries and create a commit.
    ///
    /// `ref_name` defaults to `"HEAD"`. `parents` defaults to the base
    /// revision's oid (if any); an orphan `Index` with no base and no
    /// explicit parents produces a root commit.
    #[allow(clippy::too_many_arguments)]
    pub fn commit(
        &mut self,
        message: &str,
        author_name: &str,
        author_email: &str,
        ref_name: Option<&str>,
        committer_name: Option<&str>,
        committer_email: Option<&str>,
        parents: Option<&[Oid]>,
    ) -> Result<Oid, QuitGitError> {
        if self.dirty {
            return Err(QuitGitError::IndexError {
                message: "Index already committed".to_owned(),
            });
        }

        let base_tree = match self.base {
            Some(oid) => Some(crate::objects::read_commit(self.repo.inner(), oid)?.tree),
            None => None,
        };

        let mut tree = IndexTree::new(self.repo, base_tree)?;

        // Stable linearization by (blob-oid, path); not semantically
        // required since every operation is path-addressed, but keeps
        // iteration order reproducible across runs for easier diffing.
        let mut ordered: Vec<(&String, &StashEntry)> = self.stash.iter().collect();
        ordered.sort_by(|(path_a, entry_a), (path_b, entry_b)| {
            let oid_a = stash_oid(entry_a);
            let oid_b = stash_oid(entry_b);
            oid_a.cmp(&oid_b).then_with(|| path_a.cmp(path_b))
        });

        for (path, entry) in ordered {
            match entry {
                StashEntry::Tombstone => tree.remove(path)?,
                StashEntry::Upsert { oid, mode } => tree.add(path, *oid, *mode)?,
            }
        }

        let new_tree = tree.write()?;

        let author = Signature::now(author_name, author_email);
        let committer = match (committer_name, committer_email) {
            (Some(name), Some(email)) => Signature::now(name, email),
            _ => author.clone(),
        };

        let parent_oids: Vec<Oid> = match parents {
            Some(parents) => parents.to_vec(),
            None => self.base.into_iter().collect(),
        };

        let new_commit = crate::objects::create_commit(
            self.repo.inner(),
            new_tree,
            &parent_oids,
            message,
            &author,
            &committer,
            Some(ref_name.unwrap_or("HEAD")),
        )?;

        self.dirty = true;
        Ok(new_commit)
    }
}

fn stash_oid(entry: &StashEntry) -> Option<Oid> {
    match entry {
        StashEntry::Upsert { oid, .. } => Some(*oid),
        StashEntry::Tombstone => None,
    }
}
