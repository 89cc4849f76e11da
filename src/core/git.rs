use anyhow::{Context, Result};
use git2::{Delta, Oid, Repository};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Before and after text of one modified file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub before: String,
    pub after: String,
}

/// Modified files of one commit transition, keyed by repository path.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    files: BTreeMap<String, FileChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, before: impl Into<String>, after: impl Into<String>) {
        self.files.insert(
            path.into(),
            FileChange {
                before: before.into(),
                after: after.into(),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.files.get(path)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FileChange> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = (&'a String, &'a FileChange);
    type IntoIter = btree_map::Iter<'a, String, FileChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

pub struct GitIntegration {
    repo: Repository,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(repo_path)
            .context("Failed to find git repository")?;
        Ok(Self { repo })
    }

    pub fn workdir(&self) -> Option<PathBuf> {
        self.repo.workdir().map(Path::to_path_buf)
    }

    /// HEAD and its first parent, if HEAD is not the initial commit.
    pub fn head_and_parent(&self) -> Result<(Oid, Option<Oid>)> {
        let head = self.repo.head()
            .context("Repository has no HEAD commit")?
            .peel_to_commit()?;
        let parent = head.parent_ids().next();
        Ok((head.id(), parent))
    }

    /// Changes introduced by HEAD, or `None` for an initial commit.
    pub fn latest_commit_changes(&self) -> Result<Option<ChangeSet>> {
        let (current, previous) = self.head_and_parent()?;
        match previous {
            Some(previous) => Ok(Some(self.changes_between(previous, current)?)),
            None => Ok(None),
        }
    }

    /// Collects modified files between two commits. Added, deleted and
    /// renamed files are not part of the result.
    pub fn changes_between(&self, previous: Oid, current: Oid) -> Result<ChangeSet> {
        let old_tree = self.repo.find_commit(previous)?.tree()?;
        let new_tree = self.repo.find_commit(current)?.tree()?;

        let diff = self.repo.diff_tree_to_tree(
            Some(&old_tree),
            Some(&new_tree),
            None
        )?;

        let mut changes = ChangeSet::new();
        for delta in diff.deltas() {
            if delta.status() != Delta::Modified {
                continue;
            }

            let path = match delta.old_file().path() {
                Some(path) => path.to_string_lossy().to_string(),
                None => continue,
            };

            let before = self.repo.find_blob(delta.old_file().id())?;
            let after = self.repo.find_blob(delta.new_file().id())?;
            if before.is_binary() || after.is_binary() {
                warn!("Skipping binary file: {}", path);
                continue;
            }

            debug!("Collected modified file: {}", path);
            changes.insert(
                path,
                String::from_utf8_lossy(before.content()),
                String::from_utf8_lossy(after.content()),
            );
        }

        Ok(changes)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use git2::{Commit, Repository, Signature};
    use std::fs;
    use std::path::Path;

    pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) {
        let workdir = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = workdir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();

        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<Commit> = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
            .unwrap();
    }
}
