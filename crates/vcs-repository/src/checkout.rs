//! Switching the working tree, index and `HEAD` to another commit.
//!
//! Checkout runs in two phases. Planning diffs the trees of the current and
//! the target commit, validates every changed path, loads every blob to be
//! written and checks each path against the index and the working tree;
//! nothing is touched until the whole plan is known to be safe. Applying
//! then removes, writes, re-stages and finally moves `HEAD`.
//!
//! Without `force` a path is refused when its staged or working copy
//! matches neither the old nor the new tree, when a directory or untracked
//! file sits where a file has to go, or when the index has unmerged paths.
//! Local changes on paths that are equal in both trees are carried over.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use tracing::debug;
use vcs_hash::{Hasher, ObjectId};
use vcs_index::{flatten_tree, validate_path, Index, IndexEntry, IndexError, Stage, StatData};
use vcs_object::FileMode;
use vcs_ref::{RefError, RefName, BRANCH_PREFIX};
use vcs_utils::fs::{prune_empty_dirs, write_atomic};

use crate::stage::{link_target_bytes, mode_from_metadata};
use crate::{RepoError, Repository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// Overwrite local changes instead of refusing.
    pub force: bool,
}

/// A blob as recorded in a tree or the index.
type Item = (ObjectId, FileMode);

enum Target {
    Branch(RefName),
    Detached,
}

/// A path whose tree entry differs between the old and new commit.
#[derive(Debug)]
struct Change {
    path: BString,
    old: Option<Item>,
    new: Option<Item>,
}

/// What currently sits at a path in the working tree.
enum WorkState {
    Missing,
    Directory,
    File(Item),
}

impl Repository {
    /// Check out a branch (attaching `HEAD`) or any other revision
    /// (detaching it). Returns the commit now checked out.
    pub fn checkout(&self, spec: &str) -> Result<ObjectId, RepoError> {
        self.checkout_with(spec, &CheckoutOptions::default())
    }

    pub fn checkout_with(
        &self,
        spec: &str,
        options: &CheckoutOptions,
    ) -> Result<ObjectId, RepoError> {
        let work_tree = self
            .work_tree
            .as_deref()
            .ok_or(RepoError::BareRepo("check out"))?;

        let (target, commit_id) = self.checkout_target(spec)?;
        let new_tree = self.odb.peel_to_tree(&commit_id)?.0;
        let old_tree = match self.head_id() {
            Ok(id) => Some(self.odb.peel_to_tree(&id)?.0),
            Err(RepoError::Ref(RefError::Unborn(_))) => None,
            Err(e) => return Err(e),
        };

        let mut index = self.index()?;
        let changes = self.diff_trees(old_tree.as_ref(), &new_tree)?;
        let contents = self.load_contents(&changes)?;
        debug!(target = %commit_id, changes = changes.len(), force = options.force, "planned checkout");

        if !options.force {
            let unmerged: Vec<BString> = index.conflicts().into_iter().map(|c| c.path).collect();
            if !unmerged.is_empty() {
                return Err(IndexError::Unmerged(unmerged).into());
            }
            let conflicts = self.find_conflicts(work_tree, &index, &changes)?;
            if !conflicts.is_empty() {
                debug!(count = conflicts.len(), "checkout refused");
                return Err(RepoError::CheckoutConflict(conflicts));
            }
        }

        self.apply_changes(work_tree, &changes, &contents)?;

        if options.force {
            index.read_tree(&self.odb, &new_tree)?;
        }
        for change in &changes {
            match change.new {
                Some((id, mode)) => {
                    let mut entry = IndexEntry::new(change.path.clone(), id, mode);
                    let abs = work_path(work_tree, change.path.as_bstr());
                    if let Ok(meta) = fs::symlink_metadata(abs) {
                        entry.stat = StatData::from_metadata(&meta);
                    }
                    index.add_entry(entry)?;
                }
                None => match index.remove(change.path.as_bstr()) {
                    Ok(()) | Err(IndexError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }
        index.save()?;

        self.move_head(&target, commit_id)?;
        Ok(commit_id)
    }

    /// A branch name wins over other revisions of the same spelling.
    fn checkout_target(&self, spec: &str) -> Result<(Target, ObjectId), RepoError> {
        let branch = if spec.starts_with(BRANCH_PREFIX) {
            RefName::new(spec).ok()
        } else {
            RefName::branch(spec).ok()
        };
        if let Some(branch) = branch {
            if self.refs.exists(&branch)? {
                let id = self.refs.resolve(&branch)?;
                let (commit_id, _) = self.odb.peel_to_commit(&id)?;
                return Ok((Target::Branch(branch), commit_id));
            }
        }
        let id = self.revparse_single(spec)?;
        let (commit_id, _) = self.odb.peel_to_commit(&id)?;
        Ok((Target::Detached, commit_id))
    }

    fn diff_trees(
        &self,
        old: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<Vec<Change>, RepoError> {
        let flatten = |tree: &ObjectId| -> Result<HashMap<BString, Item>, RepoError> {
            Ok(flatten_tree(&self.odb, tree)?
                .into_iter()
                .map(|item| (item.path, (item.id, item.mode)))
                .collect())
        };
        let old = match old {
            Some(tree) => flatten(tree)?,
            None => HashMap::new(),
        };
        let new = flatten(new)?;

        let paths: BTreeSet<&BString> = old.keys().chain(new.keys()).collect();
        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let (before, after) = (old.get(path).copied(), new.get(path).copied());
                (before != after).then(|| Change {
                    path: path.clone(),
                    old: before,
                    new: after,
                })
            })
            .collect())
    }

    fn find_conflicts(
        &self,
        work_tree: &Path,
        index: &Index,
        changes: &[Change],
    ) -> Result<Vec<BString>, RepoError> {
        let removed: BTreeSet<&[u8]> = changes
            .iter()
            .filter(|c| c.new.is_none())
            .map(|c| c.path.as_slice())
            .collect();
        let filemode = self.config.get_bool_or("core.filemode", cfg!(unix))?;

        let mut conflicts = Vec::new();
        for change in changes {
            let staged = index
                .get(change.path.as_bstr(), Stage::Normal)
                .map(|e| (e.id, e.mode));
            let safe = |value: Option<Item>| value == change.old || value == change.new;

            let conflicted = !safe(staged)
                || match self.work_state(work_tree, index, change.path.as_bstr(), filemode)? {
                    WorkState::Missing => false,
                    WorkState::Directory => true,
                    WorkState::File(item) => !safe(Some(item)),
                }
                || (change.new.is_some()
                    && blocked_by_file(work_tree, change.path.as_bstr(), &removed));
            if conflicted {
                conflicts.push(change.path.clone());
            }
        }
        Ok(conflicts)
    }

    /// Hash the working file unless its stat data still matches the index.
    fn work_state(
        &self,
        work_tree: &Path,
        index: &Index,
        path: &BStr,
        filemode: bool,
    ) -> Result<WorkState, RepoError> {
        let abs = work_path(work_tree, path);
        let meta = match fs::symlink_metadata(&abs) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(WorkState::Missing),
            // A file in place of a parent directory.
            Err(_) if abs.parent().is_some_and(|p| !p.is_dir()) => return Ok(WorkState::Missing),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Ok(WorkState::Directory);
        }
        if let Some(entry) = index.get(path, Stage::Normal) {
            if !entry.stat.is_empty() && entry.stat.matches(&meta) {
                return Ok(WorkState::File((entry.id, entry.mode)));
            }
        }
        let content = if meta.file_type().is_symlink() {
            link_target_bytes(&fs::read_link(&abs)?)
        } else {
            fs::read(&abs)?
        };
        let id = Hasher::hash_object(self.algo, "blob", &content)?;
        Ok(WorkState::File((id, mode_from_metadata(&meta, filemode))))
    }

    /// Validate every changed path and read the blob of every path to be
    /// written, in `changes` order. Gitlinks and removals carry no content.
    fn load_contents(&self, changes: &[Change]) -> Result<Vec<Option<Vec<u8>>>, RepoError> {
        changes
            .iter()
            .map(|change| -> Result<_, RepoError> {
                validate_path(change.path.as_bstr())?;
                match change.new {
                    Some((id, mode)) if mode != FileMode::Gitlink => {
                        Ok(Some(self.odb.find_blob(&id)?.data))
                    }
                    _ => Ok(None),
                }
            })
            .collect()
    }

    fn apply_changes(
        &self,
        work_tree: &Path,
        changes: &[Change],
        contents: &[Option<Vec<u8>>],
    ) -> Result<(), RepoError> {
        for change in changes.iter().rev().filter(|c| c.new.is_none()) {
            let abs = work_path(work_tree, change.path.as_bstr());
            remove_any(&abs)?;
            if let Some(parent) = abs.parent() {
                prune_empty_dirs(parent, work_tree);
            }
        }

        for (change, content) in changes.iter().zip(contents) {
            let Some((_, mode)) = change.new else {
                continue;
            };
            let abs = work_path(work_tree, change.path.as_bstr());
            clear_ancestors(work_tree, &abs)?;
            if fs::symlink_metadata(&abs).is_ok_and(|m| m.is_dir()) {
                fs::remove_dir_all(&abs)?;
            }
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent)?;
            }
            match content {
                Some(data) => write_entry(&abs, data, mode)?,
                None => fs::create_dir_all(&abs)?,
            }
        }
        Ok(())
    }

    fn move_head(&self, target: &Target, commit_id: ObjectId) -> Result<(), RepoError> {
        let from = self.describe_head()?;
        let old = self.head_id().ok();
        let to = match target {
            Target::Branch(branch) => {
                self.refs.create_symbolic(&RefName::head(), branch, true)?;
                branch.short().to_string()
            }
            Target::Detached => {
                self.refs.create(&RefName::head(), commit_id, true)?;
                commit_id.to_hex()
            }
        };
        debug!(from = %from, to = %to, "moved HEAD");
        self.log_head(old, commit_id, &format!("checkout: moving from {from} to {to}"))
    }
}

fn work_path(work_tree: &Path, path: &BStr) -> PathBuf {
    work_tree.join(path.to_path_lossy())
}

/// Whether some parent of `path` exists as a non-directory that the plan
/// does not remove.
fn blocked_by_file(work_tree: &Path, path: &BStr, removed: &BTreeSet<&[u8]>) -> bool {
    let mut prefix_end = path.find_byte(b'/');
    while let Some(end) = prefix_end {
        let prefix = &path[..end];
        let is_file = fs::symlink_metadata(work_path(work_tree, prefix.as_bstr()))
            .is_ok_and(|m| !m.is_dir());
        if is_file {
            return !removed.contains(&prefix.as_bytes());
        }
        prefix_end = path[end + 1..].find_byte(b'/').map(|i| end + 1 + i);
    }
    false
}

/// Remove files standing where parent directories of `abs` must go.
fn clear_ancestors(work_tree: &Path, abs: &Path) -> Result<(), RepoError> {
    let mut ancestors: Vec<&Path> = abs
        .ancestors()
        .skip(1)
        .take_while(|p| *p != work_tree)
        .collect();
    ancestors.reverse();
    for dir in ancestors {
        match fs::symlink_metadata(dir) {
            Ok(meta) if !meta.is_dir() => fs::remove_file(dir)?,
            _ => {}
        }
    }
    Ok(())
}

fn remove_any(abs: &Path) -> Result<(), RepoError> {
    let result = match fs::symlink_metadata(abs) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(abs),
        Ok(_) => fs::remove_file(abs),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_entry(abs: &Path, data: &[u8], mode: FileMode) -> Result<(), RepoError> {
    #[cfg(unix)]
    if mode == FileMode::Symlink {
        use std::os::unix::ffi::OsStrExt;
        remove_any(abs)?;
        std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(data), abs)?;
        return Ok(());
    }

    write_atomic(abs, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let bits = if mode == FileMode::Executable { 0o755 } else { 0o644 };
        fs::set_permissions(abs, fs::Permissions::from_mode(bits))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_files_block_unless_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "file").unwrap();
        let path = BString::from("a/b.txt");
        assert!(blocked_by_file(dir.path(), path.as_bstr(), &BTreeSet::new()));

        let removed: BTreeSet<&[u8]> = [b"a".as_slice()].into_iter().collect();
        assert!(!blocked_by_file(dir.path(), path.as_bstr(), &removed));
        assert!(!blocked_by_file(dir.path(), b"c/d".as_bstr(), &BTreeSet::new()));
    }

    #[test]
    fn ancestors_are_cleared_top_down() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x"), "in the way").unwrap();
        let target = dir.path().join("x/y/z.txt");
        clear_ancestors(dir.path(), &target).unwrap();
        assert!(!dir.path().join("x").exists());
    }
}
