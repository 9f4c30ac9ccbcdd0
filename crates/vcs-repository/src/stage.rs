//! Staging: moving content between the working tree, the index and trees.
//!
//! Each call loads the index from disk, changes it and saves it back
//! through `index.lock`, so a concurrent writer makes the save fail with
//! `Locked` instead of being overwritten.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use bstr::{BString, ByteSlice};
use tracing::debug;
use vcs_hash::ObjectId;
use vcs_index::{ConflictSide, Index, StatData};
use vcs_object::FileMode;

use crate::{RepoError, Repository};

impl Repository {
    /// Stage a working tree file. Relative paths are taken from the root
    /// of the working tree.
    pub fn add_path(&self, path: impl AsRef<Path>) -> Result<ObjectId, RepoError> {
        let (abs, rel) = self.work_path(path.as_ref())?;
        let meta = match fs::symlink_metadata(&abs) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RepoError::PathNotFound(abs))
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(RepoError::NotAFile(abs));
        }

        let content = if meta.file_type().is_symlink() {
            link_target_bytes(&fs::read_link(&abs)?)
        } else {
            fs::read(&abs)?
        };
        let filemode = self.config.get_bool_or("core.filemode", cfg!(unix))?;
        let mode = mode_from_metadata(&meta, filemode);

        self.update_index(|index, odb| {
            let id = index.add_blob(odb, rel.as_bstr(), &content, mode)?;
            index.set_stat(rel.as_bstr(), StatData::from_metadata(&meta))?;
            debug!(path = %rel, blob = %id, "staged file");
            Ok(id)
        })
    }

    /// Stage `data` at the repository-relative `path` without touching the
    /// working tree.
    pub fn add_bytes(
        &self,
        path: impl AsRef<[u8]>,
        data: &[u8],
        mode: FileMode,
    ) -> Result<ObjectId, RepoError> {
        let path = path.as_ref().as_bstr();
        self.update_index(|index, odb| Ok(index.add_blob(odb, path, data, mode)?))
    }

    /// Unstage every stage of `path`. The working tree is left alone.
    pub fn remove_path(&self, path: impl AsRef<[u8]>) -> Result<(), RepoError> {
        let path = path.as_ref().as_bstr();
        self.update_index(|index, _| Ok(index.remove(path)?))
    }

    /// Record a conflict on `path`, replacing whatever was staged there.
    pub fn add_conflict(
        &self,
        path: impl AsRef<[u8]>,
        base: Option<ConflictSide>,
        ours: Option<ConflictSide>,
        theirs: Option<ConflictSide>,
    ) -> Result<(), RepoError> {
        let path = path.as_ref().as_bstr();
        self.update_index(|index, _| Ok(index.add_conflict(path, base, ours, theirs)?))
    }

    /// Write the staged content as trees and return the root tree id.
    pub fn write_tree(&self) -> Result<ObjectId, RepoError> {
        Ok(self.index()?.write_tree(&self.odb)?)
    }

    /// Replace the index with the tree `id` peels to.
    pub fn read_tree(&self, id: &ObjectId) -> Result<(), RepoError> {
        let (tree_id, _) = self.odb.peel_to_tree(id)?;
        self.update_index(|index, odb| Ok(index.read_tree(odb, &tree_id)?))
    }

    fn update_index<T>(
        &self,
        change: impl FnOnce(&mut Index, &vcs_odb::ObjectDatabase) -> Result<T, RepoError>,
    ) -> Result<T, RepoError> {
        if self.is_bare() {
            return Err(RepoError::BareRepo("stage changes"));
        }
        let mut index = self.index()?;
        let out = change(&mut index, &self.odb)?;
        index.save()?;
        Ok(out)
    }

    /// Absolute and repository-relative forms of a working tree path.
    fn work_path(&self, path: &Path) -> Result<(PathBuf, BString), RepoError> {
        let work_tree = self
            .work_tree
            .as_deref()
            .ok_or(RepoError::BareRepo("add files"))?;
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            work_tree.join(path)
        };
        let mut abs = normalize(&joined);
        if !abs.starts_with(work_tree) {
            // The caller may have spelled the work tree through a symlink.
            if let (Some(parent), Some(name)) = (abs.parent(), abs.file_name()) {
                if let Ok(parent) = fs::canonicalize(parent) {
                    abs = parent.join(name);
                }
            }
        }
        let rel = abs
            .strip_prefix(work_tree)
            .map_err(|_| RepoError::OutsideWorkTree(path.to_path_buf()))?;

        let mut out = BString::default();
        for component in rel.components() {
            let Component::Normal(part) = component else {
                return Err(RepoError::OutsideWorkTree(path.to_path_buf()));
            };
            if !out.is_empty() {
                out.push(b'/');
            }
            out.extend_from_slice(&os_bytes(part));
        }
        if out.is_empty() {
            return Err(RepoError::NotAFile(abs));
        }
        Ok((abs, out))
    }
}

/// Lexically resolve `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn mode_from_metadata(meta: &fs::Metadata, filemode: bool) -> FileMode {
    if meta.file_type().is_symlink() {
        return FileMode::Symlink;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if filemode && meta.permissions().mode() & 0o111 != 0 {
            return FileMode::Executable;
        }
    }
    #[cfg(not(unix))]
    let _ = filemode;
    FileMode::Regular
}

#[cfg(unix)]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn os_bytes(s: &std::ffi::OsStr) -> Vec<u8> {
    s.to_string_lossy().replace('\\', "/").into_bytes()
}

pub(crate) fn link_target_bytes(target: &Path) -> Vec<u8> {
    os_bytes(target.as_os_str())
}
