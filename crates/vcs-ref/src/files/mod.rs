pub(crate) mod loose;
pub mod packed;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::name::RefName;
use crate::reflog::{self, ReflogEntry};
use crate::Reference;

use self::packed::{packed_refs_path, PackedRefs};

/// Hops allowed when following symbolic references.
pub const MAX_SYMREF_DEPTH: usize = 10;

/// How long a writer waits for another writer's lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of a successful compare-and-swap update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    /// The direct reference actually written, after following symbolic links.
    pub name: RefName,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
}

/// Reference store backed by loose files under the repository directory
/// and an optional `packed-refs` file.
///
/// Every mutation of a name holds `<name>.lock` for its whole
/// read-check-write sequence; readers never take locks and always see
/// either the old or the new file because writes land by rename.
#[derive(Debug, Clone)]
pub struct FilesRefStore {
    git_dir: PathBuf,
    algo: HashAlgorithm,
    lock_timeout: Duration,
}

impl FilesRefStore {
    pub fn new(git_dir: impl Into<PathBuf>, algo: HashAlgorithm) -> Self {
        Self {
            git_dir: git_dir.into(),
            algo,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn set_lock_timeout(&mut self, timeout: Duration) {
        self.lock_timeout = timeout;
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// The stored value of `name` without following symbolic links.
    pub fn find(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        if let Some(reference) = loose::read(&self.git_dir, name, self.algo)? {
            return Ok(Some(reference));
        }
        Ok(self.packed()?.find(name).map(|p| Reference::Direct {
            name: p.name.clone(),
            target: p.id,
        }))
    }

    pub fn lookup(&self, name: &RefName) -> Result<Reference, RefError> {
        self.find(name)?
            .ok_or_else(|| RefError::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &RefName) -> Result<bool, RefError> {
        Ok(self.find(name)?.is_some())
    }

    /// Follow symbolic links from `name` to the last reference in the chain
    /// and return it with its target, or `None` when that last name does
    /// not exist yet.
    ///
    /// Fails with `NotFound` when `name` itself is absent and with
    /// `SymrefLoop` after [`MAX_SYMREF_DEPTH`] hops.
    pub fn follow(&self, name: &RefName) -> Result<(RefName, Option<ObjectId>), RefError> {
        let mut current = name.clone();
        for hop in 0..=MAX_SYMREF_DEPTH {
            match self.find(&current)? {
                Some(Reference::Direct { target, .. }) => return Ok((current, Some(target))),
                Some(Reference::Symbolic { target, .. }) => current = target,
                None if hop == 0 => return Err(RefError::NotFound(name.to_string())),
                None => return Ok((current, None)),
            }
        }
        Err(RefError::SymrefLoop(name.to_string()))
    }

    /// Resolve `name` to an object id.
    ///
    /// A chain ending at a branch that does not exist yet is `Unborn`; one
    /// ending anywhere else is `NotFound`.
    pub fn resolve(&self, name: &RefName) -> Result<ObjectId, RefError> {
        match self.follow(name)? {
            (_, Some(id)) => Ok(id),
            (last, None) if last.is_branch() => Err(RefError::Unborn(last.to_string())),
            (last, None) => Err(RefError::NotFound(last.to_string())),
        }
    }

    /// The peeled target recorded for a packed annotated tag, if `name` is
    /// served from `packed-refs` and a peeled line was written for it.
    pub fn peeled(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        if loose::read(&self.git_dir, name, self.algo)?.is_some() {
            return Ok(None);
        }
        Ok(self.packed()?.find(name).and_then(|p| p.peeled))
    }

    /// Create a direct reference. An existing reference is `AlreadyExists`
    /// unless `force`, which overwrites it.
    pub fn create(&self, name: &RefName, target: ObjectId, force: bool) -> Result<(), RefError> {
        self.write_new(name, &loose::direct_content(&target), force)?;
        debug!(reference = %name, target = %target, force, "created reference");
        Ok(())
    }

    pub fn create_symbolic(
        &self,
        name: &RefName,
        target: &RefName,
        force: bool,
    ) -> Result<(), RefError> {
        self.write_new(name, &loose::symbolic_content(target), force)?;
        debug!(reference = %name, target = %target, force, "created symbolic reference");
        Ok(())
    }

    fn write_new(&self, name: &RefName, content: &[u8], force: bool) -> Result<(), RefError> {
        self.check_name_conflict(name)?;
        let mut lock = self.lock_ref(name)?;
        let existing = match self.find(name) {
            Ok(existing) => existing,
            Err(e) => {
                self.abandon(lock, name)?;
                return Err(e);
            }
        };
        if !force && existing.is_some() {
            self.abandon(lock, name)?;
            return Err(RefError::AlreadyExists(name.to_string()));
        }
        lock.write_all(content)?;
        lock.commit()?;
        Ok(())
    }

    /// Compare-and-swap: point the reference named by `name`, after
    /// following symbolic links, at `new`, provided its current value is
    /// `expected`. `None` expects the reference not to exist.
    ///
    /// The current value is re-read while holding the lock, so of several
    /// writers racing from the same expectation exactly one succeeds and the
    /// rest fail with `CasFailed`.
    pub fn update(
        &self,
        name: &RefName,
        new: ObjectId,
        expected: Option<ObjectId>,
    ) -> Result<RefUpdate, RefError> {
        let target = match self.follow(name) {
            Ok((last, _)) => last,
            Err(RefError::NotFound(_)) => name.clone(),
            Err(e) => return Err(e),
        };

        self.check_name_conflict(&target)?;
        let mut lock = self.lock_ref(&target)?;
        let current = match self.find(&target) {
            Ok(Some(Reference::Direct { target: id, .. })) => Some(id),
            Ok(Some(Reference::Symbolic { .. }) | None) => None,
            Err(e) => {
                self.abandon(lock, &target)?;
                return Err(e);
            }
        };
        if current != expected {
            self.abandon(lock, &target)?;
            debug!(
                reference = %target,
                expected = ?expected,
                actual = ?current,
                "compare-and-swap rejected"
            );
            return Err(RefError::CasFailed {
                name: target.to_string(),
                expected,
                actual: current,
            });
        }

        lock.write_all(&loose::direct_content(&new))?;
        lock.commit()?;
        debug!(reference = %target, old = ?current, new = %new, "updated reference");
        Ok(RefUpdate {
            name: target,
            old: current,
            new,
        })
    }

    /// Delete a reference, its packed entry and its log.
    ///
    /// `HEAD` itself and every reference on its symbolic chain are refused.
    pub fn delete(&self, name: &RefName) -> Result<(), RefError> {
        if name.is_head() || self.is_checked_out(name)? {
            return Err(RefError::CheckedOut(name.to_string()));
        }
        if !self.exists(name)? {
            return Err(RefError::NotFound(name.to_string()));
        }

        let lock = self.lock_ref(name)?;
        let result = self.delete_locked(name);
        self.abandon(lock, name)?;
        result?;

        reflog::delete_reflog(&self.git_dir, name)?;
        debug!(reference = %name, "deleted reference");
        Ok(())
    }

    fn delete_locked(&self, name: &RefName) -> Result<(), RefError> {
        let loose = loose::read(&self.git_dir, name, self.algo)?;
        let in_packed = self.packed()?.find(name).is_some();
        if loose.is_none() && !in_packed {
            return Err(RefError::NotFound(name.to_string()));
        }

        if in_packed {
            let packed_lock = self.lock(&packed_refs_path(&self.git_dir))?;
            let mut packed = self.packed()?;
            packed.remove(name);
            packed.commit(&self.git_dir, packed_lock)?;
        }
        if loose.is_some() {
            let path = loose::loose_path(&self.git_dir, name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(RefError::IoPath { path, source }),
            }
        }
        Ok(())
    }

    /// Snapshot of every reference whose full name starts with `prefix`,
    /// ordered by name. Loose values shadow packed ones; each call reads
    /// the store afresh.
    pub fn list(&self, prefix: &str) -> Result<std::vec::IntoIter<Reference>, RefError> {
        let mut by_name = BTreeMap::new();
        for packed in self.packed()?.iter() {
            if packed.name.as_str().starts_with(prefix) {
                let reference = Reference::Direct {
                    name: packed.name.clone(),
                    target: packed.id,
                };
                by_name.insert(packed.name.clone(), reference);
            }
        }
        for name in loose::names(&self.git_dir)? {
            if !name.as_str().starts_with(prefix) {
                continue;
            }
            // A name can vanish between listing and reading.
            if let Some(reference) = loose::read(&self.git_dir, &name, self.algo)? {
                by_name.insert(name, reference);
            }
        }
        Ok(by_name.into_values().collect::<Vec<_>>().into_iter())
    }

    pub fn read_reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, RefError> {
        reflog::read_reflog(&self.git_dir, name, self.algo)
    }

    pub fn append_reflog(&self, name: &RefName, entry: &ReflogEntry) -> Result<(), RefError> {
        reflog::append_reflog(&self.git_dir, name, entry)
    }

    fn packed(&self) -> Result<PackedRefs, RefError> {
        PackedRefs::load(&self.git_dir, self.algo)
    }

    /// Whether `HEAD` reaches `name` through symbolic links.
    fn is_checked_out(&self, name: &RefName) -> Result<bool, RefError> {
        let mut current = RefName::head();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.find(&current)? {
                Some(Reference::Symbolic { target, .. }) if target == *name => return Ok(true),
                Some(Reference::Symbolic { target, .. }) => current = target,
                _ => return Ok(false),
            }
        }
        Ok(false)
    }

    fn lock_ref(&self, name: &RefName) -> Result<LockFile, RefError> {
        let path = loose::loose_path(&self.git_dir, name);
        let Some(parent) = path.parent() else {
            return self.lock(&path);
        };
        let mut attempts = 0;
        loop {
            fs::create_dir_all(parent).map_err(|source| RefError::IoPath {
                path: parent.to_path_buf(),
                source,
            })?;
            match self.lock(&path) {
                // Another writer pruned the directory in between.
                Err(_) if attempts < 3 && !parent.is_dir() => attempts += 1,
                Err(e) => {
                    self.prune_dirs(name);
                    return Err(e);
                }
                Ok(lock) => return Ok(lock),
            }
        }
    }

    /// Release `lock` without writing and remove the directories that were
    /// only created to hold it.
    fn abandon(&self, lock: LockFile, name: &RefName) -> Result<(), RefError> {
        lock.rollback()?;
        self.prune_dirs(name);
        Ok(())
    }

    fn prune_dirs(&self, name: &RefName) {
        let path = loose::loose_path(&self.git_dir, name);
        if let Some(parent) = path.parent() {
            vcs_utils::fs::prune_empty_dirs(parent, &self.git_dir.join("refs"));
        }
    }

    fn lock(&self, path: &Path) -> Result<LockFile, RefError> {
        LockFile::acquire_timeout(path, self.lock_timeout).map_err(|e| {
            let e = RefError::from(e);
            if matches!(e, RefError::Locked(_)) {
                warn!(path = %path.display(), timeout = ?self.lock_timeout, "reference lock contended");
            }
            e
        })
    }

    /// No existing file or directory, loose or packed, may stand where
    /// `name` needs a directory or a file.
    fn check_name_conflict(&self, name: &RefName) -> Result<(), RefError> {
        let conflict = |other: &str| RefError::DirectoryConflict {
            name: name.to_string(),
            conflict: other.to_string(),
        };
        if let Some(path) = loose::conflicting_path(&self.git_dir, name) {
            return Err(conflict(&path));
        }
        let nested = |outer: &str, inner: &str| {
            inner.len() > outer.len()
                && inner.starts_with(outer)
                && inner.as_bytes()[outer.len()] == b'/'
        };
        let own = name.as_str();
        for packed in self.packed()?.iter() {
            let other = packed.name.as_str();
            if nested(own, other) || nested(other, own) {
                return Err(conflict(other));
            }
        }
        Ok(())
    }
}
