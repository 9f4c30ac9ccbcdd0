use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{LockError, UtilError};
use crate::Result;

const LOCK_SUFFIX: &str = ".lock";

/// Longest single sleep between two acquisition attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(25);

/// Scoped exclusive lock on a file path.
///
/// Acquiring creates `<path>.lock` with create-new semantics, so at most one
/// holder exists across threads and processes. The new contents are written
/// into the lock file; [`LockFile::commit`] renames it over the target. A
/// guard dropped without committing removes the lock file and leaves the
/// target untouched.
pub struct LockFile {
    path: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    released: bool,
}

impl LockFile {
    /// Acquire the lock, failing immediately if it is already held.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = lock_path_for(&path);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    LockError::AlreadyLocked {
                        path: lock_path.clone(),
                    }
                } else {
                    LockError::Create {
                        path: lock_path.clone(),
                        source: e,
                    }
                }
            })?;

        Ok(Self {
            path,
            lock_path,
            file: Some(file),
            released: false,
        })
    }

    /// Acquire the lock, retrying with backoff while another holder has it.
    ///
    /// Gives up with `AlreadyLocked` once `timeout` has elapsed. A zero
    /// timeout behaves like [`LockFile::acquire`].
    pub fn acquire_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(1);
        loop {
            match Self::acquire(path) {
                Err(UtilError::Lock(LockError::AlreadyLocked { path: lock_path })) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!(lock = %lock_path.display(), "lock still held after timeout");
                        return Err(LockError::AlreadyLocked { path: lock_path }.into());
                    }
                    thread::sleep(backoff.min(deadline - now));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                other => return other,
            }
        }
    }

    /// Try to acquire without waiting. `Ok(None)` means the lock is held.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(UtilError::Lock(LockError::AlreadyLocked { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The target file path (without `.lock`).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock file path (with `.lock`).
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Flush the new contents and atomically rename them over the target.
    pub fn commit(mut self) -> Result<()> {
        let commit_err = |path: &Path, source| LockError::Commit {
            path: path.to_path_buf(),
            source,
        };
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| commit_err(&self.lock_path, e))?;
            file.sync_all().map_err(|e| commit_err(&self.lock_path, e))?;
        }
        fs::rename(&self.lock_path, &self.path).map_err(|e| commit_err(&self.lock_path, e))?;
        self.released = true;
        Ok(())
    }

    /// Release the lock without touching the target.
    pub fn rollback(mut self) -> Result<()> {
        self.file.take();
        self.released = true;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `<path>.lock`, the lock file guarding `path`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.released {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        fs::write(&target, b"old").unwrap();

        let mut lock = LockFile::acquire(&target).unwrap();
        assert!(lock.lock_path().exists());
        lock.write_all(b"new").unwrap();
        lock.commit().unwrap();

        assert!(!dir.path().join("HEAD.lock").exists());
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn drop_without_commit_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("index");
        fs::write(&target, b"original").unwrap();

        {
            let mut lock = LockFile::acquire(&target).unwrap();
            lock.write_all(b"discarded").unwrap();
        }

        assert!(!dir.path().join("index.lock").exists());
        assert_eq!(fs::read(&target).unwrap(), b"original");
    }

    #[test]
    fn rollback_releases() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config");

        let lock = LockFile::acquire(&target).unwrap();
        lock.rollback().unwrap();
        assert!(!target.exists());
        assert!(LockFile::try_acquire(&target).unwrap().is_some());
    }

    #[test]
    fn second_acquire_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");

        let _held = LockFile::acquire(&target).unwrap();
        match LockFile::acquire(&target) {
            Err(e) => assert_eq!(e.kind(), crate::ErrorKind::Locked),
            Ok(_) => panic!("expected the lock to be held"),
        }
        assert!(LockFile::try_acquire(&target).unwrap().is_none());
    }

    #[test]
    fn timeout_expires_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");

        let _held = LockFile::acquire(&target).unwrap();
        let start = Instant::now();
        let result = LockFile::acquire_timeout(&target, Duration::from_millis(30));
        assert!(matches!(
            result,
            Err(UtilError::Lock(LockError::AlreadyLocked { .. }))
        ));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn timeout_succeeds_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");

        let held = LockFile::acquire(&target).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            drop(held);
        });
        let lock = LockFile::acquire_timeout(&target, Duration::from_secs(5)).unwrap();
        releaser.join().unwrap();
        lock.rollback().unwrap();
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/repo/.git/refs/heads/main")),
            PathBuf::from("/repo/.git/refs/heads/main.lock")
        );
    }
}
