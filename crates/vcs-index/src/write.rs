//! Index file serialization.

use std::io::Write;
use std::path::Path;

use vcs_hash::Hasher;
use vcs_utils::lockfile::LockFile;
use vcs_utils::{LockError, UtilError};

use crate::entry::IndexEntry;
use crate::{Index, IndexError};

pub(crate) const SIGNATURE: &[u8; 4] = b"DIRC";
const VERSION: u32 = 2;

/// ctime, mtime, dev, ino, mode, uid, gid, size.
pub(crate) const STAT_LEN: usize = 40;

/// On-disk size of an entry including its NUL padding to a multiple of 8.
pub(crate) fn entry_size(id_len: usize, name_len: usize, extended: bool) -> usize {
    let flags_len = if extended { 4 } else { 2 };
    (STAT_LEN + id_len + flags_len + name_len + 8) & !7
}

pub(crate) fn serialize(index: &Index) -> Result<Vec<u8>, IndexError> {
    let id_len = index.hash_algorithm().digest_len();
    let mut buf = Vec::with_capacity(12 + index.len() * (STAT_LEN + id_len + 32));
    buf.extend_from_slice(SIGNATURE);
    buf.extend_from_slice(&VERSION.to_be_bytes());
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());
    for entry in index.iter() {
        write_entry(&mut buf, entry, id_len);
    }
    let checksum = Hasher::digest(index.hash_algorithm(), &buf)?;
    buf.extend_from_slice(checksum.as_bytes());
    Ok(buf)
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry, id_len: usize) {
    let start = buf.len();
    let s = &entry.stat;
    for field in [
        s.ctime_secs,
        s.ctime_nsecs,
        s.mtime_secs,
        s.mtime_nsecs,
        s.dev,
        s.ino,
        entry.mode.raw(),
        s.uid,
        s.gid,
        s.size,
    ] {
        buf.extend_from_slice(&field.to_be_bytes());
    }
    buf.extend_from_slice(entry.id.as_bytes());

    let mut flags = entry.path.len().min(0x0fff) as u16;
    flags |= u16::from(entry.stage.as_u8()) << 12;
    if entry.assume_valid {
        flags |= 0x8000;
    }
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&entry.path);

    let padded = entry_size(id_len, entry.path.len(), false);
    buf.resize(start + padded, 0);
}

/// Replace `path` through its lock file. A held lock fails with `Locked`.
pub(crate) fn write_to(index: &Index, path: &Path) -> Result<(), IndexError> {
    let data = serialize(index)?;
    let mut lock = LockFile::acquire(path).map_err(|e| lock_error(e, path))?;
    lock.write_all(&data)?;
    lock.commit().map_err(|e| lock_error(e, path))?;
    tracing::debug!(path = %path.display(), entries = index.len(), "wrote index");
    Ok(())
}

fn lock_error(err: UtilError, path: &Path) -> IndexError {
    match err {
        UtilError::Lock(LockError::AlreadyLocked { .. }) => IndexError::Locked(path.to_path_buf()),
        other => IndexError::Util(other),
    }
}
