//! Per-reference history logs under `logs/<refname>`.
//!
//! One line per change, oldest first on disk:
//! `<old-hex> SP <new-hex> SP <identity> TAB <message> LF`, where the
//! identity is a signature in commit-header form. Creation records the
//! null id as the old value.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bstr::{BString, ByteSlice};
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::Signature;

use crate::error::RefError;
use crate::name::RefName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old: ObjectId,
    pub new: ObjectId,
    pub committer: Signature,
    /// Single line; newlines are folded to spaces on write.
    pub message: BString,
}

impl ReflogEntry {
    pub fn new(
        old: Option<ObjectId>,
        new: ObjectId,
        committer: Signature,
        message: impl Into<BString>,
    ) -> Self {
        Self {
            old: old.unwrap_or_else(|| new.algorithm().null_id()),
            new,
            committer,
            message: message.into(),
        }
    }

    pub fn parse(line: &[u8], algo: HashAlgorithm) -> Result<Self, RefError> {
        let hex_len = algo.hex_len();
        let malformed = |reason: &str| RefError::Parse(format!("reflog line: {reason}"));

        if line.len() < 2 * hex_len + 2
            || line[hex_len] != b' '
            || line[2 * hex_len + 1] != b' '
        {
            return Err(malformed("truncated id fields"));
        }
        let id = |range: &[u8]| -> Result<ObjectId, RefError> {
            let hex = range.to_str().map_err(|_| malformed("non-ASCII id"))?;
            Ok(ObjectId::from_hex_with(hex, algo)?)
        };
        let old = id(&line[..hex_len])?;
        let new = id(&line[hex_len + 1..2 * hex_len + 1])?;

        let rest = &line[2 * hex_len + 2..];
        let (identity, message) = match rest.find_byte(b'\t') {
            Some(tab) => (&rest[..tab], &rest[tab + 1..]),
            None => (rest, &b""[..]),
        };
        let committer = Signature::parse(identity.as_bstr())
            .map_err(|e| RefError::Parse(format!("reflog identity: {e}")))?;

        Ok(Self {
            old,
            new,
            committer,
            message: BString::from(message),
        })
    }

    /// Encoded line without the trailing newline.
    pub fn to_line(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.message.len());
        out.extend_from_slice(self.old.to_hex().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.new.to_hex().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\t');
        out.extend(
            self.message
                .trim_end()
                .iter()
                .map(|&b| if b == b'\n' { b' ' } else { b }),
        );
        out
    }
}

pub fn reflog_path(git_dir: &Path, name: &RefName) -> PathBuf {
    git_dir.join("logs").join(name.as_str())
}

/// Entries for `name`, newest first. A ref without a log has no entries.
pub fn read_reflog(
    git_dir: &Path,
    name: &RefName,
    algo: HashAlgorithm,
) -> Result<Vec<ReflogEntry>, RefError> {
    let path = reflog_path(git_dir, name);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(RefError::IoPath { path, source }),
    };

    let mut entries = data
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| ReflogEntry::parse(line, algo))
        .collect::<Result<Vec<_>, _>>()?;
    entries.reverse();
    Ok(entries)
}

/// Append one entry. Lines are written with a single `write_all` on an
/// append-mode handle, so concurrent appenders never interleave within a line.
pub fn append_reflog(git_dir: &Path, name: &RefName, entry: &ReflogEntry) -> Result<(), RefError> {
    let path = reflog_path(git_dir, name);
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| RefError::IoPath { path, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut line = entry.to_line();
    line.push(b'\n');
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(&line))
        .map_err(io_err(&path))?;
    tracing::trace!(reference = %name, new = %entry.new, "reflog entry appended");
    Ok(())
}

/// Remove the log of a deleted reference, pruning directories it leaves empty.
pub(crate) fn delete_reflog(git_dir: &Path, name: &RefName) -> Result<(), RefError> {
    let path = reflog_path(git_dir, name);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(RefError::IoPath { path, source }),
    }
    if let Some(parent) = path.parent() {
        vcs_utils::fs::prune_empty_dirs(parent, &git_dir.join("logs"));
    }
    Ok(())
}
