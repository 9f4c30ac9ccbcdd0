//! The `packed-refs` file.
//!
//! ```text
//! # pack-refs with: peeled fully-peeled sorted
//! <hex> <refname>
//! ^<hex>            peeled target of the annotated tag on the line above
//! ```
//!
//! Loose files shadow packed entries of the same name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::name::RefName;

const HEADER: &[u8] = b"# pack-refs with: peeled fully-peeled sorted \n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRef {
    pub name: RefName,
    pub id: ObjectId,
    pub peeled: Option<ObjectId>,
}

/// Parsed `packed-refs`, always kept sorted by name.
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    refs: Vec<PackedRef>,
}

impl PackedRefs {
    pub fn parse(data: &[u8], algo: HashAlgorithm) -> Result<Self, RefError> {
        let mut refs: Vec<PackedRef> = Vec::new();
        let parse_id = |hex: &[u8]| -> Result<ObjectId, RefError> {
            let hex = hex
                .to_str()
                .map_err(|_| RefError::Parse("non-ASCII id in packed-refs".into()))?;
            Ok(ObjectId::from_hex_with(hex.trim_end(), algo)?)
        };

        for line in data.lines() {
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            if let Some(hex) = line.strip_prefix(b"^") {
                let last = refs
                    .last_mut()
                    .ok_or_else(|| RefError::Parse("peeled line without a preceding ref".into()))?;
                last.peeled = Some(parse_id(hex)?);
                continue;
            }

            let space = line
                .find_byte(b' ')
                .ok_or_else(|| RefError::Parse("packed-refs line without a name".into()))?;
            let name = line[space + 1..]
                .to_str()
                .map_err(|_| RefError::Parse("non-UTF-8 name in packed-refs".into()))?;
            refs.push(PackedRef {
                name: RefName::new(name.trim_end())?,
                id: parse_id(&line[..space])?,
                peeled: None,
            });
        }

        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs.dedup_by(|later, earlier| later.name == earlier.name);
        Ok(Self { refs })
    }

    /// Load from `git_dir`; a missing file is an empty set.
    pub fn load(git_dir: &Path, algo: HashAlgorithm) -> Result<Self, RefError> {
        let path = packed_refs_path(git_dir);
        match fs::read(&path) {
            Ok(data) => Self::parse(&data, algo),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(RefError::IoPath { path, source }),
        }
    }

    pub fn find(&self, name: &RefName) -> Option<&PackedRef> {
        self.refs
            .binary_search_by(|r| r.name.cmp(name))
            .ok()
            .map(|i| &self.refs[i])
    }

    pub fn insert(&mut self, entry: PackedRef) {
        match self.refs.binary_search_by(|r| r.name.cmp(&entry.name)) {
            Ok(i) => self.refs[i] = entry,
            Err(i) => self.refs.insert(i, entry),
        }
    }

    pub fn remove(&mut self, name: &RefName) -> Option<PackedRef> {
        let i = self.refs.binary_search_by(|r| r.name.cmp(name)).ok()?;
        Some(self.refs.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackedRef> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = HEADER.to_vec();
        for r in &self.refs {
            out.extend_from_slice(format!("{} {}\n", r.id, r.name).as_bytes());
            if let Some(peeled) = &r.peeled {
                out.extend_from_slice(format!("^{peeled}\n").as_bytes());
            }
        }
        out
    }

    /// Replace the file's contents while holding an already acquired lock
    /// on it. An empty set deletes the file.
    pub(crate) fn commit(&self, git_dir: &Path, mut lock: LockFile) -> Result<(), RefError> {
        if self.is_empty() {
            lock.rollback()?;
            let path = packed_refs_path(git_dir);
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(RefError::IoPath { path, source }),
            };
        }
        lock.write_all(&self.to_bytes())?;
        lock.commit()?;
        Ok(())
    }
}

pub(crate) fn packed_refs_path(git_dir: &Path) -> PathBuf {
    git_dir.join("packed-refs")
}
