use std::cmp::Ordering;
use std::collections::HashSet;

use bstr::{BStr, BString, ByteSlice};
use vcs_hash::{HashAlgorithm, ObjectId};

use crate::ObjectError;

/// Mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// 100644
    Regular,
    /// 100755
    Executable,
    /// 120000
    Symlink,
    /// 160000, a commit in another repository.
    Gitlink,
    /// 40000
    Tree,
}

impl FileMode {
    /// Parse the canonical octal spelling. Leading zeros are not canonical.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"100644" => Ok(Self::Regular),
            b"100755" => Ok(Self::Executable),
            b"120000" => Ok(Self::Symlink),
            b"160000" => Ok(Self::Gitlink),
            b"40000" => Ok(Self::Tree),
            _ => Err(ObjectError::InvalidFileMode(
                String::from_utf8_lossy(s).into_owned(),
            )),
        }
    }

    /// Map a numeric mode, as stored in the index.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o160000 => Some(Self::Gitlink),
            0o040000 => Some(Self::Tree),
            _ => None,
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Gitlink => 0o160000,
            Self::Tree => 0o040000,
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Regular => b"100644",
            Self::Executable => b"100755",
            Self::Symlink => b"120000",
            Self::Gitlink => b"160000",
            Self::Tree => b"40000",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Regular or executable file.
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }
}

/// One named entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: BString,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: FileMode, name: impl Into<BString>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    /// Canonical tree order: byte order of names, where a directory name
    /// compares as if it ended in `/`.
    pub fn cmp_entries(a: &TreeEntry, b: &TreeEntry) -> Ordering {
        base_name_compare(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree())
    }
}

/// Compare two names past their common prefix, treating the end of a
/// directory name as `/` and the end of any other name as NUL.
pub fn base_name_compare(a: &[u8], a_is_dir: bool, b: &[u8], b_is_dir: bool) -> Ordering {
    let common = a.len().min(b.len());
    match a[..common].cmp(&b[..common]) {
        Ordering::Equal => {}
        other => return other,
    }
    let terminator = |name: &[u8], is_dir: bool| match name.get(common) {
        Some(&c) => c,
        None if is_dir => b'/',
        None => 0,
    };
    terminator(a, a_is_dir).cmp(&terminator(b, b_is_dir))
}

fn validate_name(name: &[u8]) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty name".into());
    }
    if name == b"." || name == b".." {
        return Err(format!("reserved name '{}'", name.as_bstr()));
    }
    if name.iter().any(|&b| b == b'/' || b == 0) {
        return Err(format!("name '{}' contains '/' or NUL", name.as_bstr()));
    }
    Ok(())
}

/// A directory listing. Entries are always held in canonical order and
/// names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from entries in any order.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Result<Self, ObjectError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            validate_name(&entry.name).map_err(|reason| ObjectError::InvalidTreeEntry {
                offset: 0,
                reason,
            })?;
            if !seen.insert(entry.name.as_slice()) {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: 0,
                    reason: format!("duplicate name '{}'", entry.name),
                });
            }
        }
        entries.sort_by(TreeEntry::cmp_entries);
        Ok(Self { entries })
    }

    /// Insert or replace the entry with the same name.
    pub fn upsert(&mut self, entry: TreeEntry) -> Result<(), ObjectError> {
        validate_name(&entry.name)
            .map_err(|reason| ObjectError::InvalidTreeEntry { offset: 0, reason })?;
        self.entries.retain(|e| e.name != entry.name);
        let at = self
            .entries
            .binary_search_by(|e| TreeEntry::cmp_entries(e, &entry))
            .unwrap_or_else(|i| i);
        self.entries.insert(at, entry);
        Ok(())
    }

    /// Decode the binary listing `<mode> SP <name> NUL <raw id>`*.
    ///
    /// Only the canonical encoding is accepted: entries strictly ascending in
    /// tree order, canonical mode spellings, valid unique names.
    pub fn decode(content: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        let id_len = algo.digest_len();
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut names = HashSet::new();
        let mut pos = 0;

        while pos < content.len() {
            let bad = |offset: usize, reason: &str| ObjectError::InvalidTreeEntry {
                offset,
                reason: reason.to_string(),
            };
            let space = content[pos..]
                .iter()
                .position(|&b| b == b' ')
                .map(|p| p + pos)
                .ok_or_else(|| bad(pos, "missing space after mode"))?;
            let mode = FileMode::from_bytes(&content[pos..space])
                .map_err(|e| bad(pos, &e.to_string()))?;

            let name_start = space + 1;
            let nul = content[name_start..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| p + name_start)
                .ok_or_else(|| bad(name_start, "missing NUL after name"))?;
            let name = &content[name_start..nul];
            validate_name(name).map_err(|reason| bad(name_start, &reason))?;

            let id_start = nul + 1;
            let id_bytes = content
                .get(id_start..id_start + id_len)
                .ok_or_else(|| bad(id_start, "truncated id"))?;
            let entry = TreeEntry {
                mode,
                name: BString::from(name),
                id: ObjectId::from_bytes(id_bytes, algo)?,
            };

            if !names.insert(name) {
                return Err(bad(pos, "duplicate name"));
            }
            if let Some(prev) = entries.last() {
                if TreeEntry::cmp_entries(prev, &entry) != Ordering::Less {
                    return Err(ObjectError::UnsortedTree { offset: pos });
                }
            }
            entries.push(entry);
            pos = id_start + id_len;
        }

        Ok(Self { entries })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
