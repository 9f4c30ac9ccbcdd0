//! The index (staging area).
//!
//! An [`Index`] holds the entries that the next commit's tree will be built
//! from. Entries are unique by `(path, stage)` and always kept sorted by
//! path bytes, then stage, so lookups are binary searches and tree
//! materialization is deterministic. Stages 1-3 record the sides of an
//! unresolved conflict; while any remain, no tree can be written.

pub mod entry;
mod path;
mod read;
mod tree;
mod write;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use vcs_hash::{HashAlgorithm, HashError, ObjectId};
use vcs_object::FileMode;
use vcs_odb::{ObjectDatabase, OdbError};
use vcs_utils::{ErrorKind, UtilError};

pub use entry::{IndexEntry, StatData};
pub use path::validate_path;
pub use tree::{flatten_tree, TreeItem};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("unsupported required index extension '{0}'")]
    RequiredExtension(String),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: BString, reason: &'static str },

    #[error("path '{0}' is not in the index")]
    NotFound(BString),

    #[error("index has unmerged entries: {}", .0.iter().map(|p| p.to_str_lossy()).collect::<Vec<_>>().join(", "))]
    Unmerged(Vec<BString>),

    #[error("a conflict needs at least one side for '{0}'")]
    EmptyConflict(BString),

    #[error("index is locked: {}", .0.display())]
    Locked(PathBuf),

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Util(UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHeader(_)
            | Self::UnsupportedVersion(_)
            | Self::InvalidEntry { .. }
            | Self::RequiredExtension(_) => ErrorKind::CorruptObject,
            Self::ChecksumMismatch => ErrorKind::ChecksumMismatch,
            Self::InvalidPath { .. } | Self::EmptyConflict(_) => ErrorKind::InvalidSpec,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unmerged(_) => ErrorKind::Unmerged,
            Self::Locked(_) => ErrorKind::Locked,
            Self::Odb(e) => e.kind(),
            Self::Hash(e) => e.kind(),
            Self::Util(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Merge stage of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Normal,
    Base,
    Ours,
    Theirs,
}

impl Stage {
    pub fn as_u8(self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Stage::Normal),
            1 => Some(Stage::Base),
            2 => Some(Stage::Ours),
            3 => Some(Stage::Theirs),
            _ => None,
        }
    }

    pub fn is_conflict(self) -> bool {
        self != Stage::Normal
    }
}

/// One side of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSide {
    pub id: ObjectId,
    pub mode: FileMode,
}

/// The recorded sides of one unmerged path. Absent sides were deleted on
/// that side of the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: BString,
    pub base: Option<ConflictSide>,
    pub ours: Option<ConflictSide>,
    pub theirs: Option<ConflictSide>,
}

#[derive(Debug, Clone)]
pub struct Index {
    algo: HashAlgorithm,
    entries: Vec<IndexEntry>,
    /// Where `save` writes; set by `load`.
    path: Option<PathBuf>,
}

impl Index {
    pub fn new(algo: HashAlgorithm) -> Self {
        Self {
            algo,
            entries: Vec::new(),
            path: None,
        }
    }

    /// Read `path`, or start empty if no index file exists there.
    pub fn load(path: impl AsRef<Path>, algo: HashAlgorithm) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let mut index = match std::fs::File::open(path) {
            Ok(file) => read::read_file(&file, algo)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::new(algo),
            Err(e) => return Err(e.into()),
        };
        index.path = Some(path.to_path_buf());
        Ok(index)
    }

    /// Parse an in-memory index file image.
    pub fn from_bytes(data: &[u8], algo: HashAlgorithm) -> Result<Self, IndexError> {
        read::parse(data, algo)
    }

    /// Serialize to the on-disk format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        write::serialize(self)
    }

    /// Write back to the file this index was loaded from.
    pub fn save(&self) -> Result<(), IndexError> {
        match &self.path {
            Some(path) => write::write_to(self, path),
            None => Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "index has no backing file",
            ))),
        }
    }

    /// Write to `path` through `<path>.lock` and adopt it as the backing file.
    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_to(self, path.as_ref())?;
        self.path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.position(path, stage).ok().map(|i| &self.entries[i])
    }

    /// All stages recorded for `path`, in stage order.
    pub fn get_all(&self, path: &BStr) -> &[IndexEntry] {
        let range = self.path_range(path);
        &self.entries[range]
    }

    /// Insert or replace an entry.
    ///
    /// A stage-0 entry replaces every conflict stage of its path, and a
    /// conflict entry replaces the stage-0 entry. Entries whose paths would
    /// collide as file and directory with the new path are removed.
    pub fn add_entry(&mut self, entry: IndexEntry) -> Result<(), IndexError> {
        path::validate_path(entry.path.as_bstr())?;
        if entry.stage == Stage::Normal {
            self.remove_stages(entry.path.as_bstr(), |s| s.is_conflict());
        } else {
            self.remove_stages(entry.path.as_bstr(), |s| s == Stage::Normal);
        }
        self.remove_file_dir_collisions(entry.path.as_bstr());

        match self.position(entry.path.as_bstr(), entry.stage) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
        Ok(())
    }

    /// Stage `data` at `path`: write it as a blob and record a stage-0
    /// entry, resolving any conflict on that path.
    pub fn add_blob(
        &mut self,
        odb: &ObjectDatabase,
        path: &BStr,
        data: &[u8],
        mode: FileMode,
    ) -> Result<ObjectId, IndexError> {
        path::validate_path(path)?;
        let id = odb.write_blob(data)?;
        let mut entry = IndexEntry::new(path, id, mode);
        entry.stat.size = entry::truncate_size(data.len() as u64);
        self.add_entry(entry)?;
        Ok(id)
    }

    /// Drop every stage of `path`.
    pub fn remove(&mut self, path: &BStr) -> Result<(), IndexError> {
        let range = self.path_range(path);
        if range.is_empty() {
            return Err(IndexError::NotFound(path.to_owned()));
        }
        self.entries.drain(range);
        Ok(())
    }

    /// Replace `path` by conflict entries for the given sides.
    pub fn add_conflict(
        &mut self,
        path: &BStr,
        base: Option<ConflictSide>,
        ours: Option<ConflictSide>,
        theirs: Option<ConflictSide>,
    ) -> Result<(), IndexError> {
        if base.is_none() && ours.is_none() && theirs.is_none() {
            return Err(IndexError::EmptyConflict(path.to_owned()));
        }
        path::validate_path(path)?;
        self.remove_stages(path, |_| true);
        for (stage, side) in [(Stage::Base, base), (Stage::Ours, ours), (Stage::Theirs, theirs)] {
            if let Some(side) = side {
                let mut entry = IndexEntry::new(path, side.id, side.mode);
                entry.stage = stage;
                self.add_entry(entry)?;
            }
        }
        Ok(())
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(|e| e.stage.is_conflict())
    }

    /// Unmerged paths, in path order.
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut out: Vec<Conflict> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.stage.is_conflict()) {
            if out.last().map_or(true, |c| c.path != entry.path) {
                out.push(Conflict {
                    path: entry.path.clone(),
                    base: None,
                    ours: None,
                    theirs: None,
                });
            }
            let side = Some(ConflictSide {
                id: entry.id,
                mode: entry.mode,
            });
            if let Some(conflict) = out.last_mut() {
                match entry.stage {
                    Stage::Base => conflict.base = side,
                    Stage::Ours => conflict.ours = side,
                    Stage::Theirs => conflict.theirs = side,
                    Stage::Normal => {}
                }
            }
        }
        out
    }

    /// Record fresh stat data for the stage-0 entry at `path`.
    pub fn set_stat(&mut self, path: &BStr, stat: StatData) -> Result<(), IndexError> {
        match self.position(path, Stage::Normal) {
            Ok(i) => {
                self.entries[i].stat = stat;
                Ok(())
            }
            Err(_) => Err(IndexError::NotFound(path.to_owned())),
        }
    }

    /// Build tree objects for the stage-0 entries and return the root id.
    pub fn write_tree(&self, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
        tree::write_tree(self, odb)
    }

    /// Replace all entries with the flattened contents of `tree_id`.
    ///
    /// Stat data is carried over for paths whose id and mode are unchanged.
    pub fn read_tree(&mut self, odb: &ObjectDatabase, tree_id: &ObjectId) -> Result<(), IndexError> {
        tree::read_tree(self, odb, tree_id)
    }

    fn position(&self, path: &BStr, stage: Stage) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| cmp_key(e.path.as_bstr(), e.stage, path, stage))
    }

    fn path_range(&self, path: &BStr) -> std::ops::Range<usize> {
        let start = self
            .entries
            .partition_point(|e| e.path.as_slice() < path.as_bytes());
        let len = self.entries[start..]
            .iter()
            .take_while(|e| e.path.as_slice() == path.as_bytes())
            .count();
        start..start + len
    }

    fn remove_stages(&mut self, path: &BStr, which: impl Fn(Stage) -> bool) {
        let range = self.path_range(path);
        let mut i = range.end;
        while i > range.start {
            i -= 1;
            if which(self.entries[i].stage) {
                self.entries.remove(i);
            }
        }
    }

    /// Remove entries that are a parent file of `path` or live under `path/`.
    fn remove_file_dir_collisions(&mut self, path: &BStr) {
        let mut dir_prefix = path.to_owned();
        dir_prefix.push(b'/');
        self.entries.retain(|e| {
            let is_parent_file = path.len() > e.path.len()
                && path.starts_with(e.path.as_slice())
                && path[e.path.len()] == b'/';
            !is_parent_file && !e.path.starts_with(dir_prefix.as_slice())
        });
    }

    pub(crate) fn from_sorted(algo: HashAlgorithm, entries: Vec<IndexEntry>) -> Self {
        Self {
            algo,
            entries,
            path: None,
        }
    }

    pub(crate) fn replace_entries(&mut self, entries: Vec<IndexEntry>) {
        self.entries = entries;
    }
}

pub(crate) fn cmp_key(a_path: &BStr, a_stage: Stage, b_path: &BStr, b_stage: Stage) -> Ordering {
    a_path
        .as_bytes()
        .cmp(b_path.as_bytes())
        .then(a_stage.cmp(&b_stage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::Sha1([n; 20])
    }

    fn entry(path: &str, n: u8) -> IndexEntry {
        IndexEntry::new(path, id(n), FileMode::Regular)
    }

    fn paths(index: &Index) -> Vec<String> {
        index.iter().map(|e| format!("{}:{}", e.path, e.stage.as_u8())).collect()
    }

    #[test]
    fn entries_stay_sorted_and_unique() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        for p in ["b", "a/z", "a.txt", "a/b", "b"] {
            index.add_entry(entry(p, 1)).unwrap();
        }
        assert_eq!(paths(&index), ["a.txt:0", "a/b:0", "a/z:0", "b:0"]);
        assert!(index.get("a/b".into(), Stage::Normal).is_some());
        assert!(index.get("a".into(), Stage::Normal).is_none());
    }

    #[test]
    fn adding_stage_zero_resolves_conflict() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        let side = |n| Some(ConflictSide { id: id(n), mode: FileMode::Regular });
        index.add_conflict("f".into(), side(1), side(2), side(3)).unwrap();
        assert!(index.has_conflicts());
        assert_eq!(paths(&index), ["f:1", "f:2", "f:3"]);
        assert_eq!(index.conflicts()[0].theirs.unwrap().id, id(3));

        index.add_entry(entry("f", 4)).unwrap();
        assert!(!index.has_conflicts());
        assert_eq!(paths(&index), ["f:0"]);
    }

    #[test]
    fn conflict_replaces_stage_zero() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add_entry(entry("f", 1)).unwrap();
        let side = Some(ConflictSide { id: id(2), mode: FileMode::Regular });
        index.add_conflict("f".into(), None, side, None).unwrap();
        assert_eq!(paths(&index), ["f:2"]);
        assert!(index.add_conflict("g".into(), None, None, None).is_err());
    }

    #[test]
    fn file_and_directory_replace_each_other() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add_entry(entry("a", 1)).unwrap();
        index.add_entry(entry("a/b", 2)).unwrap();
        assert_eq!(paths(&index), ["a/b:0"]);
        index.add_entry(entry("a/c/d", 2)).unwrap();
        index.add_entry(entry("a", 3)).unwrap();
        assert_eq!(paths(&index), ["a:0"]);
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add_entry(entry("x", 1)).unwrap();
        let err = index.remove("y".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        index.remove("x".into()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn invalid_paths_rejected() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        for bad in ["", "/abs", "a//b", "a/../b", ".git/config", "trailing/"] {
            let err = index.add_entry(entry(bad, 1)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidSpec, "{bad}");
        }
    }
}
