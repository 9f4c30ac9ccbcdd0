use bstr::BString;
use vcs_hash::ObjectId;
use vcs_object::FileMode;

use crate::Stage;

/// A staged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Repository-relative, `/`-separated.
    pub path: BString,
    pub id: ObjectId,
    pub mode: FileMode,
    pub stage: Stage,
    pub stat: StatData,
    /// The "assume unchanged" bit.
    pub assume_valid: bool,
}

impl IndexEntry {
    /// A stage-0 entry with empty stat data.
    pub fn new(path: impl Into<BString>, id: ObjectId, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            id,
            mode,
            stage: Stage::Normal,
            stat: StatData::default(),
            assume_valid: false,
        }
    }
}

/// File system metadata recorded when an entry was last synced with the
/// working tree. Only a hint: equal stat data means the file is very likely
/// unchanged, unequal stat data means its content has to be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    /// Low 32 bits of the file size.
    pub size: u32,
}

/// The on-disk size field keeps only the low 32 bits. Stat hints compare
/// truncated values on both sides, and content hashing settles the rest.
pub(crate) fn truncate_size(len: u64) -> u32 {
    (len & u64::from(u32::MAX)) as u32
}

impl StatData {
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: truncate_size(meta.len()),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            size: truncate_size(meta.len()),
            ..Self::default()
        }
    }

    /// Whether `meta` still looks like the file this data was taken from.
    ///
    /// Size and mtime must match exactly; ctime, inode and device are
    /// compared only when both sides recorded them.
    pub fn matches(&self, meta: &std::fs::Metadata) -> bool {
        let now = Self::from_metadata(meta);
        let loose_eq = |a: u32, b: u32| a == 0 || b == 0 || a == b;
        self.size == now.size
            && self.mtime_secs == now.mtime_secs
            && self.mtime_nsecs == now.mtime_nsecs
            && loose_eq(self.ctime_secs, now.ctime_secs)
            && loose_eq(self.ino, now.ino)
            && loose_eq(self.dev, now.dev)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_keep_their_low_bits() {
        assert_eq!(truncate_size(5), 5);
        assert_eq!(truncate_size((1 << 32) + 5), 5);
        assert_eq!(truncate_size(u64::MAX), u32::MAX);
    }

    #[test]
    fn stat_matches_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"abc").unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        let stat = StatData::from_metadata(&meta);
        assert_eq!(stat.size, 3);
        assert!(stat.matches(&meta));
        assert!(!StatData::default().matches(&meta));
    }

    #[test]
    fn new_entry_is_stage_zero() {
        let entry = IndexEntry::new("a", ObjectId::Sha1([0; 20]), FileMode::Regular);
        assert_eq!(entry.stage, Stage::Normal);
        assert!(entry.stat.is_empty());
    }
}
