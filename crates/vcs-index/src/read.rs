//! Index file parsing (versions 2 and 3).

use std::fs::File;

use bstr::{BString, ByteSlice};
use vcs_hash::{HashAlgorithm, Hasher, ObjectId};
use vcs_object::FileMode;

use crate::entry::{IndexEntry, StatData};
use crate::write::{entry_size, SIGNATURE, STAT_LEN};
use crate::{cmp_key, Index, IndexError, Stage};

const HEADER_LEN: usize = 12;

pub(crate) fn read_file(file: &File, algo: HashAlgorithm) -> Result<Index, IndexError> {
    if file.metadata()?.len() == 0 {
        return Err(IndexError::InvalidHeader("empty index file".into()));
    }
    // SAFETY: the index is replaced by rename, never modified in place, so
    // the mapped file does not change while it is being parsed.
    let map = unsafe { memmap2::Mmap::map(file)? };
    parse(&map, algo)
}

pub(crate) fn parse(data: &[u8], algo: HashAlgorithm) -> Result<Index, IndexError> {
    let id_len = algo.digest_len();
    if data.len() < HEADER_LEN + id_len {
        return Err(IndexError::InvalidHeader("index file too short".into()));
    }
    let (body, trailer) = data.split_at(data.len() - id_len);
    if Hasher::digest(algo, body)?.as_bytes() != trailer {
        return Err(IndexError::ChecksumMismatch);
    }

    if &body[..4] != SIGNATURE {
        return Err(IndexError::InvalidHeader("missing DIRC signature".into()));
    }
    let version = be32(&body[4..]);
    if !(2..=3).contains(&version) {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let count = be32(&body[8..]) as usize;

    let mut entries: Vec<IndexEntry> = Vec::with_capacity(count.min(body.len() / 62));
    let mut pos = HEADER_LEN;
    for _ in 0..count {
        let (entry, next) = parse_entry(body, pos, version, algo)?;
        if let Some(prev) = entries.last() {
            if cmp_key(prev.path.as_bstr(), prev.stage, entry.path.as_bstr(), entry.stage).is_ge() {
                return Err(IndexError::InvalidEntry {
                    offset: pos,
                    reason: "entries out of order".into(),
                });
            }
        }
        entries.push(entry);
        pos = next;
    }

    skip_extensions(body, pos)?;
    Ok(Index::from_sorted(algo, entries))
}

fn parse_entry(
    data: &[u8],
    start: usize,
    version: u32,
    algo: HashAlgorithm,
) -> Result<(IndexEntry, usize), IndexError> {
    let bad = |reason: &str| IndexError::InvalidEntry {
        offset: start,
        reason: reason.to_string(),
    };
    let id_len = algo.digest_len();
    let fixed = STAT_LEN + id_len + 2;
    if start + fixed > data.len() {
        return Err(bad("truncated entry"));
    }

    let field = |i: usize| be32(&data[start + i * 4..]);
    let stat = StatData {
        ctime_secs: field(0),
        ctime_nsecs: field(1),
        mtime_secs: field(2),
        mtime_nsecs: field(3),
        dev: field(4),
        ino: field(5),
        uid: field(7),
        gid: field(8),
        size: field(9),
    };
    let mode = FileMode::from_raw(field(6))
        .filter(|m| !m.is_tree())
        .ok_or_else(|| bad("invalid mode"))?;

    let mut pos = start + STAT_LEN;
    let id = ObjectId::from_bytes(&data[pos..pos + id_len], algo)?;
    pos += id_len;
    let flags = u16::from_be_bytes([data[pos], data[pos + 1]]);
    pos += 2;

    let extended = flags & 0x4000 != 0;
    if extended {
        if version < 3 {
            return Err(bad("extended flags in a version 2 index"));
        }
        if pos + 2 > data.len() {
            return Err(bad("truncated extended flags"));
        }
        pos += 2;
    }
    let stage = Stage::from_u8(((flags >> 12) & 0x3) as u8).ok_or_else(|| bad("invalid stage"))?;

    let name_len = data[pos..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| bad("unterminated path"))?;
    let path = BString::from(&data[pos..pos + name_len]);
    let stored_len = (flags & 0x0fff) as usize;
    if stored_len != name_len.min(0x0fff) {
        return Err(bad("path length does not match flags"));
    }

    let next = start + entry_size(id_len, name_len, extended);
    if next > data.len() {
        return Err(bad("entry padding runs past end of file"));
    }

    let entry = IndexEntry {
        path,
        id,
        mode,
        stage,
        stat,
        assume_valid: flags & 0x8000 != 0,
    };
    Ok((entry, next))
}

/// Extensions are skipped; an unknown one whose signature starts with a
/// lowercase letter is required to understand the index and is refused.
fn skip_extensions(body: &[u8], mut pos: usize) -> Result<(), IndexError> {
    while pos < body.len() {
        if pos + 8 > body.len() {
            return Err(IndexError::InvalidHeader("truncated extension header".into()));
        }
        let sig = &body[pos..pos + 4];
        let len = be32(&body[pos + 4..]) as usize;
        if sig[0].is_ascii_lowercase() {
            return Err(IndexError::RequiredExtension(
                String::from_utf8_lossy(sig).into_owned(),
            ));
        }
        pos += 8;
        if pos + len > body.len() {
            return Err(IndexError::InvalidHeader("extension runs past end of file".into()));
        }
        pos += len;
    }
    Ok(())
}

fn be32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
