use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use vcs_hash::{HashAlgorithm, ObjectId};

use crate::{LooseError, LooseObjectStore};

/// Ids of all loose objects, in ascending hex order.
///
/// Names that are not a full-width lowercase hex id (temporary files,
/// stray files) are skipped.
pub struct LooseObjectIter {
    algo: HashAlgorithm,
    fanouts: std::vec::IntoIter<(String, PathBuf)>,
    pending: std::vec::IntoIter<String>,
    prefix: String,
}

impl LooseObjectIter {
    fn new(objects_dir: &Path, algo: HashAlgorithm) -> Result<Self, LooseError> {
        let mut fanouts = Vec::new();
        for entry in read_dir_if_present(objects_dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_lower_hex(&name) && name.len() == 2 && entry.file_type()?.is_dir() {
                fanouts.push((name, entry.path()));
            }
        }
        fanouts.sort();

        Ok(Self {
            algo,
            fanouts: fanouts.into_iter(),
            pending: Vec::new().into_iter(),
            prefix: String::new(),
        })
    }

    fn load_next_fanout(&mut self) -> Result<bool, LooseError> {
        let rest_len = self.algo.hex_len() - 2;
        for (prefix, dir) in self.fanouts.by_ref() {
            let mut names = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if let Ok(name) = entry.file_name().into_string() {
                    if name.len() == rest_len && is_lower_hex(&name) {
                        names.push(name);
                    }
                }
            }
            if !names.is_empty() {
                names.sort();
                self.prefix = prefix;
                self.pending = names.into_iter();
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for LooseObjectIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rest) = self.pending.next() {
                let hex = format!("{}{}", self.prefix, rest);
                return Some(ObjectId::from_hex_with(&hex, self.algo).map_err(LooseError::from));
            }
            match self.load_next_fanout() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn read_dir_if_present(dir: &Path) -> Result<Vec<io::Result<fs::DirEntry>>, LooseError> {
    match fs::read_dir(dir) {
        Ok(rd) => Ok(rd.collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl LooseObjectStore {
    pub fn iter(&self) -> Result<LooseObjectIter, LooseError> {
        LooseObjectIter::new(&self.objects_dir, self.algo)
    }

    /// Ids starting with the lowercase hex `prefix`, sorted.
    ///
    /// With two or more digits only the matching fan-out directory is read.
    pub fn lookup_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, LooseError> {
        if prefix.len() < 2 {
            return self
                .iter()?
                .filter(|r| r.as_ref().map_or(true, |id| id.starts_with_hex(prefix)))
                .collect();
        }

        let (fanout, rest) = prefix.split_at(2);
        let mut found = Vec::new();
        for entry in read_dir_if_present(&self.objects_dir.join(fanout))? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.len() == self.algo.hex_len() - 2 && is_lower_hex(&name) && name.starts_with(rest) {
                found.push(ObjectId::from_hex_with(&format!("{fanout}{name}"), self.algo)?);
            }
        }
        found.sort();
        Ok(found)
    }
}
