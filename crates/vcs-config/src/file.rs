//! One config file, edited in place.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use tracing::debug;
use vcs_utils::lockfile::LockFile;

use crate::error::ConfigError;
use crate::parse::{self, Line};
use crate::{ConfigEntry, ConfigKey, ConfigScope};

/// A parsed config file. Lines that are not touched by [`set`](Self::set)
/// or [`unset`](Self::unset) are written back exactly as they were read.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    scope: ConfigScope,
    lines: Vec<Line>,
}

impl ConfigFile {
    pub fn new(scope: ConfigScope) -> Self {
        ConfigFile {
            path: None,
            scope,
            lines: Vec::new(),
        }
    }

    pub fn parse(content: &[u8], path: Option<&Path>, scope: ConfigScope) -> Result<Self, ConfigError> {
        let name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        Ok(ConfigFile {
            path: path.map(Path::to_path_buf),
            scope,
            lines: parse::parse(content, &name)?,
        })
    }

    /// Load `path`. A missing file parses as empty but remembers its path,
    /// so a later [`save`](Self::save) creates it.
    pub fn load(path: &Path, scope: ConfigScope) -> Result<Self, ConfigError> {
        match std::fs::read(path) {
            Ok(content) => Self::parse(&content, Some(path), scope),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ConfigFile {
                path: Some(path.to_path_buf()),
                ..ConfigFile::new(scope)
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    pub fn is_empty(&self) -> bool {
        !self.lines.iter().any(|l| matches!(l, Line::Entry { .. }))
    }

    /// All entries in file order.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        self.located()
            .into_iter()
            .map(|(_, key, value)| ConfigEntry {
                key,
                value: value.cloned(),
                scope: self.scope,
            })
            .collect()
    }

    /// The last value for `key`. The outer `None` means the key is absent;
    /// `Some(None)` is a bare key.
    pub fn get(&self, key: &ConfigKey) -> Option<Option<&BStr>> {
        self.get_all(key).pop()
    }

    pub fn get_all(&self, key: &ConfigKey) -> Vec<Option<&BStr>> {
        self.located()
            .into_iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, value)| value.map(|v| v.as_bstr()))
            .collect()
    }

    /// Replace the last occurrence of `key`, or add it to the last matching
    /// section, or append a new section.
    pub fn set(&mut self, key: &ConfigKey, value: &BStr) {
        let entry = Line::Entry {
            raw: format_entry(&key.name, value),
            name: key.name.clone(),
            value: Some(value.to_owned()),
            line: 0,
        };

        let existing = self
            .located()
            .into_iter()
            .rev()
            .find(|(_, k, _)| k == key)
            .map(|(i, _, _)| i);
        if let Some(index) = existing {
            self.lines[index] = entry;
            return;
        }

        let mut insert_at = None;
        let mut inside = false;
        for (i, line) in self.lines.iter().enumerate() {
            match line {
                Line::Section { section, subsection, .. } => {
                    inside = key.same_section(section, subsection.as_ref());
                    if inside {
                        insert_at = Some(i + 1);
                    }
                }
                Line::Entry { .. } if inside => insert_at = Some(i + 1),
                _ => {}
            }
        }

        match insert_at {
            Some(i) => self.lines.insert(i, entry),
            None => {
                self.lines.push(Line::Section {
                    raw: format_header(&key.section, key.subsection.as_ref()),
                    section: key.section.clone(),
                    subsection: key.subsection.clone(),
                });
                self.lines.push(entry);
            }
        }
    }

    /// Remove every occurrence of `key`. Returns whether anything was removed.
    pub fn unset(&mut self, key: &ConfigKey) -> bool {
        let doomed: Vec<usize> = self
            .located()
            .into_iter()
            .filter(|(_, k, _)| k == key)
            .map(|(i, _, _)| i)
            .collect();
        for &i in doomed.iter().rev() {
            self.lines.remove(i);
        }
        !doomed.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            out.extend_from_slice(line.raw());
            if i + 1 < self.lines.len() && !line.raw().ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        out
    }

    /// Write the file through `<path>.lock`.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut lock = LockFile::acquire(path)?;
        lock.write_all(&self.to_bytes())?;
        lock.commit()?;
        debug!(path = %path.display(), "wrote config");
        Ok(())
    }

    /// Write back to the path this file was loaded from.
    pub fn save(&self) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => self.write_to(path),
            None => Err(ConfigError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "config file has no path",
            ))),
        }
    }

    /// Index, key and value of every entry.
    fn located(&self) -> Vec<(usize, ConfigKey, Option<&BString>)> {
        let mut current: Option<(&BString, Option<&BString>)> = None;
        let mut out = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            match line {
                Line::Section { section, subsection, .. } => {
                    current = Some((section, subsection.as_ref()));
                }
                Line::Entry { name, value, .. } => {
                    // Entries before any header belong to no section and
                    // cannot be addressed by a key.
                    if let Some((section, subsection)) = current {
                        out.push((i, ConfigKey::from_parts(section, subsection, name), value.as_ref()));
                    }
                }
                Line::Other(_) => {}
            }
        }
        out
    }
}

fn format_header(section: &BString, subsection: Option<&BString>) -> BString {
    let mut out = BString::from("[");
    out.extend_from_slice(section);
    if let Some(sub) = subsection {
        out.extend_from_slice(b" \"");
        for &b in sub.iter() {
            if b == b'"' || b == b'\\' {
                out.push(b'\\');
            }
            out.push(b);
        }
        out.push(b'"');
    }
    out.extend_from_slice(b"]\n");
    out
}

fn format_entry(name: &BString, value: &BStr) -> BString {
    let needs_quotes = value.first().is_some_and(|b| b.is_ascii_whitespace())
        || value.last().is_some_and(|b| b.is_ascii_whitespace())
        || value.iter().any(|&b| b == b'#' || b == b';');

    let mut out = BString::from("\t");
    out.extend_from_slice(name);
    out.extend_from_slice(b" = ");
    if needs_quotes {
        out.push(b'"');
    }
    for &b in value.iter() {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            b'"' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            _ => out.push(b),
        }
    }
    if needs_quotes {
        out.push(b'"');
    }
    out.push(b'\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ConfigKey {
        ConfigKey::parse(s).unwrap()
    }

    fn file(text: &str) -> ConfigFile {
        ConfigFile::parse(text.as_bytes(), None, ConfigScope::Local).unwrap()
    }

    #[test]
    fn last_value_wins() {
        let f = file("[core]\n\tbare = false\n[core]\n\tbare = true\n\tflag\n");
        assert_eq!(f.get(&key("core.bare")), Some(Some(b"true".as_bstr())));
        assert_eq!(f.get_all(&key("core.bare")).len(), 2);
        assert_eq!(f.get(&key("core.flag")), Some(None));
        assert_eq!(f.get(&key("core.missing")), None);
        assert_eq!(f.entries().len(), 3);
    }

    #[test]
    fn set_preserves_untouched_lines() {
        let mut f = file("# keep me\n[user]\n    name = Old ; note\n[core]\n\tbare = false\n");
        f.set(&key("user.name"), b"New".as_bstr());
        f.set(&key("user.email"), b"n@example.com".as_bstr());
        f.set(&key("remote.origin.url"), b"/tmp/x".as_bstr());
        assert_eq!(
            f.to_bytes().as_bstr(),
            "# keep me\n[user]\n\tname = New\n\temail = n@example.com\n[core]\n\tbare = false\n[remote \"origin\"]\n\turl = /tmp/x\n"
        );
    }

    #[test]
    fn set_quotes_and_escapes() {
        let mut f = ConfigFile::new(ConfigScope::Local);
        let value = " a \"b\" #c\\\n";
        f.set(&key("s.k"), value.as_bytes().as_bstr());
        let reparsed = ConfigFile::parse(&f.to_bytes(), None, ConfigScope::Local).unwrap();
        assert_eq!(reparsed.get(&key("s.k")), Some(Some(value.as_bytes().as_bstr())));
    }

    #[test]
    fn set_after_unterminated_last_line() {
        let mut f = file("[core]\n\tbare = false");
        f.set(&key("user.name"), b"x".as_bstr());
        let text = f.to_bytes();
        assert_eq!(text.as_bstr(), "[core]\n\tbare = false\n[user]\n\tname = x\n");
    }

    #[test]
    fn unset_removes_all_occurrences() {
        let mut f = file("[a]\n\tx = 1\n\ty = 2\n\tx = 3\n");
        assert!(f.unset(&key("a.x")));
        assert!(!f.unset(&key("a.x")));
        assert_eq!(f.to_bytes().as_bstr(), "[a]\n\ty = 2\n");
    }

    #[test]
    fn write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/config");
        let mut f = ConfigFile::load(&path, ConfigScope::Local).unwrap();
        assert!(f.is_empty());
        f.set(&key("core.repositoryformatversion"), b"0".as_bstr());
        f.save().unwrap();
        assert!(!dir.path().join("sub/config.lock").exists());

        let reloaded = ConfigFile::load(&path, ConfigScope::Local).unwrap();
        assert_eq!(reloaded.to_bytes(), f.to_bytes());
    }

    #[test]
    fn held_lock_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let _held = LockFile::acquire(&path).unwrap();
        let err = ConfigFile::new(ConfigScope::Local).write_to(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Locked(_)));
        assert_eq!(err.kind(), vcs_utils::ErrorKind::Locked);
    }
}
