//! Layered configuration lookup.

use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use tracing::trace;

use crate::error::ConfigError;
use crate::file::ConfigFile;
use crate::types::{parse_bool, parse_int};
use crate::{ConfigEntry, ConfigKey, ConfigScope};

/// Config files in precedence order plus in-memory overrides.
///
/// Lookups walk the layers from the highest precedence down and return the
/// first hit; within a file the last occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    files: Vec<ConfigFile>,
    overrides: Vec<ConfigEntry>,
}

/// The global config file: `$GIT_CONFIG_GLOBAL`, else `$HOME/.gitconfig`.
/// `None` when `GIT_CONFIG_NOGLOBAL` is set or no home is known.
pub fn global_config_path() -> Option<PathBuf> {
    if std::env::var_os("GIT_CONFIG_NOGLOBAL").is_some() {
        return None;
    }
    if let Some(path) = std::env::var_os("GIT_CONFIG_GLOBAL") {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".gitconfig"))
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the global file and, given a repository directory, its `config`.
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_global(git_dir, global_config_path().as_deref())
    }

    /// Like [`load`](Self::load) with an explicit global file.
    pub fn load_with_global(git_dir: Option<&Path>, global: Option<&Path>) -> Result<Self, ConfigError> {
        let mut set = ConfigSet::new();
        if let Some(path) = global {
            trace!(path = %path.display(), "loading global config");
            set.add_file(ConfigFile::load(path, ConfigScope::Global)?);
        }
        if let Some(git_dir) = git_dir {
            set.add_file(ConfigFile::load(&git_dir.join("config"), ConfigScope::Local)?);
        }
        Ok(set)
    }

    /// Add a file; files are kept ordered by scope, and a file added later
    /// wins over an earlier file of the same scope.
    pub fn add_file(&mut self, file: ConfigFile) {
        let at = self.files.partition_point(|f| f.scope() <= file.scope());
        self.files.insert(at, file);
    }

    pub fn files(&self) -> &[ConfigFile] {
        &self.files
    }

    pub fn file(&self, scope: ConfigScope) -> Option<&ConfigFile> {
        self.files.iter().rev().find(|f| f.scope() == scope)
    }

    pub fn file_mut(&mut self, scope: ConfigScope) -> Option<&mut ConfigFile> {
        self.files.iter_mut().rev().find(|f| f.scope() == scope)
    }

    /// Set a value for this set only. Overrides beat every file.
    pub fn set_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = ConfigKey::parse(key)?;
        self.overrides.retain(|e| e.key != key);
        self.overrides.push(ConfigEntry {
            key,
            value: Some(value.into()),
            scope: ConfigScope::Override,
        });
        Ok(())
    }

    /// The winning raw value. The outer `None` means unset; `Some(None)` is
    /// a bare key.
    pub fn get(&self, key: &str) -> Result<Option<Option<&BStr>>, ConfigError> {
        let key = ConfigKey::parse(key)?;
        Ok(self.lookup(&key))
    }

    /// Every value in precedence order, lowest first.
    pub fn get_all(&self, key: &str) -> Result<Vec<Option<BString>>, ConfigError> {
        let key = ConfigKey::parse(key)?;
        let mut values: Vec<Option<BString>> = self
            .files
            .iter()
            .flat_map(|f| f.get_all(&key))
            .map(|v| v.map(ToOwned::to_owned))
            .collect();
        values.extend(
            self.overrides
                .iter()
                .filter(|e| e.key == key)
                .map(|e| e.value.clone()),
        );
        Ok(values)
    }

    /// A bare key reads as the empty string.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self
            .get(key)?
            .map(|value| value.map(|v| v.to_str_lossy().into_owned()).unwrap_or_default()))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get(key)?.map(|value| parse_bool(key, value)).transpose()
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.get(key)?.map(|value| parse_int(key, value)).transpose()
    }

    /// Every entry across all layers, lowest precedence first.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut all: Vec<ConfigEntry> = self.files.iter().flat_map(ConfigFile::entries).collect();
        all.extend(self.overrides.iter().cloned());
        all
    }

    fn lookup(&self, key: &ConfigKey) -> Option<Option<&BStr>> {
        if let Some(entry) = self.overrides.iter().rev().find(|e| e.key == *key) {
            return Some(entry.value.as_ref().map(|v| v.as_bstr()));
        }
        self.files.iter().rev().find_map(|f| f.get(key))
    }
}
