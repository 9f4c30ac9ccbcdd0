//! Git-format configuration files.
//!
//! [`ConfigFile`] edits one file while preserving its comments and layout.
//! [`ConfigSet`] layers the global file, the repository file and in-memory
//! overrides, with later layers winning.

mod error;
mod file;
mod parse;
mod set;
mod types;

pub use error::ConfigError;
pub use file::ConfigFile;
pub use set::{global_config_path, ConfigSet};
pub use types::{parse_bool, parse_int};

use std::fmt;
use std::str::FromStr;

use bstr::{BString, ByteSlice};

/// Where a value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigScope {
    /// `$GIT_CONFIG_GLOBAL` or `~/.gitconfig`.
    Global,
    /// `<git-dir>/config`.
    Local,
    /// Values set in memory for the lifetime of a [`ConfigSet`].
    Override,
}

/// A normalized `section[.subsection].name` key.
///
/// Section and name compare case-insensitively (they are stored lowercased);
/// the subsection is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub section: BString,
    pub subsection: Option<BString>,
    pub name: BString,
}

impl ConfigKey {
    /// Parse `section.name` or `section.sub.section.name`. The subsection is
    /// everything between the first and the last dot.
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        let invalid = |why: &str| ConfigError::InvalidKey(format!("{key}: {why}"));

        let (section, rest) = key.split_once('.').ok_or_else(|| invalid("missing section"))?;
        let (subsection, name) = match rest.rsplit_once('.') {
            Some((sub, name)) => (Some(sub), name),
            None => (None, rest),
        };

        if section.is_empty()
            || !section.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid("invalid section name"));
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic())
            || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(invalid("invalid variable name"));
        }
        if subsection.is_some_and(|s| s.contains('\n')) {
            return Err(invalid("newline in subsection"));
        }

        Ok(ConfigKey {
            section: section.to_ascii_lowercase().into(),
            subsection: subsection.map(BString::from),
            name: name.to_ascii_lowercase().into(),
        })
    }

    pub(crate) fn from_parts(section: &BString, subsection: Option<&BString>, name: &BString) -> Self {
        ConfigKey {
            section: section.clone(),
            subsection: subsection.cloned(),
            name: name.clone(),
        }
    }

    pub(crate) fn same_section(&self, section: &BString, subsection: Option<&BString>) -> bool {
        self.section == *section && self.subsection.as_ref() == subsection
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.", self.section.as_bstr())?;
        if let Some(sub) = &self.subsection {
            write!(f, "{}.", sub.as_bstr())?;
        }
        write!(f, "{}", self.name.as_bstr())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: ConfigKey,
    /// `None` for a bare key written without `=`.
    pub value: Option<BString>,
    pub scope: ConfigScope,
}
