use std::fmt;

use crate::error::RefError;

pub const HEAD: &str = "HEAD";
pub const BRANCH_PREFIX: &str = "refs/heads/";
pub const TAG_PREFIX: &str = "refs/tags/";

/// Bytes that may not appear anywhere in a reference name.
const FORBIDDEN: &[u8] = b" ~^:?*[\\";

/// A validated reference name such as `refs/heads/main` or `HEAD`.
///
/// Names are either under `refs/` or a one-level pseudo-ref made of
/// uppercase letters and underscores (`HEAD`, `ORIG_HEAD`). Every name
/// maps directly onto a relative file path inside the repository
/// directory, so the rules below also keep that path well formed:
///
/// - no `..`, `@{`, control bytes, or any of `` ~^:?*[\`` and space
/// - no empty component, and no component starting with `.` or ending in `.lock`
/// - no trailing `/` or `.`, and not the single name `@`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

impl RefName {
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn head() -> Self {
        Self(HEAD.to_string())
    }

    /// `refs/heads/<short>`.
    pub fn branch(short: &str) -> Result<Self, RefError> {
        Self::new(format!("{BRANCH_PREFIX}{short}"))
    }

    /// `refs/tags/<short>`.
    pub fn tag(short: &str) -> Result<Self, RefError> {
        Self::new(format!("{TAG_PREFIX}{short}"))
    }

    /// Name with its `refs/heads/` or `refs/tags/` namespace removed.
    pub fn short(&self) -> &str {
        self.0
            .strip_prefix(BRANCH_PREFIX)
            .or_else(|| self.0.strip_prefix(TAG_PREFIX))
            .unwrap_or(&self.0)
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(BRANCH_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAG_PREFIX)
    }

    pub fn is_head(&self) -> bool {
        self.0 == HEAD
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RefName {
    type Err = RefError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn validate(name: &str) -> Result<(), RefError> {
    let invalid = |reason: &'static str| RefError::InvalidName {
        name: name.to_string(),
        reason,
    };
    let bytes = name.as_bytes();

    if bytes.is_empty() {
        return Err(invalid("empty name"));
    }
    if name == "@" {
        return Err(invalid("'@' alone is reserved"));
    }
    if bytes.iter().any(|&b| b < 0x20 || b == 0x7f) {
        return Err(invalid("contains a control character"));
    }
    if bytes.iter().any(|b| FORBIDDEN.contains(b)) {
        return Err(invalid("contains a forbidden character"));
    }
    if name.contains("..") {
        return Err(invalid("contains '..'"));
    }
    if name.contains("@{") {
        return Err(invalid("contains '@{'"));
    }
    if name.ends_with('/') || name.ends_with('.') {
        return Err(invalid("ends with '/' or '.'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid("empty path component"));
        }
        if component.starts_with('.') {
            return Err(invalid("component starts with '.'"));
        }
        if component.ends_with(".lock") {
            return Err(invalid("component ends with '.lock'"));
        }
    }

    if !name.starts_with("refs/") && !is_pseudo_ref(bytes) {
        return Err(invalid("must start with 'refs/' or be an all-caps pseudo-ref"));
    }
    Ok(())
}

fn is_pseudo_ref(name: &[u8]) -> bool {
    name.iter().all(|&b| b.is_ascii_uppercase() || b == b'_')
}
