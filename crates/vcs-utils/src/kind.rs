//! Error classification shared by every crate in the workspace.
//!
//! Each crate keeps its own error enum; `ErrorKind` is the coarse class a
//! caller matches on. The numeric codes are the stable values exposed to
//! binding layers.

use std::fmt;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Ambiguous,
    BareRepo,
    UnbornBranch,
    Unmerged,
    NonFastForward,
    InvalidSpec,
    Conflict,
    Locked,
    Modified,
    Auth,
    Uncommitted,
    NotARepository,
    CorruptObject,
    ChecksumMismatch,
    Config,
    Io,
    Generic,
}

impl ErrorKind {
    /// Numeric code for this kind. Kinds without a dedicated code map to -1.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::NotFound => -3,
            ErrorKind::AlreadyExists => -4,
            ErrorKind::Ambiguous => -5,
            ErrorKind::BareRepo => -8,
            ErrorKind::UnbornBranch => -9,
            ErrorKind::Unmerged => -10,
            ErrorKind::NonFastForward => -11,
            ErrorKind::InvalidSpec => -12,
            ErrorKind::Conflict => -13,
            ErrorKind::Locked => -14,
            ErrorKind::Modified => -15,
            ErrorKind::Auth => -16,
            ErrorKind::Uncommitted => -22,
            ErrorKind::ChecksumMismatch => -33,
            ErrorKind::NotARepository => -40,
            ErrorKind::CorruptObject
            | ErrorKind::Config
            | ErrorKind::Io
            | ErrorKind::Generic => -1,
        }
    }

    /// Inverse of [`ErrorKind::code`] for codes that have a dedicated kind.
    pub fn from_code(code: i32) -> Option<Self> {
        let kind = match code {
            -1 => ErrorKind::Generic,
            -3 => ErrorKind::NotFound,
            -4 => ErrorKind::AlreadyExists,
            -5 => ErrorKind::Ambiguous,
            -8 => ErrorKind::BareRepo,
            -9 => ErrorKind::UnbornBranch,
            -10 => ErrorKind::Unmerged,
            -11 => ErrorKind::NonFastForward,
            -12 => ErrorKind::InvalidSpec,
            -13 => ErrorKind::Conflict,
            -14 => ErrorKind::Locked,
            -15 => ErrorKind::Modified,
            -16 => ErrorKind::Auth,
            -22 => ErrorKind::Uncommitted,
            -33 => ErrorKind::ChecksumMismatch,
            -40 => ErrorKind::NotARepository,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Object not found",
            ErrorKind::AlreadyExists => "Object already exists",
            ErrorKind::Ambiguous => "More than one object matches",
            ErrorKind::BareRepo => "Operation not allowed on bare repository",
            ErrorKind::UnbornBranch => "HEAD refers to branch with no commits",
            ErrorKind::Unmerged => "Unmerged entries exist",
            ErrorKind::NonFastForward => "Reference was not fast-forwardable",
            ErrorKind::InvalidSpec => "Invalid specification",
            ErrorKind::Conflict => "Conflict exists",
            ErrorKind::Locked => "Resource is locked",
            ErrorKind::Modified => "Reference was modified concurrently",
            ErrorKind::Auth => "Authentication error",
            ErrorKind::Uncommitted => "Uncommitted changes exist",
            ErrorKind::NotARepository => "Not a Git repository",
            ErrorKind::CorruptObject => "Object is corrupt",
            ErrorKind::ChecksumMismatch => "Checksum mismatch",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Io => "I/O error",
            ErrorKind::Generic => "Generic error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorKind; 19] = [
        ErrorKind::NotFound,
        ErrorKind::AlreadyExists,
        ErrorKind::Ambiguous,
        ErrorKind::BareRepo,
        ErrorKind::UnbornBranch,
        ErrorKind::Unmerged,
        ErrorKind::NonFastForward,
        ErrorKind::InvalidSpec,
        ErrorKind::Conflict,
        ErrorKind::Locked,
        ErrorKind::Modified,
        ErrorKind::Auth,
        ErrorKind::Uncommitted,
        ErrorKind::NotARepository,
        ErrorKind::CorruptObject,
        ErrorKind::ChecksumMismatch,
        ErrorKind::Config,
        ErrorKind::Io,
        ErrorKind::Generic,
    ];

    #[test]
    fn dedicated_codes_round_trip() {
        for kind in ALL {
            let code = kind.code();
            if code != -1 {
                assert_eq!(ErrorKind::from_code(code), Some(kind));
            }
        }
    }

    #[test]
    fn known_codes() {
        assert_eq!(ErrorKind::NotFound.code(), -3);
        assert_eq!(ErrorKind::Locked.code(), -14);
        assert_eq!(ErrorKind::NotARepository.code(), -40);
        assert_eq!(ErrorKind::from_code(-2), None);
        assert_eq!(ErrorKind::from_code(-1), Some(ErrorKind::Generic));
    }

    #[test]
    fn messages() {
        assert_eq!(
            ErrorKind::UnbornBranch.to_string(),
            "HEAD refers to branch with no commits"
        );
        assert_eq!(ErrorKind::ChecksumMismatch.message(), "Checksum mismatch");
    }
}
