use std::path::PathBuf;

use bstr::{BString, ByteSlice};
use vcs_utils::ErrorKind;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository (or any of the parent directories): {}", .0.display())]
    NotARepository(PathBuf),

    #[error("invalid git directory {}: {reason}", .path.display())]
    InvalidGitDir { path: PathBuf, reason: String },

    #[error("repository already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("cannot {0} in a bare repository")]
    BareRepo(&'static str),

    #[error("unsupported repository format: {0}")]
    UnsupportedFormat(String),

    #[error("{0} is not configured")]
    MissingIdentity(&'static str),

    #[error("invalid revision '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("revision '{0}' not found")]
    RevisionNotFound(String),

    #[error("cannot update '{name}': {reason}")]
    NonFastForward { name: String, reason: String },

    #[error("'{}' is outside the working tree", .0.display())]
    OutsideWorkTree(PathBuf),

    #[error("'{}' is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("'{}' does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error(
        "checkout would overwrite local changes in: {}",
        .0.iter().map(|p| p.to_str_lossy()).collect::<Vec<_>>().join(", ")
    )]
    CheckoutConflict(Vec<BString>),

    #[error(transparent)]
    Config(#[from] vcs_config::ConfigError),

    #[error(transparent)]
    Odb(#[from] vcs_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] vcs_ref::RefError),

    #[error(transparent)]
    Index(#[from] vcs_index::IndexError),

    #[error(transparent)]
    Object(#[from] vcs_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] vcs_hash::HashError),

    #[error(transparent)]
    Util(#[from] vcs_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotARepository(_) | Self::InvalidGitDir { .. } => ErrorKind::NotARepository,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::BareRepo(_) => ErrorKind::BareRepo,
            Self::UnsupportedFormat(_) | Self::MissingIdentity(_) => ErrorKind::Config,
            Self::InvalidSpec { .. } | Self::OutsideWorkTree(_) | Self::NotAFile(_) => {
                ErrorKind::InvalidSpec
            }
            Self::RevisionNotFound(_) | Self::PathNotFound(_) => ErrorKind::NotFound,
            Self::NonFastForward { .. } => ErrorKind::NonFastForward,
            Self::CheckoutConflict(_) => ErrorKind::Conflict,
            Self::Config(e) => e.kind(),
            Self::Odb(e) => e.kind(),
            Self::Ref(e) => e.kind(),
            Self::Index(e) => e.kind(),
            Self::Object(e) => e.kind(),
            Self::Hash(e) => e.kind(),
            Self::Util(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Stable numeric code of [`kind`](Self::kind).
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}
