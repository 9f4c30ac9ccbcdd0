use std::path::PathBuf;

use crate::ErrorKind;

/// Base error type for vcs-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("lock file error: {0}")]
    Lock(#[from] LockError),

    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("invalid time: {0}")]
    Time(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UtilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UtilError::Lock(e) => e.kind(),
            UtilError::Signature(_) | UtilError::Time(_) => ErrorKind::InvalidSpec,
            UtilError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Lock file specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("unable to create lock file '{path}': already locked")]
    AlreadyLocked { path: PathBuf },

    #[error("unable to create lock file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to commit lock file '{path}': {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LockError::AlreadyLocked { .. } => ErrorKind::Locked,
            LockError::Create { .. } | LockError::Commit { .. } => ErrorKind::Io,
        }
    }
}
