use std::path::PathBuf;

use vcs_hash::{HashError, ObjectId};
use vcs_utils::{ErrorKind, LockError, UtilError};

#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid reference name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("reference not found: {0}")]
    NotFound(String),

    #[error("reference '{0}' points to a branch with no commits yet")]
    Unborn(String),

    #[error("symbolic reference chain from '{0}' is cyclic or too deep")]
    SymrefLoop(String),

    #[error("reference already exists: {0}")]
    AlreadyExists(String),

    #[error("cannot create '{name}': '{conflict}' is in the way")]
    DirectoryConflict { name: String, conflict: String },

    #[error(
        "reference '{name}' was modified: expected {}, found {}",
        describe(.expected),
        describe(.actual)
    )]
    CasFailed {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("cannot delete '{0}': HEAD points to it")]
    CheckedOut(String),

    #[error("reference is locked: {}", .0.display())]
    Locked(PathBuf),

    #[error("malformed reference data: {0}")]
    Parse(String),

    #[error(transparent)]
    Util(UtilError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("{}: {source}", .path.display())]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe(id: &Option<ObjectId>) -> String {
    match id {
        Some(id) => id.to_hex(),
        None => "no value".to_string(),
    }
}

impl RefError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RefError::InvalidName { .. } | RefError::SymrefLoop(_) => ErrorKind::InvalidSpec,
            RefError::NotFound(_) => ErrorKind::NotFound,
            RefError::Unborn(_) => ErrorKind::UnbornBranch,
            RefError::AlreadyExists(_) | RefError::DirectoryConflict { .. } => {
                ErrorKind::AlreadyExists
            }
            RefError::CasFailed { .. } => ErrorKind::Modified,
            RefError::CheckedOut(_) => ErrorKind::Conflict,
            RefError::Locked(_) => ErrorKind::Locked,
            RefError::Parse(_) => ErrorKind::CorruptObject,
            RefError::Util(e) => e.kind(),
            RefError::Hash(_) => ErrorKind::CorruptObject,
            RefError::IoPath { .. } | RefError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<UtilError> for RefError {
    fn from(e: UtilError) -> Self {
        match e {
            UtilError::Lock(LockError::AlreadyLocked { path }) => RefError::Locked(path),
            other => RefError::Util(other),
        }
    }
}
