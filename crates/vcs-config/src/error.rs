use std::path::PathBuf;

use vcs_utils::{ErrorKind, LockError, UtilError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config key: {0}")]
    InvalidKey(String),

    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("invalid boolean value for '{key}': {value}")]
    InvalidBool { key: String, value: String },

    #[error("invalid integer value for '{key}': {value}")]
    InvalidInt { key: String, value: String },

    #[error("config file is locked: {}", .0.display())]
    Locked(PathBuf),

    #[error(transparent)]
    Util(UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::InvalidKey(_)
            | ConfigError::Parse { .. }
            | ConfigError::InvalidBool { .. }
            | ConfigError::InvalidInt { .. } => ErrorKind::Config,
            ConfigError::Locked(_) => ErrorKind::Locked,
            ConfigError::Util(e) => e.kind(),
            ConfigError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<UtilError> for ConfigError {
    fn from(e: UtilError) -> Self {
        match e {
            UtilError::Lock(LockError::AlreadyLocked { path }) => ConfigError::Locked(path),
            other => ConfigError::Util(other),
        }
    }
}
