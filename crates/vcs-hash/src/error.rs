use vcs_utils::ErrorKind;

/// Errors produced by digest and id operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("SHA-1 collision attack detected")]
    Collision,
}

impl HashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HashError::Collision => ErrorKind::CorruptObject,
            _ => ErrorKind::InvalidSpec,
        }
    }
}
