//! Loose object storage.
//!
//! Each object lives in its own file at `objects/<2 hex>/<rest hex>`,
//! holding the zlib-compressed `"<type> <size>\0<content>"` bytes. Files
//! are written to a temporary name and renamed into place, so readers
//! never observe a partial object.

mod enumerate;
mod read;
mod write;

pub use enumerate::LooseObjectIter;

use std::path::{Path, PathBuf};

use vcs_hash::{HashAlgorithm, HashError, ObjectId};
use vcs_object::ObjectError;
use vcs_utils::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("failed to inflate loose object {oid}")]
    Inflate {
        oid: ObjectId,
        #[source]
        source: std::io::Error,
    },

    #[error("loose object {expected} hashes to {actual}")]
    DigestMismatch {
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("object id {oid} does not use {expected}")]
    WrongAlgorithm {
        oid: ObjectId,
        expected: HashAlgorithm,
    },

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LooseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt { .. }
            | Self::Inflate { .. }
            | Self::DigestMismatch { .. }
            | Self::Object(_) => ErrorKind::CorruptObject,
            Self::WrongAlgorithm { .. } => ErrorKind::InvalidSpec,
            Self::Hash(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// A directory of loose objects for one hash algorithm.
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    objects_dir: PathBuf,
    algo: HashAlgorithm,
    compression: flate2::Compression,
}

impl LooseObjectStore {
    /// The directory does not have to exist until the first write.
    pub fn open(objects_dir: impl AsRef<Path>, algo: HashAlgorithm) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            algo,
            compression: flate2::Compression::default(),
        }
    }

    /// zlib level 0-9; values above 9 are clamped.
    pub fn set_compression_level(&mut self, level: u32) {
        self.compression = flate2::Compression::new(level.min(9));
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }

    fn check_algorithm(&self, oid: &ObjectId) -> Result<(), LooseError> {
        if oid.algorithm() != self.algo {
            return Err(LooseError::WrongAlgorithm {
                oid: *oid,
                expected: self.algo,
            });
        }
        Ok(())
    }
}
