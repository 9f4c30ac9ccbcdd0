//! Object model and canonical codec.
//!
//! Four object kinds share one content-addressed namespace. Encoding is
//! deterministic, and decoding accepts only the canonical encoding, so an
//! object has exactly one byte representation and therefore one id.

mod blob;
mod commit;
mod fields;
pub mod header;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use tag::Tag;
pub use tree::{FileMode, Tree, TreeEntry};

use bstr::BString;
use vcs_hash::{HashAlgorithm, HashError, Hasher, ObjectId};
use vcs_utils::ErrorKind;

/// Errors produced while decoding objects.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: String },

    #[error("tree entries out of order at offset {offset}")]
    UnsortedTree { offset: usize },

    #[error("invalid {object_type}: missing '{field}' header")]
    MissingField {
        object_type: ObjectType,
        field: &'static str,
    },

    #[error("invalid {object_type}: {reason}")]
    Malformed {
        object_type: ObjectType,
        reason: String,
    },

    #[error("invalid file mode: {0}")]
    InvalidFileMode(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ObjectError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CorruptObject
    }
}

/// The four object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode a raw object (header followed by content).
    pub fn parse(raw: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        let (object_type, size, header_len) = header::parse_header(raw)?;
        let content = &raw[header_len..];
        if content.len() != size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: content.len(),
            });
        }
        Self::decode(object_type, content, algo)
    }

    /// Decode content of a known type. Ids inside trees, commits and tags
    /// must have the width of `algo`.
    pub fn decode(
        object_type: ObjectType,
        content: &[u8],
        algo: HashAlgorithm,
    ) -> Result<Self, ObjectError> {
        Ok(match object_type {
            ObjectType::Blob => Self::Blob(Blob::new(content)),
            ObjectType::Tree => Self::Tree(Tree::decode(content, algo)?),
            ObjectType::Commit => Self::Commit(Commit::decode(content, algo)?),
            ObjectType::Tag => Self::Tag(Tag::decode(content, algo)?),
        })
    }

    /// Canonical content encoding (no header).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.data.clone(),
            Self::Tree(t) => t.encode(),
            Self::Commit(c) => c.encode(),
            Self::Tag(t) => t.encode(),
        }
    }

    /// Canonical encoding with the `"<type> <size>\0"` header.
    pub fn encode_with_header(&self) -> Vec<u8> {
        let content = self.encode();
        let mut out = header::write_header(self.object_type(), content.len());
        out.extend_from_slice(&content);
        out
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Blob(_) => ObjectType::Blob,
            Self::Tree(_) => ObjectType::Tree,
            Self::Commit(_) => ObjectType::Commit,
            Self::Tag(_) => ObjectType::Tag,
        }
    }

    /// The id this object is stored under.
    pub fn compute_id(&self, algo: HashAlgorithm) -> Result<ObjectId, HashError> {
        Hasher::hash_object(algo, self.object_type().as_str(), &self.encode())
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Self::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Self::Tag(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Blob> for Object {
    fn from(b: Blob) -> Self {
        Self::Blob(b)
    }
}

impl From<Tree> for Object {
    fn from(t: Tree) -> Self {
        Self::Tree(t)
    }
}

impl From<Commit> for Object {
    fn from(c: Commit) -> Self {
        Self::Commit(c)
    }
}

impl From<Tag> for Object {
    fn from(t: Tag) -> Self {
        Self::Tag(t)
    }
}
