//! Object database.
//!
//! `ObjectDatabase` is the only way higher layers touch stored objects. It
//! fronts a single [`OdbBackend`] (on-disk loose storage or memory), checks
//! every stored object's digest when it is read, and keeps a bounded cache
//! of parsed objects for hot paths such as tree walks.

pub mod backend;
mod cache;
pub mod memory;
mod peel;
pub mod prefix;

use std::path::Path;
use std::sync::Mutex;

use vcs_hash::{HashAlgorithm, HashError, ObjectId};
use vcs_loose::{LooseError, LooseObjectStore};
use vcs_object::{Blob, Commit, Object, ObjectError, ObjectType, Tag, Tree};
use vcs_utils::ErrorKind;

pub use backend::OdbBackend;
pub use memory::MemoryBackend;

use cache::ObjectCache;

#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("no object matches prefix '{0}'")]
    PrefixNotFound(String),

    #[error("ambiguous object name: {prefix} matches {count} objects")]
    Ambiguous { prefix: String, count: usize },

    #[error("invalid object name '{0}'")]
    InvalidPrefix(String),

    #[error("object {oid} is a {actual}, expected {expected}")]
    WrongType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Loose(#[from] LooseError),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

impl OdbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::PrefixNotFound(_) => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::InvalidPrefix(_) | Self::WrongType { .. } => ErrorKind::InvalidSpec,
            Self::Corrupt { .. } | Self::Object(_) => ErrorKind::CorruptObject,
            Self::Loose(e) => e.kind(),
            Self::Hash(e) => e.kind(),
        }
    }
}

/// Type and size of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub object_type: ObjectType,
    pub size: usize,
}

const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub struct ObjectDatabase {
    backend: Box<dyn OdbBackend>,
    cache: Mutex<ObjectCache>,
    algo: HashAlgorithm,
}

impl ObjectDatabase {
    /// Loose object storage rooted at `objects_dir`.
    pub fn open(objects_dir: impl AsRef<Path>, algo: HashAlgorithm) -> Self {
        Self::with_backend(Box::new(LooseObjectStore::open(objects_dir, algo)))
    }

    /// A database that lives only as long as this value.
    pub fn in_memory(algo: HashAlgorithm) -> Self {
        Self::with_backend(Box::new(MemoryBackend::new(algo)))
    }

    pub fn with_backend(backend: Box<dyn OdbBackend>) -> Self {
        let algo = backend.hash_algorithm();
        Self {
            backend,
            cache: Mutex::new(ObjectCache::new(DEFAULT_CACHE_CAPACITY)),
            algo,
        }
    }

    pub fn set_cache_capacity(&self, capacity: usize) {
        self.cache().resize(capacity);
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// Read and decode an object, verifying its digest in storage.
    pub fn read(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.try_read(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    pub fn try_read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        match self.backend.read_raw(oid)? {
            Some((object_type, content)) => {
                Ok(Some(Object::decode(object_type, &content, self.algo)?))
            }
            None => Ok(None),
        }
    }

    /// Like [`read`](Self::read), but serves repeated reads from the cache.
    /// Cached objects were verified when first loaded.
    pub fn read_cached(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        if let Some(obj) = self.cache().get(oid) {
            return Ok(obj);
        }
        let obj = self.read(oid)?;
        self.cache().insert(*oid, obj.clone());
        Ok(obj)
    }

    pub fn read_header(&self, oid: &ObjectId) -> Result<ObjectInfo, OdbError> {
        match self.backend.read_header(oid)? {
            Some((object_type, size)) => Ok(ObjectInfo { object_type, size }),
            None => Err(OdbError::NotFound(*oid)),
        }
    }

    pub fn exists(&self, oid: &ObjectId) -> bool {
        self.backend.contains(oid)
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.exists(oid)
    }

    pub fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        self.write_raw(obj.object_type(), &obj.encode())
    }

    pub fn write_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        self.backend.write_raw(object_type, content)
    }

    pub fn write_blob(&self, data: &[u8]) -> Result<ObjectId, OdbError> {
        self.write_raw(ObjectType::Blob, data)
    }

    /// Every stored id, ascending.
    pub fn iter(&self) -> Result<std::vec::IntoIter<ObjectId>, OdbError> {
        Ok(self.backend.ids()?.into_iter())
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId, OdbError> {
        prefix::resolve_prefix(self, prefix)
    }

    pub fn find_blob(&self, oid: &ObjectId) -> Result<Blob, OdbError> {
        match self.read_cached(oid)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(wrong_type(oid, ObjectType::Blob, &other)),
        }
    }

    pub fn find_tree(&self, oid: &ObjectId) -> Result<Tree, OdbError> {
        match self.read_cached(oid)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(wrong_type(oid, ObjectType::Tree, &other)),
        }
    }

    pub fn find_commit(&self, oid: &ObjectId) -> Result<Commit, OdbError> {
        match self.read_cached(oid)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(wrong_type(oid, ObjectType::Commit, &other)),
        }
    }

    pub fn find_tag(&self, oid: &ObjectId) -> Result<Tag, OdbError> {
        match self.read_cached(oid)? {
            Object::Tag(tag) => Ok(tag),
            other => Err(wrong_type(oid, ObjectType::Tag, &other)),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ObjectCache> {
        // The cache holds no invariant a panicking holder could break.
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ObjectDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatabase")
            .field("algo", &self.algo)
            .finish_non_exhaustive()
    }
}

pub(crate) fn wrong_type(oid: &ObjectId, expected: ObjectType, actual: &Object) -> OdbError {
    OdbError::WrongType {
        oid: *oid,
        expected,
        actual: actual.object_type(),
    }
}
