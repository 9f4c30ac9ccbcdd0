//! Storage backends behind [`ObjectDatabase`](crate::ObjectDatabase).

use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_loose::LooseObjectStore;
use vcs_object::ObjectType;

use crate::OdbError;

/// A content-addressed object store.
///
/// `read_raw` must verify that the stored bytes hash to `oid` and report a
/// mismatch as an error of kind `CorruptObject`. `write_raw` must be
/// idempotent and safe to call concurrently for the same content.
pub trait OdbBackend: Send + Sync {
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Type and content of `oid`, or `None` if absent.
    fn read_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError>;

    fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, OdbError>;

    fn contains(&self, oid: &ObjectId) -> bool;

    fn write_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError>;

    /// All stored ids, ascending.
    fn ids(&self) -> Result<Vec<ObjectId>, OdbError>;

    /// Stored ids whose hex form starts with the lowercase `prefix`, ascending.
    fn lookup_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, OdbError> {
        Ok(self
            .ids()?
            .into_iter()
            .filter(|id| id.starts_with_hex(prefix))
            .collect())
    }
}

impl OdbBackend for LooseObjectStore {
    fn hash_algorithm(&self) -> HashAlgorithm {
        LooseObjectStore::hash_algorithm(self)
    }

    fn read_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError> {
        Ok(LooseObjectStore::read_raw(self, oid)?)
    }

    fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, OdbError> {
        Ok(LooseObjectStore::read_header(self, oid)?)
    }

    fn contains(&self, oid: &ObjectId) -> bool {
        LooseObjectStore::contains(self, oid)
    }

    fn write_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(LooseObjectStore::write_raw(self, object_type, content)?)
    }

    fn ids(&self) -> Result<Vec<ObjectId>, OdbError> {
        Ok(self.iter()?.collect::<Result<Vec<_>, _>>()?)
    }

    fn lookup_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, OdbError> {
        Ok(LooseObjectStore::lookup_prefix(self, prefix)?)
    }
}
