//! A backend that keeps objects in a map; used by tests and scratch work.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use vcs_hash::{HashAlgorithm, Hasher, ObjectId};
use vcs_object::ObjectType;

use crate::backend::OdbBackend;
use crate::OdbError;

#[derive(Debug)]
pub struct MemoryBackend {
    algo: HashAlgorithm,
    objects: RwLock<BTreeMap<ObjectId, (ObjectType, Vec<u8>)>>,
}

impl MemoryBackend {
    pub fn new(algo: HashAlgorithm) -> Self {
        Self {
            algo,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Store bytes under an arbitrary id without hashing them.
    ///
    /// Reads of such an entry fail digest verification unless the id is
    /// correct; this exists to exercise that path.
    pub fn insert_unchecked(&self, oid: ObjectId, object_type: ObjectType, content: Vec<u8>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(oid, (object_type, content));
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OdbBackend for MemoryBackend {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    fn read_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let Some((object_type, content)) = objects.get(oid) else {
            return Ok(None);
        };
        let actual = Hasher::hash_object(self.algo, object_type.as_str(), content)?;
        if actual != *oid {
            return Err(OdbError::Corrupt {
                oid: *oid,
                reason: format!("content hashes to {}", actual),
            });
        }
        Ok(Some((*object_type, content.clone())))
    }

    fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, OdbError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.get(oid).map(|(ty, content)| (*ty, content.len())))
    }

    fn contains(&self, oid: &ObjectId) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(oid)
    }

    fn write_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        let oid = Hasher::hash_object(self.algo, object_type.as_str(), content)?;
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(oid)
            .or_insert_with(|| (object_type, content.to_vec()));
        Ok(oid)
    }

    fn ids(&self) -> Result<Vec<ObjectId>, OdbError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.keys().copied().collect())
    }
}
