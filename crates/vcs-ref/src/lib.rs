//! Named pointers into the object store.
//!
//! A reference is either direct (name to object id) or symbolic (name to
//! another reference name). `FilesRefStore` keeps loose references as one
//! file each under the repository directory, reads `packed-refs`, and
//! serializes every mutation of a name through that name's lock file.

mod error;
pub mod files;
mod name;
pub mod reflog;

use vcs_hash::ObjectId;

pub use error::RefError;
pub use files::packed::{PackedRef, PackedRefs};
pub use files::{FilesRefStore, RefUpdate, DEFAULT_LOCK_TIMEOUT, MAX_SYMREF_DEPTH};
pub use name::{RefName, BRANCH_PREFIX, HEAD, TAG_PREFIX};
pub use reflog::ReflogEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct { name: RefName, target: ObjectId },
    Symbolic { name: RefName, target: RefName },
}

impl Reference {
    pub fn name(&self) -> &RefName {
        match self {
            Reference::Direct { name, .. } | Reference::Symbolic { name, .. } => name,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Reference::Symbolic { .. })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Reference::Direct { .. })
    }

    pub fn target_id(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { target, .. } => Some(*target),
            Reference::Symbolic { .. } => None,
        }
    }

    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }
}
