pub mod error;
pub mod fs;
pub mod kind;
pub mod lockfile;
pub mod signature;

// Re-export core types at crate root for convenience
pub use bstr::{BStr, BString, ByteSlice, ByteVec};
pub use error::{LockError, UtilError};
pub use kind::ErrorKind;
pub use signature::{Signature, Time};

pub type Result<T> = std::result::Result<T, UtilError>;
