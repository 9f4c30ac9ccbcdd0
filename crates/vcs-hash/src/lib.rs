//! Object identity for the vcs object store.
//!
//! `ObjectId` is a fixed-width digest; its width is chosen by the
//! `HashAlgorithm` a repository was created with. `Hasher` computes
//! ids incrementally.

mod algorithm;
mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
