//! Abbreviated id resolution.

use vcs_hash::{hex, ObjectId};

use crate::{ObjectDatabase, OdbError};

/// Shortest prefix accepted.
pub const MIN_PREFIX_LEN: usize = 4;

/// Resolve `prefix` (at least [`MIN_PREFIX_LEN`] hex digits, any case) to
/// the one stored id it abbreviates.
pub fn resolve_prefix(odb: &ObjectDatabase, prefix: &str) -> Result<ObjectId, OdbError> {
    let algo = odb.hash_algorithm();
    if !hex::is_hex_prefix(prefix, algo.hex_len()) {
        return Err(OdbError::InvalidPrefix(prefix.to_string()));
    }
    let prefix = prefix.to_ascii_lowercase();

    if prefix.len() == algo.hex_len() {
        let oid = ObjectId::from_hex_with(&prefix, algo)?;
        return if odb.exists(&oid) {
            Ok(oid)
        } else {
            Err(OdbError::NotFound(oid))
        };
    }

    let matches = odb.backend.lookup_prefix(&prefix)?;
    match matches.as_slice() {
        [] => Err(OdbError::PrefixNotFound(prefix)),
        [only] => Ok(*only),
        _ => {
            tracing::debug!(%prefix, count = matches.len(), "ambiguous abbreviated id");
            Err(OdbError::Ambiguous {
                prefix,
                count: matches.len(),
            })
        }
    }
}
