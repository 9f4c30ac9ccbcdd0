use std::fmt;
use std::str::FromStr;

use crate::{hex, HashAlgorithm, HashError};

/// Identifier of a stored object: the digest of its canonical encoding.
///
/// Equality is byte equality and ordering is byte-lexicographic. Ids of
/// different widths never compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    /// Build an id from a raw digest of the algorithm's width.
    pub fn from_bytes(bytes: &[u8], algo: HashAlgorithm) -> Result<Self, HashError> {
        let wrong_len = || HashError::InvalidDigestLength {
            expected: algo.digest_len(),
            actual: bytes.len(),
        };
        Ok(match algo {
            HashAlgorithm::Sha1 => Self::Sha1(bytes.try_into().map_err(|_| wrong_len())?),
            HashAlgorithm::Sha256 => Self::Sha256(bytes.try_into().map_err(|_| wrong_len())?),
        })
    }

    /// Parse a full-length hex id. The width picks the algorithm.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        match HashAlgorithm::from_hex_len(s.len()) {
            Some(HashAlgorithm::Sha1) => {
                let mut raw = [0u8; 20];
                hex::decode_into(s, &mut raw)?;
                Ok(Self::Sha1(raw))
            }
            Some(HashAlgorithm::Sha256) => {
                let mut raw = [0u8; 32];
                hex::decode_into(s, &mut raw)?;
                Ok(Self::Sha256(raw))
            }
            None => Err(HashError::InvalidHexLength {
                expected: HashAlgorithm::Sha1.hex_len(),
                actual: s.len(),
            }),
        }
    }

    /// Parse a full-length hex id, requiring a specific algorithm.
    pub fn from_hex_with(s: &str, algo: HashAlgorithm) -> Result<Self, HashError> {
        if s.len() != algo.hex_len() {
            return Err(HashError::InvalidHexLength {
                expected: algo.hex_len(),
                actual: s.len(),
            });
        }
        Self::from_hex(s)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(b) => b,
            Self::Sha256(b) => b,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// The first `len` hex digits.
    pub fn to_short_hex(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len);
        hex
    }

    /// Whether the hex form starts with `prefix` (case-insensitive).
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Relative path of the loose file: fan-out directory, then the rest.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_short_hex(8))
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hex_width_selects_algorithm() {
        assert_eq!(ObjectId::from_hex(EMPTY_SHA1).unwrap().algorithm(), HashAlgorithm::Sha1);
        assert_eq!(
            ObjectId::from_hex(EMPTY_SHA256).unwrap().algorithm(),
            HashAlgorithm::Sha256
        );
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn display_parse_round_trip() {
        for hex in [EMPTY_SHA1, EMPTY_SHA256] {
            let id: ObjectId = hex.parse().unwrap();
            assert_eq!(id.to_string(), hex);
        }
    }

    #[test]
    fn uppercase_accepted() {
        let upper = EMPTY_SHA1.to_ascii_uppercase();
        assert_eq!(ObjectId::from_hex(&upper).unwrap(), ObjectId::from_hex(EMPTY_SHA1).unwrap());
    }

    #[test]
    fn required_algorithm() {
        assert!(ObjectId::from_hex_with(EMPTY_SHA1, HashAlgorithm::Sha256).is_err());
        assert!(ObjectId::from_hex_with(EMPTY_SHA256, HashAlgorithm::Sha256).is_ok());
    }

    #[test]
    fn byte_ordering() {
        let a = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        let b = ObjectId::from_hex("0000000000000000000000000000000000000100").unwrap();
        assert!(a < b);
    }

    #[test]
    fn from_bytes_checks_width() {
        let id = ObjectId::from_hex(EMPTY_SHA1).unwrap();
        assert_eq!(ObjectId::from_bytes(id.as_bytes(), HashAlgorithm::Sha1).unwrap(), id);
        assert!(matches!(
            ObjectId::from_bytes(&[0; 10], HashAlgorithm::Sha1),
            Err(HashError::InvalidDigestLength { expected: 20, actual: 10 })
        ));
    }

    #[test]
    fn short_forms() {
        let id = ObjectId::from_hex(EMPTY_SHA1).unwrap();
        assert_eq!(format!("{:?}", id), "ObjectId(da39a3ee)");
        assert_eq!(id.to_short_hex(7), "da39a3e");
        assert!(id.starts_with_hex("DA39"));
        assert!(!id.starts_with_hex("da38"));
        assert_eq!(id.loose_path(), format!("da/{}", &EMPTY_SHA1[2..]));
    }
}
