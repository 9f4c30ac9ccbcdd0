use std::fs::File;
use std::io::{self, Read};

use flate2::read::ZlibDecoder;
use vcs_hash::{Hasher, ObjectId};
use vcs_object::{header, Object, ObjectType};

use crate::{LooseError, LooseObjectStore};

/// The longest header is `"commit <20 digits>\0"`.
const MAX_HEADER_LEN: usize = 32;

impl LooseObjectStore {
    pub fn contains(&self, oid: &ObjectId) -> bool {
        oid.algorithm() == self.algo && self.object_path(oid).is_file()
    }

    /// Read and verify a loose object, returning its type and content.
    ///
    /// `Ok(None)` when no file exists for `oid`. The digest of the inflated
    /// bytes is checked on every read; a file whose bytes hash to some other
    /// id is reported as corrupt.
    pub fn read_raw(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, LooseError> {
        self.check_algorithm(oid)?;
        let Some(file) = self.open_object(oid)? else {
            return Ok(None);
        };

        let mut raw = Vec::new();
        ZlibDecoder::new(file)
            .read_to_end(&mut raw)
            .map_err(|source| LooseError::Inflate { oid: *oid, source })?;

        let actual = Hasher::digest(self.algo, &raw)?;
        if actual != *oid {
            tracing::warn!(expected = %oid, %actual, "loose object digest mismatch");
            return Err(LooseError::DigestMismatch {
                expected: *oid,
                actual,
            });
        }

        let (object_type, size, header_len) = header::parse_header(&raw)?;
        if raw.len() - header_len != size {
            return Err(LooseError::Corrupt {
                oid: *oid,
                reason: format!(
                    "header declares {} bytes, found {}",
                    size,
                    raw.len() - header_len
                ),
            });
        }
        raw.drain(..header_len);
        Ok(Some((object_type, raw)))
    }

    /// Read, verify and decode a loose object.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, LooseError> {
        match self.read_raw(oid)? {
            Some((object_type, content)) => {
                Ok(Some(Object::decode(object_type, &content, self.algo)?))
            }
            None => Ok(None),
        }
    }

    /// Type and size, inflating only as far as the header terminator.
    ///
    /// The content is not verified.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, LooseError> {
        self.check_algorithm(oid)?;
        let Some(file) = self.open_object(oid)? else {
            return Ok(None);
        };

        let mut decoder = ZlibDecoder::new(file);
        let mut buf = [0u8; MAX_HEADER_LEN];
        let mut filled = 0;
        while !buf[..filled].contains(&0) {
            if filled == buf.len() {
                return Err(LooseError::Corrupt {
                    oid: *oid,
                    reason: "header is not terminated".into(),
                });
            }
            let n = decoder
                .read(&mut buf[filled..])
                .map_err(|source| LooseError::Inflate { oid: *oid, source })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    oid: *oid,
                    reason: "end of data inside header".into(),
                });
            }
            filled += n;
        }

        let (object_type, size, _) = header::parse_header(&buf[..filled])?;
        Ok(Some((object_type, size)))
    }

    fn open_object(&self, oid: &ObjectId) -> Result<Option<File>, LooseError> {
        match File::open(self.object_path(oid)) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
