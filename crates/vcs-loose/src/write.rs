use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use vcs_hash::{Hasher, ObjectId};
use vcs_object::{header, Object, ObjectType};

use crate::{LooseError, LooseObjectStore};

impl LooseObjectStore {
    pub fn write(&self, obj: &Object) -> Result<ObjectId, LooseError> {
        self.write_raw(obj.object_type(), &obj.encode())
    }

    /// Store `content` under its id and return the id.
    ///
    /// Writing an object that is already present does nothing. Concurrent
    /// writers of the same object all succeed and leave one intact file.
    pub fn write_raw(&self, object_type: ObjectType, content: &[u8]) -> Result<ObjectId, LooseError> {
        let hdr = header::write_header(object_type, content.len());
        let mut hasher = Hasher::new(self.algo);
        hasher.update(&hdr);
        hasher.update(content);
        let oid = hasher.finalize()?;

        let final_path = self.object_path(&oid);
        if final_path.is_file() {
            return Ok(oid);
        }
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.deflate_to_temp(&hdr, content)?;
        finalize(tmp, &final_path)?;
        tracing::debug!(%oid, %object_type, size = content.len(), "wrote loose object");
        Ok(oid)
    }

    fn deflate_to_temp(&self, hdr: &[u8], content: &[u8]) -> Result<tempfile::NamedTempFile, LooseError> {
        let tmp = tempfile::Builder::new()
            .prefix("tmp_obj_")
            .tempfile_in(&self.objects_dir)?;
        let mut encoder = ZlibEncoder::new(tmp.as_file(), self.compression);
        encoder.write_all(hdr)?;
        encoder.write_all(content)?;
        encoder.finish()?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o444))?;
        }
        Ok(tmp)
    }
}

/// Rename into place. Losing a rename race to an identical object is success.
fn finalize(tmp: tempfile::NamedTempFile, final_path: &Path) -> Result<(), LooseError> {
    match tmp.persist(final_path) {
        Ok(_) => Ok(()),
        Err(_) if final_path.is_file() => Ok(()),
        Err(e) => Err(LooseError::Io(e.error)),
    }
}
