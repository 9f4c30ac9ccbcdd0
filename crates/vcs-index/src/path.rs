use bstr::{BStr, ByteSlice};

use crate::IndexError;

/// Check that `path` can be staged: relative, `/`-separated, without empty,
/// `.`, `..` or `.git` components and without NUL bytes.
pub fn validate_path(path: &BStr) -> Result<(), IndexError> {
    let invalid = |reason| IndexError::InvalidPath {
        path: path.to_owned(),
        reason,
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains(&0) {
        return Err(invalid("contains NUL"));
    }
    for component in path.split_str("/") {
        match component {
            b"" => return Err(invalid("empty component")),
            b"." | b".." => return Err(invalid("relative component")),
            c if c.eq_ignore_ascii_case(b".git") => return Err(invalid("repository directory")),
            _ => {}
        }
    }
    Ok(())
}
