use crate::{ObjectError, ObjectType};

/// Split `"<type> <size>\0"` off the front of a raw object.
///
/// Returns the type, the declared content size and the header length
/// including the NUL.
pub fn parse_header(data: &[u8]) -> Result<(ObjectType, usize, usize), ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::InvalidHeader("missing NUL terminator".into()))?;
    let header = &data[..nul];
    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::InvalidHeader("missing space".into()))?;

    let object_type = ObjectType::from_bytes(&header[..space])?;
    let size = &header[space + 1..];
    // Leading zeros would give one object two spellings.
    if size.is_empty() || (size.len() > 1 && size[0] == b'0') || !size.iter().all(u8::is_ascii_digit) {
        return Err(ObjectError::InvalidHeader(format!(
            "invalid size '{}'",
            String::from_utf8_lossy(size)
        )));
    }
    let size = std::str::from_utf8(size)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| ObjectError::InvalidHeader("size out of range".into()))?;

    Ok((object_type, size, nul + 1))
}

/// Encode `"<type> <size>\0"`.
pub fn write_header(object_type: ObjectType, size: usize) -> Vec<u8> {
    format!("{} {}\0", object_type, size).into_bytes()
}
