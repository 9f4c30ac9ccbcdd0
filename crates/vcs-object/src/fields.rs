//! Header blocks shared by commits and tags.
//!
//! A block is a run of `key SP value LF` lines ended by an empty line.
//! A line starting with a space continues the previous value; the joined
//! value carries an LF in place of each continuation break.

use bstr::BString;
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::Signature;

use crate::{ObjectError, ObjectType};

/// Split content into its header fields and the message after the blank line.
pub(crate) fn split(
    data: &[u8],
    object_type: ObjectType,
) -> Result<(Vec<(BString, BString)>, &[u8]), ObjectError> {
    let malformed = |reason: &str| ObjectError::Malformed {
        object_type,
        reason: reason.to_string(),
    };

    let mut fields: Vec<(BString, BString)> = Vec::new();
    let mut pos = 0;
    loop {
        if pos >= data.len() {
            return Err(malformed("header block is not terminated by a blank line"));
        }
        let end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| p + pos)
            .ok_or_else(|| malformed("header line without newline"))?;
        let line = &data[pos..end];
        pos = end + 1;

        if line.is_empty() {
            return Ok((fields, &data[pos..]));
        }
        if line[0] == b' ' {
            let (_, value) = fields
                .last_mut()
                .ok_or_else(|| malformed("continuation line before any header"))?;
            value.push(b'\n');
            value.extend_from_slice(&line[1..]);
            continue;
        }
        let space = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| malformed("header line without a value"))?;
        if space == 0 {
            return Err(malformed("empty header key"));
        }
        fields.push((BString::from(&line[..space]), BString::from(&line[space + 1..])));
    }
}

/// Append one header, folding embedded newlines into continuation lines.
pub(crate) fn write(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

pub(crate) fn parse_id(
    value: &[u8],
    algo: HashAlgorithm,
    object_type: ObjectType,
    field: &str,
) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value).map_err(|_| ObjectError::Malformed {
        object_type,
        reason: format!("non-ASCII id in '{}'", field),
    })?;
    // Only lowercase hex is canonical.
    if hex.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(ObjectError::Malformed {
            object_type,
            reason: format!("uppercase id in '{}'", field),
        });
    }
    Ok(ObjectId::from_hex_with(hex, algo)?)
}

pub(crate) fn parse_signature(value: &[u8]) -> Result<Signature, ObjectError> {
    let sig = Signature::parse(value.into())
        .map_err(|e| ObjectError::InvalidSignature(e.to_string()))?;
    // Anything the encoder would not reproduce byte-for-byte is rejected.
    if sig.to_bytes() != value {
        return Err(ObjectError::InvalidSignature(format!(
            "non-canonical signature '{}'",
            String::from_utf8_lossy(value)
        )));
    }
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_with_continuation() {
        let data = b"a 1\nb first\n second\n\nmessage";
        let (fields, msg) = split(data, ObjectType::Commit).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].0, "b");
        assert_eq!(fields[1].1, "first\nsecond");
        assert_eq!(msg, b"message");
    }

    #[test]
    fn write_folds_newlines() {
        let mut out = Vec::new();
        write(&mut out, b"gpgsig", b"line1\nline2");
        assert_eq!(out, b"gpgsig line1\n line2\n");
    }

    #[test]
    fn split_requires_blank_line() {
        assert!(split(b"a 1\nb 2\n", ObjectType::Tag).is_err());
        assert!(split(b" lead\n\n", ObjectType::Tag).is_err());
        assert!(split(b"novalue\n\n", ObjectType::Tag).is_err());
    }

    #[test]
    fn signature_must_be_canonical() {
        assert!(parse_signature(b"A <a@b> 0 +0000").is_ok());
        assert!(parse_signature(b"A  <a@b> 0 +0000").is_err());
    }
}
