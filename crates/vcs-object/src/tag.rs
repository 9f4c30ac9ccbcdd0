use bstr::BString;
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::Signature;

use crate::{fields, ObjectError, ObjectType};

/// An annotated tag: a named, signed-off pointer to another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: ObjectId,
    pub target_type: ObjectType,
    pub name: BString,
    /// Absent only in some historic tags; always written by this crate's callers.
    pub tagger: Option<Signature>,
    pub extra_headers: Vec<(BString, BString)>,
    /// Message, including any trailing signature block.
    pub message: BString,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_type: ObjectType,
        name: impl Into<BString>,
        tagger: Signature,
        message: impl Into<BString>,
    ) -> Self {
        Self {
            target,
            target_type,
            name: name.into(),
            tagger: Some(tagger),
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Decode tag content: `object`, `type`, `tag`, optional `tagger`,
    /// then extra headers, a blank line and the message.
    pub fn decode(content: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        const KIND: ObjectType = ObjectType::Tag;
        let (headers, message) = fields::split(content, KIND)?;
        let mut headers = headers.into_iter().peekable();

        let mut required = |field: &'static str| match headers.next() {
            Some((key, value)) if key == field => Ok(value),
            _ => Err(ObjectError::MissingField {
                object_type: KIND,
                field,
            }),
        };
        let target = fields::parse_id(&required("object")?, algo, KIND, "object")?;
        let target_type = ObjectType::from_bytes(&required("type")?)?;
        let name = required("tag")?;
        if name.is_empty() {
            return Err(ObjectError::Malformed {
                object_type: KIND,
                reason: "empty tag name".into(),
            });
        }

        let tagger = match headers.next_if(|(key, _)| key == "tagger") {
            Some((_, value)) => Some(fields::parse_signature(&value)?),
            None => None,
        };

        Ok(Self {
            target,
            target_type,
            name,
            tagger,
            extra_headers: headers.collect(),
            message: BString::from(message),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.message.len());
        fields::write(&mut out, b"object", self.target.to_hex().as_bytes());
        fields::write(&mut out, b"type", self.target_type.as_str().as_bytes());
        fields::write(&mut out, b"tag", &self.name);
        if let Some(tagger) = &self.tagger {
            fields::write(&mut out, b"tagger", &tagger.to_bytes());
        }
        for (key, value) in &self.extra_headers {
            fields::write(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}
