use bstr::{BStr, BString, ByteSlice};
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_utils::Signature;

use crate::{fields, ObjectError, ObjectType};

/// A snapshot of a tree with its ancestry and authorship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    /// In order; the first parent is the primary line of history.
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Headers after `committer` (`encoding`, `gpgsig`, `mergetag`, ...),
    /// kept in their original order.
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

const CORE_HEADERS: [&[u8]; 4] = [b"tree", b"parent", b"author", b"committer"];

impl Commit {
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: impl Into<BString>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            message: message.into(),
        }
    }

    /// Decode commit content. Headers must appear as `tree`, `parent`*,
    /// `author`, `committer`, then any extra headers.
    pub fn decode(content: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        const KIND: ObjectType = ObjectType::Commit;
        let (headers, message) = fields::split(content, KIND)?;
        let mut headers = headers.into_iter().peekable();

        let tree = fields::parse_id(&next_field(&mut headers, "tree")?, algo, KIND, "tree")?;
        let mut parents = Vec::new();
        while let Some((_, value)) = headers.next_if(|(key, _)| key == "parent") {
            parents.push(fields::parse_id(&value, algo, KIND, "parent")?);
        }
        let author = fields::parse_signature(&next_field(&mut headers, "author")?)?;
        let committer = fields::parse_signature(&next_field(&mut headers, "committer")?)?;

        let extra_headers: Vec<_> = headers.collect();
        if let Some((key, _)) = extra_headers
            .iter()
            .find(|(key, _)| CORE_HEADERS.iter().any(|core| *core == key.as_slice()))
        {
            return Err(ObjectError::Malformed {
                object_type: KIND,
                reason: format!("misplaced '{}' header", key),
            });
        }

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            extra_headers,
            message: BString::from(message),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.message.len());
        fields::write(&mut out, b"tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            fields::write(&mut out, b"parent", parent.to_hex().as_bytes());
        }
        fields::write(&mut out, b"author", &self.author.to_bytes());
        fields::write(&mut out, b"committer", &self.committer.to_bytes());
        for (key, value) in &self.extra_headers {
            fields::write(&mut out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// Value of the first extra header named `key`.
    pub fn extra_header(&self, key: &str) -> Option<&BStr> {
        self.extra_headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_bstr())
    }

    pub fn encoding(&self) -> Option<&BStr> {
        self.extra_header("encoding")
    }

    /// First line of the message.
    pub fn summary(&self) -> &BStr {
        let msg = self.message.trim_start();
        let end = msg.find_byte(b'\n').unwrap_or(msg.len());
        msg[..end].trim_end().as_bstr()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

fn next_field<I>(headers: &mut I, field: &'static str) -> Result<BString, ObjectError>
where
    I: Iterator<Item = (BString, BString)>,
{
    match headers.next() {
        Some((key, value)) if key == field => Ok(value),
        _ => Err(ObjectError::MissingField {
            object_type: ObjectType::Commit,
            field,
        }),
    }
}
