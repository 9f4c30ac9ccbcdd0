//! Revision expressions: `<base>` followed by `^`, `^N`, `~N`, `^{type}`
//! and `^{}` suffixes.
//!
//! The base is tried as a full hex id, then as a reference name (`HEAD`,
//! `refs/...`, then under `refs/`, `refs/tags/`, `refs/heads/` and
//! `refs/remotes/`), and finally as an abbreviated id.

use vcs_hash::ObjectId;
use vcs_object::{Object, ObjectType};
use vcs_odb::OdbError;
use vcs_ref::{RefError, RefName};

use crate::{RepoError, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    /// `^N`: the Nth parent; `^0` is the commit itself.
    Parent(usize),
    /// `~N`: N first-parent steps.
    Ancestor(usize),
    /// `^{type}`, or `^{}` to strip tags only.
    Peel(Option<ObjectType>),
}

impl Repository {
    /// Resolve a revision expression to an object id.
    pub fn revparse_single(&self, spec: &str) -> Result<ObjectId, RepoError> {
        let (base, suffixes) = parse(spec)?;
        let mut id = self.resolve_base(spec, base)?;
        for suffix in suffixes {
            id = self.apply(spec, id, suffix)?;
        }
        Ok(id)
    }

    fn resolve_base(&self, spec: &str, base: &str) -> Result<ObjectId, RepoError> {
        let algo = self.algo;
        let is_hex = base.bytes().all(|b| b.is_ascii_hexdigit());

        if is_hex && base.len() == algo.hex_len() {
            let id = ObjectId::from_hex_with(&base.to_ascii_lowercase(), algo)?;
            if self.odb.exists(&id) {
                return Ok(id);
            }
        }

        let candidates = [
            base.to_string(),
            format!("refs/{base}"),
            format!("refs/tags/{base}"),
            format!("refs/heads/{base}"),
            format!("refs/remotes/{base}"),
        ];
        let mut any_valid_name = false;
        for candidate in candidates {
            let Ok(name) = RefName::new(candidate) else {
                continue;
            };
            any_valid_name = true;
            match self.refs.resolve(&name) {
                Ok(id) => return Ok(id),
                Err(RefError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if is_hex && base.len() >= vcs_odb::prefix::MIN_PREFIX_LEN && base.len() <= algo.hex_len() {
            match self.odb.resolve_prefix(base) {
                Ok(id) => return Ok(id),
                Err(OdbError::PrefixNotFound(_) | OdbError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        } else if !any_valid_name {
            return Err(invalid(spec, "not a valid object name"));
        }
        Err(RepoError::RevisionNotFound(spec.to_string()))
    }

    fn apply(&self, spec: &str, id: ObjectId, suffix: Suffix) -> Result<ObjectId, RepoError> {
        match suffix {
            Suffix::Parent(0) => Ok(self.odb.peel_to_commit(&id)?.0),
            Suffix::Parent(n) => {
                let (_, commit) = self.odb.peel_to_commit(&id)?;
                commit
                    .parents
                    .get(n - 1)
                    .copied()
                    .ok_or_else(|| RepoError::RevisionNotFound(spec.to_string()))
            }
            Suffix::Ancestor(n) => {
                let mut current = self.odb.peel_to_commit(&id)?.0;
                for _ in 0..n {
                    let commit = self.odb.find_commit(&current)?;
                    current = *commit
                        .parents
                        .first()
                        .ok_or_else(|| RepoError::RevisionNotFound(spec.to_string()))?;
                }
                Ok(current)
            }
            Suffix::Peel(None) => Ok(self.odb.peel_tags(&id)?.0),
            Suffix::Peel(Some(ObjectType::Commit)) => Ok(self.odb.peel_to_commit(&id)?.0),
            Suffix::Peel(Some(ObjectType::Tree)) => Ok(self.odb.peel_to_tree(&id)?.0),
            Suffix::Peel(Some(ObjectType::Tag)) => {
                self.odb.find_tag(&id)?;
                Ok(id)
            }
            Suffix::Peel(Some(ObjectType::Blob)) => match self.odb.peel_tags(&id)? {
                (blob_id, Object::Blob(_)) => Ok(blob_id),
                (_, other) => Err(invalid(
                    spec,
                    &format!("{} cannot be peeled to a blob", other.object_type()),
                )),
            },
        }
    }
}

fn parse(spec: &str) -> Result<(&str, Vec<Suffix>), RepoError> {
    let bytes = spec.as_bytes();
    let base_end = bytes
        .iter()
        .position(|&b| b == b'^' || b == b'~')
        .unwrap_or(bytes.len());
    let base = &spec[..base_end];
    if base.is_empty() {
        return Err(invalid(spec, "empty revision"));
    }

    let mut suffixes = Vec::new();
    let mut pos = base_end;
    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;
        if op == b'^' && bytes.get(pos) == Some(&b'{') {
            let close = spec[pos..]
                .find('}')
                .map(|i| pos + i)
                .ok_or_else(|| invalid(spec, "unclosed '^{'"))?;
            let inner = &spec[pos + 1..close];
            let peel = if inner.is_empty() {
                None
            } else {
                Some(
                    inner
                        .parse::<ObjectType>()
                        .map_err(|_| invalid(spec, &format!("unknown object type '{inner}'")))?,
                )
            };
            suffixes.push(Suffix::Peel(peel));
            pos = close + 1;
            continue;
        }

        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        let count = if digits == 0 {
            1
        } else {
            spec[pos..pos + digits]
                .parse()
                .map_err(|_| invalid(spec, "count out of range"))?
        };
        pos += digits;
        match op {
            b'^' => suffixes.push(Suffix::Parent(count)),
            b'~' => suffixes.push(Suffix::Ancestor(count)),
            _ => return Err(invalid(spec, "unexpected character")),
        }
    }
    Ok((base, suffixes))
}

fn invalid(spec: &str, reason: &str) -> RepoError {
    RepoError::InvalidSpec {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}
