//! Read-only access to objects, references and `HEAD`.

use vcs_hash::ObjectId;
use vcs_object::{Blob, Commit, Object, Tag, Tree};
use vcs_ref::{RefError, RefName, Reference, BRANCH_PREFIX, TAG_PREFIX};

use crate::{RepoError, Repository};

impl Repository {
    /// The `HEAD` reference as stored, without following it.
    pub fn head(&self) -> Result<Reference, RepoError> {
        Ok(self.refs.lookup(&RefName::head())?)
    }

    /// The commit `HEAD` resolves to. `UnbornBranch` before the first commit.
    pub fn head_id(&self) -> Result<ObjectId, RepoError> {
        Ok(self.refs.resolve(&RefName::head())?)
    }

    /// Whether `HEAD` names a branch that has no commit yet.
    pub fn is_unborn(&self) -> Result<bool, RepoError> {
        match self.refs.resolve(&RefName::head()) {
            Ok(_) => Ok(false),
            Err(RefError::Unborn(_)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Unborn `HEAD` and no references at all.
    pub fn is_empty(&self) -> Result<bool, RepoError> {
        Ok(self.is_unborn()? && self.refs.list("refs/")?.next().is_none())
    }

    pub fn is_head_detached(&self) -> Result<bool, RepoError> {
        Ok(self.head()?.is_direct())
    }

    /// Short name of the branch `HEAD` points at; `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>, RepoError> {
        Ok(match self.head()? {
            Reference::Symbolic { target, .. } if target.is_branch() => {
                Some(target.short().to_string())
            }
            _ => None,
        })
    }

    pub fn find_object(&self, id: &ObjectId) -> Result<Object, RepoError> {
        Ok(self.odb.read(id)?)
    }

    pub fn find_commit(&self, id: &ObjectId) -> Result<Commit, RepoError> {
        Ok(self.odb.find_commit(id)?)
    }

    pub fn find_tree(&self, id: &ObjectId) -> Result<Tree, RepoError> {
        Ok(self.odb.find_tree(id)?)
    }

    pub fn find_blob(&self, id: &ObjectId) -> Result<Blob, RepoError> {
        Ok(self.odb.find_blob(id)?)
    }

    pub fn find_tag(&self, id: &ObjectId) -> Result<Tag, RepoError> {
        Ok(self.odb.find_tag(id)?)
    }

    /// Look up a reference by its full name.
    pub fn lookup_reference(&self, name: &str) -> Result<Reference, RepoError> {
        Ok(self.refs.lookup(&parse_ref_name(name)?)?)
    }

    /// Look up `refs/heads/<name>`.
    pub fn lookup_branch(&self, name: &str) -> Result<Reference, RepoError> {
        Ok(self.refs.lookup(&branch_name(name)?)?)
    }

    /// Look up `refs/tags/<name>`.
    pub fn lookup_tag(&self, name: &str) -> Result<Reference, RepoError> {
        Ok(self.refs.lookup(&tag_name(name)?)?)
    }

    /// References whose full name starts with `prefix`, ordered by name.
    /// Each call returns a fresh snapshot.
    pub fn references(&self, prefix: &str) -> Result<std::vec::IntoIter<Reference>, RepoError> {
        Ok(self.refs.list(prefix)?)
    }

    pub fn branches(&self) -> Result<std::vec::IntoIter<Reference>, RepoError> {
        self.references(BRANCH_PREFIX)
    }

    pub fn tags(&self) -> Result<std::vec::IntoIter<Reference>, RepoError> {
        self.references(TAG_PREFIX)
    }

    /// History of a reference, newest first.
    pub fn reflog(&self, name: &str) -> Result<Vec<vcs_ref::ReflogEntry>, RepoError> {
        Ok(self.refs.read_reflog(&parse_ref_name(name)?)?)
    }
}

pub(crate) fn parse_ref_name(name: &str) -> Result<RefName, RepoError> {
    RefName::new(name).map_err(|e| invalid(name, e))
}

pub(crate) fn branch_name(short: &str) -> Result<RefName, RepoError> {
    let short = short.strip_prefix(BRANCH_PREFIX).unwrap_or(short);
    RefName::branch(short).map_err(|e| invalid(short, e))
}

pub(crate) fn tag_name(short: &str) -> Result<RefName, RepoError> {
    let short = short.strip_prefix(TAG_PREFIX).unwrap_or(short);
    RefName::tag(short).map_err(|e| invalid(short, e))
}

fn invalid(spec: &str, e: RefError) -> RepoError {
    RepoError::InvalidSpec {
        spec: spec.to_string(),
        reason: e.to_string(),
    }
}
