use vcs_hash::ObjectId;
use vcs_object::{Commit, Object, ObjectType, Tree};

use crate::{wrong_type, ObjectDatabase, OdbError};

impl ObjectDatabase {
    /// Follow annotated tags from `oid` until a commit is reached.
    ///
    /// Tag chains cannot cycle since each tag's id covers its target's id.
    pub fn peel_to_commit(&self, oid: &ObjectId) -> Result<(ObjectId, Commit), OdbError> {
        let mut current = *oid;
        loop {
            match self.read_cached(&current)? {
                Object::Commit(commit) => return Ok((current, commit)),
                Object::Tag(tag) => current = tag.target,
                other => return Err(wrong_type(&current, ObjectType::Commit, &other)),
            }
        }
    }

    /// Follow tags and commits from `oid` until a tree is reached.
    pub fn peel_to_tree(&self, oid: &ObjectId) -> Result<(ObjectId, Tree), OdbError> {
        let mut current = *oid;
        loop {
            match self.read_cached(&current)? {
                Object::Tree(tree) => return Ok((current, tree)),
                Object::Commit(commit) => current = commit.tree,
                Object::Tag(tag) => current = tag.target,
                other => return Err(wrong_type(&current, ObjectType::Tree, &other)),
            }
        }
    }

    /// Follow annotated tags until a non-tag object is reached.
    pub fn peel_tags(&self, oid: &ObjectId) -> Result<(ObjectId, Object), OdbError> {
        let mut current = *oid;
        loop {
            match self.read_cached(&current)? {
                Object::Tag(tag) => current = tag.target,
                other => return Ok((current, other)),
            }
        }
    }
}
