//! Operations that create objects and move references: commits, branches,
//! tags, `HEAD`, and compare-and-swap updates.

use std::collections::{HashSet, VecDeque};

use bstr::{BStr, ByteSlice};
use tracing::debug;
use vcs_hash::ObjectId;
use vcs_object::{Commit, Object, Tag};
use vcs_ref::{RefError, RefName, RefUpdate, Reference, ReflogEntry};
use vcs_utils::Signature;

use crate::lookup::{branch_name, parse_ref_name, tag_name};
use crate::{RepoError, Repository};

impl Repository {
    /// Write a commit and optionally move `update_ref` to it.
    ///
    /// The tree and every parent must exist. When `update_ref` names an
    /// existing reference (after following symbolic links) its current
    /// value must be the first parent; an unborn or absent reference is
    /// created. Parents are recorded in the order given.
    pub fn create_commit(
        &self,
        update_ref: Option<&str>,
        author: &Signature,
        committer: &Signature,
        message: impl AsRef<[u8]>,
        tree: &ObjectId,
        parents: &[ObjectId],
    ) -> Result<ObjectId, RepoError> {
        self.odb.find_tree(tree)?;
        for parent in parents {
            self.odb.find_commit(parent)?;
        }

        let commit = Commit::new(
            *tree,
            parents.to_vec(),
            author.clone(),
            committer.clone(),
            message.as_ref(),
        );
        let reflog_message = format!(
            "{}: {}",
            match parents.len() {
                0 => "commit (initial)",
                1 => "commit",
                _ => "commit (merge)",
            },
            commit.summary().to_str_lossy()
        );
        let id = self.odb.write(&Object::Commit(commit))?;
        debug!(commit = %id, tree = %tree, parents = parents.len(), "created commit");

        if let Some(name) = update_ref {
            let name = parse_ref_name(name)?;
            let (target, current) = self.follow_or_absent(&name)?;
            if let Some(current) = current {
                if parents.first() != Some(&current) {
                    return Err(RefError::CasFailed {
                        name: target.to_string(),
                        expected: parents.first().copied(),
                        actual: Some(current),
                    }
                    .into());
                }
            }
            let update = self.refs.update(&name, id, current)?;
            self.log_update(&update.name, update.old, id, &reflog_message)?;
        }
        Ok(id)
    }

    /// Create `refs/heads/<name>` at `target`, which must peel to a commit.
    ///
    /// An existing branch is `AlreadyExists` unless `force`; the
    /// checked-out branch is never overwritten.
    pub fn create_branch(
        &self,
        name: &str,
        target: &ObjectId,
        force: bool,
    ) -> Result<Reference, RepoError> {
        let refname = branch_name(name)?;
        let (commit_id, _) = self.odb.peel_to_commit(target)?;
        if force && self.head_branch()?.as_ref() == Some(&refname) {
            return Err(RefError::CheckedOut(refname.to_string()).into());
        }

        let old = self.refs.find(&refname)?.and_then(|r| r.target_id());
        self.refs.create(&refname, commit_id, force)?;
        let message = match old {
            None => format!("branch: Created from {commit_id}"),
            Some(_) => format!("branch: Reset to {commit_id}"),
        };
        self.log_update(&refname, old, commit_id, &message)?;
        Ok(Reference::Direct {
            name: refname,
            target: commit_id,
        })
    }

    /// Create `refs/tags/<name>`.
    ///
    /// A lightweight tag points straight at `target`; otherwise a tag object
    /// is written first and the reference points at it. Returns what the
    /// reference points at.
    pub fn create_tag(
        &self,
        name: &str,
        target: &ObjectId,
        tagger: &Signature,
        message: impl AsRef<[u8]>,
        lightweight: bool,
    ) -> Result<ObjectId, RepoError> {
        let refname = tag_name(name)?;
        if self.refs.exists(&refname)? {
            return Err(RefError::AlreadyExists(refname.to_string()).into());
        }
        let info = self.odb.read_header(target)?;

        let id = if lightweight {
            *target
        } else {
            let tag = Tag::new(
                *target,
                info.object_type,
                refname.short(),
                tagger.clone(),
                message.as_ref(),
            );
            self.odb.write(&Object::Tag(tag))?
        };
        self.refs.create(&refname, id, false)?;
        debug!(tag = %refname, target = %target, lightweight, "created tag");
        Ok(id)
    }

    /// Delete `refs/heads/<name>`. The branch `HEAD` is on is refused.
    pub fn delete_branch(&self, name: &str) -> Result<(), RepoError> {
        Ok(self.refs.delete(&branch_name(name)?)?)
    }

    pub fn delete_tag(&self, name: &str) -> Result<(), RepoError> {
        Ok(self.refs.delete(&tag_name(name)?)?)
    }

    /// Compare-and-swap `name` from `expected` (`None`: must not exist) to
    /// `new`. A stale expectation fails with kind `Modified`.
    pub fn update_reference(
        &self,
        name: &str,
        new: &ObjectId,
        expected: Option<&ObjectId>,
        message: &str,
    ) -> Result<RefUpdate, RepoError> {
        let refname = parse_ref_name(name)?;
        if !self.odb.exists(new) {
            return Err(vcs_odb::OdbError::NotFound(*new).into());
        }
        let update = self.refs.update(&refname, *new, expected.copied())?;
        self.log_update(&update.name, update.old, update.new, message)?;
        Ok(update)
    }

    /// Move `name` to `new` only if `new` contains its current commit.
    ///
    /// A non-descendant target, or a reference that moved underneath the
    /// check, is `NonFastForward`. An absent reference is created.
    pub fn fast_forward(&self, name: &str, new: &ObjectId) -> Result<RefUpdate, RepoError> {
        let refname = parse_ref_name(name)?;
        let (new_commit, _) = self.odb.peel_to_commit(new)?;
        let (_, current) = self.follow_or_absent(&refname)?;

        if let Some(current) = current {
            if current != new_commit && !self.is_descendant_of(&new_commit, &current)? {
                return Err(RepoError::NonFastForward {
                    name: refname.to_string(),
                    reason: format!("{new_commit} does not contain {current}"),
                });
            }
        }

        let update = self
            .refs
            .update(&refname, new_commit, current)
            .map_err(|e| match e {
                RefError::CasFailed { name, .. } => RepoError::NonFastForward {
                    name,
                    reason: "reference changed during update".to_string(),
                },
                other => other.into(),
            })?;
        self.log_update(&update.name, update.old, update.new, "fast-forward")?;
        Ok(update)
    }

    /// Whether `ancestor` is reachable from `commit` through parent links.
    /// A commit does not descend from itself.
    pub fn is_descendant_of(
        &self,
        commit: &ObjectId,
        ancestor: &ObjectId,
    ) -> Result<bool, RepoError> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<ObjectId> = self.odb.find_commit(commit)?.parents.into();
        while let Some(id) = queue.pop_front() {
            if id == *ancestor {
                return Ok(true);
            }
            if seen.insert(id) {
                queue.extend(self.odb.find_commit(&id)?.parents);
            }
        }
        Ok(false)
    }

    /// Point `HEAD` at `refname`. A branch is attached symbolically even if
    /// it has no commit yet; any other reference detaches `HEAD` at its
    /// commit.
    pub fn set_head(&self, refname: &str) -> Result<(), RepoError> {
        let name = parse_ref_name(refname)?;
        if !name.is_branch() {
            let id = self.refs.resolve(&name)?;
            return self.set_head_detached(&id);
        }

        let from = self.describe_head()?;
        let old = self.head_id().ok();
        self.refs.create_symbolic(&RefName::head(), &name, true)?;
        if let Ok(new) = self.refs.resolve(&name) {
            let message = format!("checkout: moving from {from} to {}", name.short());
            self.log_head(old, new, &message)?;
        }
        Ok(())
    }

    /// Detach `HEAD` at the commit `id` peels to.
    pub fn set_head_detached(&self, id: &ObjectId) -> Result<(), RepoError> {
        let (commit_id, _) = self.odb.peel_to_commit(id)?;
        let from = self.describe_head()?;
        let old = self.head_id().ok();
        self.refs.create(&RefName::head(), commit_id, true)?;
        let message = format!("checkout: moving from {from} to {commit_id}");
        self.log_head(old, commit_id, &message)
    }

    /// The branch `HEAD` is attached to, born or not.
    pub(crate) fn head_branch(&self) -> Result<Option<RefName>, RepoError> {
        Ok(match self.refs.find(&RefName::head())? {
            Some(Reference::Symbolic { target, .. }) => Some(target),
            _ => None,
        })
    }

    /// How reflog messages name the current `HEAD`: branch or hex id.
    pub(crate) fn describe_head(&self) -> Result<String, RepoError> {
        match self.current_branch()? {
            Some(branch) => Ok(branch),
            None => Ok(self.head_id().map(|id| id.to_hex()).unwrap_or_default()),
        }
    }

    /// Append to the log of `name`, and to `HEAD`'s when `HEAD` is attached
    /// to `name`.
    pub(crate) fn log_update(
        &self,
        name: &RefName,
        old: Option<ObjectId>,
        new: ObjectId,
        message: &str,
    ) -> Result<(), RepoError> {
        let Some(identity) = self.reflog_identity() else {
            return Ok(());
        };
        let entry = ReflogEntry::new(old, new, identity, one_line(message.as_bytes().as_bstr()));
        self.refs.append_reflog(name, &entry)?;
        if !name.is_head() && self.head_branch()?.as_ref() == Some(name) {
            self.refs.append_reflog(&RefName::head(), &entry)?;
        }
        Ok(())
    }

    pub(crate) fn log_head(
        &self,
        old: Option<ObjectId>,
        new: ObjectId,
        message: &str,
    ) -> Result<(), RepoError> {
        let Some(identity) = self.reflog_identity() else {
            return Ok(());
        };
        let entry = ReflogEntry::new(old, new, identity, message);
        Ok(self.refs.append_reflog(&RefName::head(), &entry)?)
    }

    /// Like `follow`, but a missing reference is its own absent end.
    fn follow_or_absent(&self, name: &RefName) -> Result<(RefName, Option<ObjectId>), RepoError> {
        match self.refs.follow(name) {
            Ok(found) => Ok(found),
            Err(RefError::NotFound(_)) => Ok((name.clone(), None)),
            Err(e) => Err(e.into()),
        }
    }
}

fn one_line(message: &BStr) -> String {
    message.lines().next().unwrap_or_default().to_str_lossy().into_owned()
}
