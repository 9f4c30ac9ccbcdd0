//! Repository discovery, initialization, and the central `Repository` type
//! that ties the object database, reference store, index and configuration
//! together.
//!
//! Every operation works on an explicit handle; there is no process-wide
//! "current repository". Dropping a `Repository` releases everything it
//! holds, and locks are only ever held for the duration of one call.

mod checkout;
mod discover;
mod error;
mod init;
mod lookup;
mod refs;
mod revparse;
mod stage;

pub use checkout::CheckoutOptions;
pub use error::RepoError;
pub use init::{InitOptions, DEFAULT_BRANCH};

pub use vcs_hash::{HashAlgorithm, ObjectId};
pub use vcs_index::{ConflictSide, Index, Stage};
pub use vcs_object::{Blob, Commit, FileMode, Object, ObjectType, Tag, Tree, TreeEntry};
pub use vcs_ref::{RefName, RefUpdate, Reference, ReflogEntry};
pub use vcs_utils::{ErrorKind, Signature, Time};

use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use vcs_config::{ConfigKey, ConfigScope, ConfigSet};
use vcs_odb::ObjectDatabase;
use vcs_ref::FilesRefStore;

use discover::Location;

pub struct Repository {
    git_dir: PathBuf,
    /// `None` for bare repositories.
    work_tree: Option<PathBuf>,
    odb: ObjectDatabase,
    refs: FilesRefStore,
    config: ConfigSet,
    algo: HashAlgorithm,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .field("hash_algorithm", &self.algo)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open the repository containing `path`, searching `path` and then
    /// each ancestor up to the file system root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_location(discover::discover(path.as_ref(), &[])?)
    }

    /// Open the repository at exactly `path`: a working tree root, its
    /// `.git` directory, or a bare repository.
    pub fn open_exact(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_location(discover::open(path.as_ref())?)
    }

    /// Search `start` and its ancestors for a repository, stopping below
    /// the directories in `GIT_CEILING_DIRECTORIES`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::discover_with_ceilings(start, &discover::ceiling_dirs_from_env())
    }

    pub fn discover_with_ceilings(
        start: impl AsRef<Path>,
        ceilings: &[PathBuf],
    ) -> Result<Self, RepoError> {
        Self::from_location(discover::discover(start.as_ref(), ceilings)?)
    }

    /// Create a repository with a working tree at `path`.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::init_opts(path, &InitOptions::default())
    }

    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::init_opts(
            path,
            &InitOptions {
                bare: true,
                ..Default::default()
            },
        )
    }

    pub fn init_opts(path: impl AsRef<Path>, options: &InitOptions) -> Result<Self, RepoError> {
        Self::from_location(init::init(path.as_ref(), options)?)
    }

    fn from_location(location: Location) -> Result<Self, RepoError> {
        let Location { git_dir, work_tree } = location;
        let config = ConfigSet::load(Some(&git_dir))?;

        let version = config.get_int("core.repositoryformatversion")?.unwrap_or(0);
        if !(0..=1).contains(&version) {
            return Err(RepoError::UnsupportedFormat(format!(
                "core.repositoryformatversion = {version}"
            )));
        }
        let algo = match config.get_string("extensions.objectformat")? {
            Some(name) => HashAlgorithm::from_name(&name)
                .ok_or_else(|| RepoError::UnsupportedFormat(format!("object format '{name}'")))?,
            None => HashAlgorithm::Sha1,
        };
        let work_tree = match config.get_bool("core.bare")? {
            Some(true) => None,
            _ => work_tree,
        };

        Ok(Repository {
            odb: ObjectDatabase::open(git_dir.join("objects"), algo),
            refs: FilesRefStore::new(&git_dir, algo),
            git_dir,
            work_tree,
            config,
            algo,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.work_tree.is_none()
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    pub fn refs(&self) -> &FilesRefStore {
        &self.refs
    }

    pub fn config(&self) -> &ConfigSet {
        &self.config
    }

    /// Set `key` in the repository's own `config` file and persist it.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<(), RepoError> {
        let key = ConfigKey::parse(key)?;
        let local = self
            .config
            .file_mut(ConfigScope::Local)
            .ok_or_else(|| RepoError::InvalidGitDir {
                path: self.git_dir.clone(),
                reason: "no repository config file".to_string(),
            })?;
        local.set(&key, value.as_bytes().as_bstr());
        local.save()?;
        Ok(())
    }

    /// The staging area as currently stored on disk.
    pub fn index(&self) -> Result<Index, RepoError> {
        if self.is_bare() {
            return Err(RepoError::BareRepo("use the index"));
        }
        Ok(Index::load(self.index_path(), self.algo)?)
    }

    fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// The identity from `user.name` and `user.email`, stamped now.
    pub fn default_signature(&self) -> Result<Signature, RepoError> {
        let name = self
            .config
            .get_string("user.name")?
            .ok_or(RepoError::MissingIdentity("user.name"))?;
        let email = self
            .config
            .get_string("user.email")?
            .ok_or(RepoError::MissingIdentity("user.email"))?;
        Ok(Signature::now(name, email)?)
    }

    /// Identity for reflog lines; never fails.
    fn reflog_identity(&self) -> Option<Signature> {
        self.default_signature()
            .ok()
            .or_else(|| Signature::now("unknown", "unknown").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_names_locations() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let text = format!("{repo:?}");
        assert!(text.contains("git_dir"));
        assert!(text.contains("Sha1"));
    }

    #[test]
    fn unknown_object_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        repo.set_config("extensions.objectformat", "md5").unwrap();
        let err = Repository::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        repo.set_config("extensions.objectformat", "sha1").unwrap();
        repo.set_config("core.repositoryformatversion", "7").unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(RepoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn core_bare_hides_the_work_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::init(dir.path()).unwrap();
        assert!(!repo.is_bare());
        repo.set_config("core.bare", "true").unwrap();
        assert!(Repository::open(dir.path()).unwrap().is_bare());
    }

    #[test]
    fn open_searches_upwards_but_open_exact_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let sub = dir.path().join("src/deep");
        std::fs::create_dir_all(&sub).unwrap();

        let opened = Repository::open(&sub).unwrap();
        assert_eq!(opened.git_dir(), repo.git_dir());
        assert_eq!(opened.work_tree(), repo.work_tree());
        assert!(matches!(
            Repository::open_exact(&sub),
            Err(RepoError::NotARepository(_))
        ));
        assert!(Repository::open_exact(dir.path()).is_ok());
    }
}
