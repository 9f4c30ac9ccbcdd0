use std::fs;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use vcs_config::{ConfigFile, ConfigKey, ConfigScope, ConfigSet};
use vcs_hash::HashAlgorithm;
use vcs_ref::RefName;
use vcs_utils::fs::write_atomic;

use crate::discover::{self, Location};
use crate::RepoError;

/// Fallback for `init.defaultBranch`.
pub const DEFAULT_BRANCH: &str = "main";

/// Options for [`Repository::init_opts`](crate::Repository::init_opts).
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub bare: bool,
    /// Branch the unborn `HEAD` points at; `init.defaultBranch` or `main`
    /// when unset.
    pub default_branch: Option<String>,
    pub hash_algorithm: HashAlgorithm,
    /// Allow initializing over an existing repository. Existing files are
    /// kept; only missing parts of the layout are created.
    pub force: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            bare: false,
            default_branch: None,
            hash_algorithm: HashAlgorithm::Sha1,
            force: false,
        }
    }
}

/// Create the on-disk layout:
///
/// ```text
/// HEAD            ref: refs/heads/<default branch>
/// config          core.* and, for SHA-256, extensions.objectformat
/// description
/// info/exclude
/// objects/{info,pack}
/// refs/{heads,tags}
/// ```
pub(crate) fn init(path: &Path, options: &InitOptions) -> Result<Location, RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };
    let (git_dir, work_tree) = if options.bare {
        (path.clone(), None)
    } else {
        (path.join(".git"), Some(path.clone()))
    };

    let existing = discover::is_git_dir(&git_dir);
    if existing && !options.force {
        return Err(RepoError::AlreadyExists(git_dir));
    }

    for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags", "info"] {
        fs::create_dir_all(git_dir.join(dir))?;
    }

    if !existing {
        let branch = default_branch(options)?;
        write_atomic(&git_dir.join("HEAD"), format!("ref: {branch}\n").as_bytes())?;
        write_config(&git_dir, options)?;
        write_if_missing(
            &git_dir.join("description"),
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )?;
        write_if_missing(
            &git_dir.join("info/exclude"),
            "# Patterns listed here are ignored by this repository only.\n",
        )?;
    }

    tracing::debug!(
        git_dir = %git_dir.display(),
        bare = options.bare,
        reinit = existing,
        "initialized repository"
    );
    let git_dir = fs::canonicalize(&git_dir)?;
    let work_tree = work_tree.map(fs::canonicalize).transpose()?;
    Ok(Location { git_dir, work_tree })
}

fn default_branch(options: &InitOptions) -> Result<RefName, RepoError> {
    let short = match &options.default_branch {
        Some(name) => name.clone(),
        None => ConfigSet::load(None)?
            .get_string("init.defaultBranch")?
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
    };
    RefName::branch(&short).map_err(|e| RepoError::InvalidSpec {
        spec: short,
        reason: e.to_string(),
    })
}

fn write_config(git_dir: &Path, options: &InitOptions) -> Result<(), RepoError> {
    let path: PathBuf = git_dir.join("config");
    let mut config = ConfigFile::load(&path, ConfigScope::Local)?;
    let sha256 = options.hash_algorithm == HashAlgorithm::Sha256;
    let bare = if options.bare { "true" } else { "false" };
    let mut values = vec![
        ("core.repositoryformatversion", if sha256 { "1" } else { "0" }),
        ("core.filemode", if cfg!(unix) { "true" } else { "false" }),
        ("core.bare", bare),
    ];
    if sha256 {
        values.push(("extensions.objectformat", options.hash_algorithm.name()));
    }
    for (key, value) in values {
        config.set(&ConfigKey::parse(key)?, value.as_bytes().as_bstr());
    }
    config.write_to(&path)?;
    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<(), RepoError> {
    if !path.exists() {
        fs::write(path, content)?;
    }
    Ok(())
}
