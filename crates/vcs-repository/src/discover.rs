use std::path::{Path, PathBuf};

use crate::RepoError;

/// Where a repository lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Location {
    pub git_dir: PathBuf,
    /// `None` for bare repositories.
    pub work_tree: Option<PathBuf>,
}

/// Directories listed in `GIT_CEILING_DIRECTORIES`.
pub(crate) fn ceiling_dirs_from_env() -> Vec<PathBuf> {
    std::env::var_os("GIT_CEILING_DIRECTORIES")
        .map(|raw| std::env::split_paths(&raw).filter(|p| p.is_absolute()).collect())
        .unwrap_or_default()
}

/// Walk up from `start` looking for a repository.
///
/// Each directory is checked for a `.git` directory, then a `.git` file
/// holding `gitdir: <path>`, then for being a bare repository itself. The
/// walk never moves up into a ceiling directory.
pub(crate) fn discover(start: &Path, ceilings: &[PathBuf]) -> Result<Location, RepoError> {
    let start = std::fs::canonicalize(start)
        .map_err(|_| RepoError::NotARepository(start.to_path_buf()))?;
    let ceilings: Vec<PathBuf> = ceilings
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();

    let mut current = start.as_path();
    loop {
        if let Some(location) = probe(current)? {
            tracing::debug!(git_dir = %location.git_dir.display(), "discovered repository");
            return Ok(location);
        }
        match current.parent() {
            Some(parent) if !ceilings.iter().any(|c| c == parent) => current = parent,
            _ => return Err(RepoError::NotARepository(start)),
        }
    }
}

/// Open exactly `path`: a repository directory, or a working tree whose
/// `.git` is a directory or a `gitdir:` file.
pub(crate) fn open(path: &Path) -> Result<Location, RepoError> {
    let path = std::fs::canonicalize(path)
        .map_err(|_| RepoError::NotARepository(path.to_path_buf()))?;
    probe(&path)?.ok_or(RepoError::NotARepository(path))
}

fn probe(dir: &Path) -> Result<Option<Location>, RepoError> {
    let dot_git = dir.join(".git");
    if dot_git.is_dir() && is_git_dir(&dot_git) {
        return Ok(Some(Location {
            git_dir: dot_git,
            work_tree: Some(dir.to_path_buf()),
        }));
    }
    if dot_git.is_file() {
        let target = read_gitdir_file(&dot_git)?;
        let target = if target.is_absolute() { target } else { dir.join(target) };
        let git_dir = std::fs::canonicalize(&target).map_err(|e| RepoError::InvalidGitDir {
            path: dot_git.clone(),
            reason: format!("cannot resolve gitdir target: {e}"),
        })?;
        if !is_git_dir(&git_dir) {
            return Err(RepoError::InvalidGitDir {
                path: git_dir,
                reason: "missing HEAD, objects/ or refs/".to_string(),
            });
        }
        return Ok(Some(Location {
            git_dir,
            work_tree: Some(dir.to_path_buf()),
        }));
    }
    if is_git_dir(dir) {
        // A `.git` directory opened directly still has its working tree.
        let work_tree = match (dir.file_name(), dir.parent()) {
            (Some(name), Some(parent)) if name == ".git" => Some(parent.to_path_buf()),
            _ => None,
        };
        return Ok(Some(Location {
            git_dir: dir.to_path_buf(),
            work_tree,
        }));
    }
    Ok(None)
}

pub(crate) fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

fn read_gitdir_file(path: &Path) -> Result<PathBuf, RepoError> {
    let content = std::fs::read_to_string(path).map_err(|e| RepoError::InvalidGitDir {
        path: path.to_path_buf(),
        reason: format!("cannot read .git file: {e}"),
    })?;
    let content = content.trim();
    content
        .strip_prefix("gitdir:")
        .map(|target| PathBuf::from(target.trim()))
        .ok_or_else(|| RepoError::InvalidGitDir {
            path: path.to_path_buf(),
            reason: format!("expected 'gitdir: <path>', got '{content}'"),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fake_git_dir(path: &Path) {
        fs::create_dir_all(path.join("objects")).unwrap();
        fs::create_dir_all(path.join("refs")).unwrap();
        fs::write(path.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    }

    #[test]
    fn finds_dot_git_from_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        fake_git_dir(&root.path().join(".git"));
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = discover(&nested, &[]).unwrap();
        let root = fs::canonicalize(root.path()).unwrap();
        assert_eq!(found.git_dir, root.join(".git"));
        assert_eq!(found.work_tree.as_deref(), Some(root.as_path()));
    }

    #[test]
    fn ceiling_stops_the_walk() {
        let root = tempfile::tempdir().unwrap();
        fake_git_dir(&root.path().join(".git"));
        let mid = root.path().join("mid");
        let nested = mid.join("leaf");
        fs::create_dir_all(&nested).unwrap();

        let err = discover(&nested, &[mid.clone()]).unwrap_err();
        assert!(matches!(err, RepoError::NotARepository(_)));
        // A ceiling above the repository does not hide it.
        assert!(discover(&nested, &[root.path().parent().unwrap().to_path_buf()]).is_ok());
        // The start directory itself is always examined.
        assert!(discover(root.path(), &[root.path().to_path_buf()]).is_ok());
    }

    #[test]
    fn gitdir_file_redirects() {
        let root = tempfile::tempdir().unwrap();
        let real = root.path().join("store.git");
        fake_git_dir(&real);
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join(".git"), "gitdir: ../store.git\n").unwrap();

        let found = open(&work).unwrap();
        assert_eq!(found.git_dir, fs::canonicalize(&real).unwrap());
        assert_eq!(found.work_tree, Some(fs::canonicalize(&work).unwrap()));

        fs::write(work.join(".git"), "nonsense\n").unwrap();
        assert!(matches!(open(&work), Err(RepoError::InvalidGitDir { .. })));
    }

    #[test]
    fn bare_layout_and_plain_directories() {
        let root = tempfile::tempdir().unwrap();
        let bare = root.path().join("bare.git");
        fake_git_dir(&bare);
        let found = open(&bare).unwrap();
        assert_eq!(found.work_tree, None);

        let plain = root.path().join("plain");
        fs::create_dir_all(&plain).unwrap();
        assert!(matches!(open(&plain), Err(RepoError::NotARepository(_))));
        assert!(matches!(
            open(&root.path().join("missing")),
            Err(RepoError::NotARepository(_))
        ));
    }
}
