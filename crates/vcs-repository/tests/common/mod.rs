#![allow(dead_code)]

use std::fs;
use std::path::Path;

use vcs_repository::{ObjectId, Repository, Signature, Time};

/// Keep the caller's global config out of the way and install a
/// subscriber that honors `RUST_LOG`.
pub fn isolate() {
    std::env::set_var("GIT_CONFIG_NOGLOBAL", "1");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh non-bare repository with an identity configured.
pub fn repo() -> (tempfile::TempDir, Repository) {
    isolate();
    let dir = tempfile::tempdir().unwrap();
    let mut repo = Repository::init(dir.path()).unwrap();
    repo.set_config("user.name", "Test User").unwrap();
    repo.set_config("user.email", "test@example.com").unwrap();
    (dir, repo)
}

pub fn sig() -> Signature {
    Signature::new("Test User", "test@example.com", Time::new(1_700_000_000, 60)).unwrap()
}

pub fn write_file(repo: &Repository, path: &str, content: &str) {
    let full = repo.work_tree().unwrap().join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

pub fn read_file(repo: &Repository, path: &str) -> String {
    fs::read_to_string(repo.work_tree().unwrap().join(path)).unwrap()
}

pub fn exists(repo: &Repository, path: &str) -> bool {
    Path::new(&repo.work_tree().unwrap().join(path))
        .symlink_metadata()
        .is_ok()
}

/// Write `path` to the working tree and stage it.
pub fn stage(repo: &Repository, path: &str, content: &str) -> ObjectId {
    write_file(repo, path, content);
    repo.add_path(path).unwrap()
}

/// Commit the index on top of `HEAD`.
pub fn commit(repo: &Repository, message: &str) -> ObjectId {
    let tree = repo.write_tree().unwrap();
    let parents: Vec<ObjectId> = repo.head_id().ok().into_iter().collect();
    repo.create_commit(Some("HEAD"), &sig(), &sig(), message, &tree, &parents)
        .unwrap()
}
