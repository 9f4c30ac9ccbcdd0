use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use vcs_hash::{HashAlgorithm, ObjectId};

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

const SYMREF_PREFIX: &[u8] = b"ref: ";

pub(crate) fn loose_path(git_dir: &Path, name: &RefName) -> PathBuf {
    let mut path = git_dir.to_path_buf();
    path.extend(name.as_str().split('/'));
    path
}

/// Read a loose ref file. A missing file, or a directory standing at the
/// path (the name is a prefix of other refs), is `None`.
pub(crate) fn read(
    git_dir: &Path,
    name: &RefName,
    algo: HashAlgorithm,
) -> Result<Option<Reference>, RefError> {
    let path = loose_path(git_dir, name);
    match fs::read(&path) {
        Ok(data) => parse(name, &data, algo).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => Ok(None),
        Err(source) => Err(RefError::IoPath { path, source }),
    }
}

pub(crate) fn parse(
    name: &RefName,
    data: &[u8],
    algo: HashAlgorithm,
) -> Result<Reference, RefError> {
    let malformed = |what: &str| RefError::Parse(format!("'{name}': {what}"));
    let data = data.trim_end();

    if let Some(target) = data.strip_prefix(SYMREF_PREFIX) {
        let target = target
            .trim()
            .to_str()
            .map_err(|_| malformed("non-UTF-8 symbolic target"))?;
        return Ok(Reference::Symbolic {
            name: name.clone(),
            target: RefName::new(target)?,
        });
    }

    let hex = data.to_str().map_err(|_| malformed("non-ASCII id"))?;
    let target = ObjectId::from_hex_with(hex, algo)
        .map_err(|e| malformed(&format!("bad object id ({e})")))?;
    Ok(Reference::Direct {
        name: name.clone(),
        target,
    })
}

/// File contents for a direct ref.
pub(crate) fn direct_content(id: &ObjectId) -> Vec<u8> {
    format!("{id}\n").into_bytes()
}

/// File contents for a symbolic ref.
pub(crate) fn symbolic_content(target: &RefName) -> Vec<u8> {
    format!("ref: {target}\n").into_bytes()
}

/// All valid loose ref names under `refs/`, plus `HEAD` when present.
/// Lock files and anything else that is not a valid name are skipped.
pub(crate) fn names(git_dir: &Path) -> Result<Vec<RefName>, RefError> {
    let mut out = Vec::new();
    walk(&git_dir.join("refs"), "refs", &mut out)?;
    if git_dir.join("HEAD").is_file() {
        out.push(RefName::head());
    }
    Ok(out)
}

fn walk(dir: &Path, prefix: &str, out: &mut Vec<RefName>) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(RefError::IoPath {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    for entry in entries {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let child = format!("{prefix}/{file_name}");
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&entry.path(), &child, out)?;
        } else if file_type.is_file() {
            if let Ok(name) = RefName::new(child) {
                out.push(name);
            }
        }
    }
    Ok(())
}

/// The first path component standing in the way of creating `name` as a
/// loose file: an existing file at one of its parent directories, or a
/// directory at its own path.
pub(crate) fn conflicting_path(git_dir: &Path, name: &RefName) -> Option<String> {
    let components: Vec<&str> = name.as_str().split('/').collect();
    let mut path = git_dir.to_path_buf();
    for (i, component) in components.iter().enumerate() {
        path.push(component);
        let last = i + 1 == components.len();
        if (!last && path.is_file()) || (last && path.is_dir()) {
            return Some(components[..=i].join("/"));
        }
    }
    None
}
