//! Conversion between index entries and tree objects.

use std::collections::HashMap;

use bstr::{BStr, BString, ByteSlice};
use vcs_hash::ObjectId;
use vcs_object::{FileMode, Object, Tree, TreeEntry};
use vcs_odb::ObjectDatabase;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

/// A non-tree leaf of a flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeItem {
    pub path: BString,
    pub mode: FileMode,
    pub id: ObjectId,
}

pub(crate) fn write_tree(index: &Index, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    let unmerged: Vec<BString> = index.conflicts().into_iter().map(|c| c.path).collect();
    if !unmerged.is_empty() {
        return Err(IndexError::Unmerged(unmerged));
    }
    let leaves: Vec<(&[u8], &IndexEntry)> = index.iter().map(|e| (e.path.as_slice(), e)).collect();
    let root = build(&leaves, odb)?;
    tracing::debug!(tree = %root, entries = index.len(), "wrote tree from index");
    Ok(root)
}

/// Write the tree for `leaves`, whose paths are relative to the directory
/// being built. Directory groups are contiguous because `/` sorts below
/// every byte that can follow a shared prefix inside one component.
fn build(leaves: &[(&[u8], &IndexEntry)], odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i < leaves.len() {
        let (rel, entry) = leaves[i];
        match rel.find_byte(b'/') {
            None => {
                entries.push(TreeEntry::new(entry.mode, rel, entry.id));
                i += 1;
            }
            Some(slash) => {
                let dir = &rel[..slash];
                let end = i + leaves[i..]
                    .iter()
                    .take_while(|(p, _)| p.len() > slash && p[slash] == b'/' && &p[..slash] == dir)
                    .count();
                let children: Vec<(&[u8], &IndexEntry)> = leaves[i..end]
                    .iter()
                    .map(|(p, e)| (&p[slash + 1..], *e))
                    .collect();
                let sub = build(&children, odb)?;
                entries.push(TreeEntry::new(FileMode::Tree, dir, sub));
                i = end;
            }
        }
    }
    // Canonical order is applied here, not by the index's byte order.
    let tree = Tree::from_entries(entries).map_err(vcs_odb::OdbError::from)?;
    Ok(odb.write(&Object::Tree(tree))?)
}

pub(crate) fn read_tree(
    index: &mut Index,
    odb: &ObjectDatabase,
    tree_id: &ObjectId,
) -> Result<(), IndexError> {
    let previous: HashMap<&BStr, &IndexEntry> = index
        .iter()
        .filter(|e| e.stage == Stage::Normal)
        .map(|e| (e.path.as_bstr(), e))
        .collect();

    let mut entries: Vec<IndexEntry> = flatten_tree(odb, tree_id)?
        .into_iter()
        .map(|item| {
            let mut entry = IndexEntry::new(item.path, item.id, item.mode);
            if let Some(old) = previous.get(entry.path.as_bstr()) {
                if old.id == entry.id && old.mode == entry.mode {
                    entry.stat = old.stat;
                }
            }
            entry
        })
        .collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    drop(previous);
    index.replace_entries(entries);
    Ok(())
}

/// Every non-tree entry reachable from `tree_id`, with full paths, in
/// tree order.
pub fn flatten_tree(odb: &ObjectDatabase, tree_id: &ObjectId) -> Result<Vec<TreeItem>, IndexError> {
    let mut out = Vec::new();
    walk(odb, tree_id, &mut BString::default(), &mut out)?;
    Ok(out)
}

fn walk(
    odb: &ObjectDatabase,
    tree_id: &ObjectId,
    prefix: &mut BString,
    out: &mut Vec<TreeItem>,
) -> Result<(), IndexError> {
    let tree = odb.find_tree(tree_id)?;
    for entry in tree.iter() {
        let base = prefix.len();
        if base > 0 {
            prefix.push(b'/');
        }
        prefix.extend_from_slice(&entry.name);
        if entry.mode.is_tree() {
            walk(odb, &entry.id, prefix, out)?;
        } else {
            out.push(TreeItem {
                path: prefix.clone(),
                mode: entry.mode,
                id: entry.id,
            });
        }
        prefix.truncate(base);
    }
    Ok(())
}
