//! Canonical tree order and its effect on tree ids.

use std::cmp::Ordering;

use proptest::prelude::*;
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_object::{FileMode, Object, Tree, TreeEntry};

fn entry(name: &str, mode: FileMode) -> TreeEntry {
    TreeEntry::new(mode, name, ObjectId::Sha1([0x11; 20]))
}

fn file(name: &str) -> TreeEntry {
    entry(name, FileMode::Regular)
}

fn dir(name: &str) -> TreeEntry {
    entry(name, FileMode::Tree)
}

#[test]
fn slash_sits_between_dot_and_zero() {
    // '.' (0x2e) < '/' (0x2f) < '0' (0x30)
    assert_eq!(TreeEntry::cmp_entries(&dir("foo"), &file("foo.c")), Ordering::Greater);
    assert_eq!(TreeEntry::cmp_entries(&dir("foo"), &file("foo0")), Ordering::Less);
}

#[test]
fn file_and_dir_with_same_name_differ() {
    assert_eq!(TreeEntry::cmp_entries(&file("foo"), &dir("foo")), Ordering::Less);
}

#[test]
fn non_tree_modes_sort_like_files() {
    let exe = entry("a", FileMode::Executable);
    let link = entry("a", FileMode::Symlink);
    let module = entry("a", FileMode::Gitlink);
    assert_eq!(TreeEntry::cmp_entries(&exe, &link), Ordering::Equal);
    assert_eq!(TreeEntry::cmp_entries(&link, &module), Ordering::Equal);
}

#[test]
fn mixed_listing_order() {
    let tree = Tree::from_entries(vec![
        dir("src"),
        file("src.rs"),
        file("Cargo.toml"),
        dir("a"),
        file("a-b"),
        file("a0"),
    ])
    .unwrap();
    let names: Vec<String> = tree.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, ["Cargo.toml", "a-b", "a", "a0", "src.rs", "src"]);
}

fn names() -> impl Strategy<Value = Vec<(String, bool)>> {
    proptest::collection::hash_map("[a-z0-9._-]{1,8}", any::<bool>(), 1..12)
        .prop_map(|m| m.into_iter().filter(|(n, _)| n != "." && n != "..").collect())
}

proptest! {
    #[test]
    fn tree_id_ignores_insertion_order(
        entries in names().prop_filter("non-empty", |v| !v.is_empty()),
        seed in any::<u64>(),
    ) {
        let build = |order: &[(String, bool)]| {
            let list = order
                .iter()
                .map(|(n, is_dir)| if *is_dir { dir(n) } else { file(n) })
                .collect();
            Object::Tree(Tree::from_entries(list).unwrap())
                .compute_id(HashAlgorithm::Sha1)
                .unwrap()
        };

        let mut shuffled = entries.clone();
        let len = shuffled.len();
        let mut state = seed;
        for i in (1..len).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state >> 33) as usize % (i + 1));
        }

        prop_assert_eq!(build(&entries), build(&shuffled));
    }

    #[test]
    fn encoded_trees_decode_to_themselves(entries in names()) {
        let list = entries
            .iter()
            .map(|(n, is_dir)| if *is_dir { dir(n) } else { file(n) })
            .collect();
        let tree = Tree::from_entries(list).unwrap();
        let decoded = Tree::decode(&tree.encode(), HashAlgorithm::Sha1).unwrap();
        prop_assert_eq!(decoded, tree);
    }
}
