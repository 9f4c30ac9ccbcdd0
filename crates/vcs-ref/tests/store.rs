use std::fs;
use std::time::Duration;

use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_ref::{FilesRefStore, RefError, RefName, Reference, ReflogEntry};
use vcs_utils::lockfile::LockFile;
use vcs_utils::{ErrorKind, Signature, Time};

fn setup() -> (tempfile::TempDir, FilesRefStore) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
    fs::create_dir_all(dir.path().join("refs/tags")).unwrap();
    let store = FilesRefStore::new(dir.path(), HashAlgorithm::Sha1);
    store
        .create_symbolic(&RefName::head(), &RefName::branch("main").unwrap(), false)
        .unwrap();
    (dir, store)
}

fn id(n: u8) -> ObjectId {
    ObjectId::Sha1([n; 20])
}

fn branch(name: &str) -> RefName {
    RefName::branch(name).unwrap()
}

#[test]
fn unborn_head_resolves_after_first_update() {
    let (_dir, store) = setup();
    let head = RefName::head();

    let err = store.resolve(&head).unwrap_err();
    assert!(matches!(err, RefError::Unborn(ref name) if name == "refs/heads/main"));
    assert_eq!(err.kind(), ErrorKind::UnbornBranch);

    let update = store.update(&head, id(1), None).unwrap();
    assert_eq!(update.name, branch("main"));
    assert_eq!(update.old, None);
    assert_eq!(store.resolve(&head).unwrap(), id(1));
    assert!(store.lookup(&head).unwrap().is_symbolic());
}

#[test]
fn missing_references() {
    let (_dir, store) = setup();
    let err = store.lookup(&branch("nope")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.resolve(&branch("nope")).unwrap_err().kind(), ErrorKind::NotFound);

    // A dangling symbolic link outside the branch namespace is not "unborn".
    let alias = RefName::new("refs/aliases/x").unwrap();
    store
        .create_symbolic(&alias, &RefName::new("refs/other/y").unwrap(), false)
        .unwrap();
    assert_eq!(store.resolve(&alias).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn symbolic_cycles_are_reported() {
    let (_dir, store) = setup();
    let a = RefName::new("refs/loop/a").unwrap();
    let b = RefName::new("refs/loop/b").unwrap();
    store.create_symbolic(&a, &b, false).unwrap();
    store.create_symbolic(&b, &a, false).unwrap();
    assert!(matches!(store.resolve(&a), Err(RefError::SymrefLoop(_))));

    let self_loop = RefName::new("refs/loop/self").unwrap();
    store.create_symbolic(&self_loop, &self_loop, false).unwrap();
    assert!(matches!(store.resolve(&self_loop), Err(RefError::SymrefLoop(_))));
}

#[test]
fn chain_at_depth_limit_resolves() {
    let (_dir, store) = setup();
    let names: Vec<RefName> = (0..=10)
        .map(|i| RefName::new(format!("refs/chain/{i}")).unwrap())
        .collect();
    store.create(&names[10], id(5), false).unwrap();
    for i in 0..10 {
        store.create_symbolic(&names[i], &names[i + 1], false).unwrap();
    }
    assert_eq!(store.resolve(&names[0]).unwrap(), id(5));

    let too_far = RefName::new("refs/chain/start").unwrap();
    store.create_symbolic(&too_far, &names[0], false).unwrap();
    assert!(matches!(store.resolve(&too_far), Err(RefError::SymrefLoop(_))));
}

#[test]
fn create_requires_force_to_overwrite() {
    let (_dir, store) = setup();
    store.create(&branch("topic"), id(1), false).unwrap();

    let err = store.create(&branch("topic"), id(2), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(store.resolve(&branch("topic")).unwrap(), id(1));

    store.create(&branch("topic"), id(2), true).unwrap();
    assert_eq!(store.resolve(&branch("topic")).unwrap(), id(2));
}

#[test]
fn directory_file_conflicts_are_rejected() {
    let (_dir, store) = setup();
    store.create(&branch("a"), id(1), false).unwrap();
    let err = store.create(&branch("a/b"), id(1), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    store.create(&branch("x/y"), id(1), false).unwrap();
    let err = store.create(&branch("x"), id(1), true).unwrap_err();
    assert!(matches!(err, RefError::DirectoryConflict { .. }));
}

#[test]
fn update_is_compare_and_swap() {
    let (_dir, store) = setup();
    let main = branch("main");
    store.update(&main, id(1), None).unwrap();

    let err = store.update(&main, id(3), Some(id(2))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Modified);
    match err {
        RefError::CasFailed { expected, actual, .. } => {
            assert_eq!(expected, Some(id(2)));
            assert_eq!(actual, Some(id(1)));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(store.resolve(&main).unwrap(), id(1));

    // Expecting absence fails once the ref exists.
    assert_eq!(store.update(&main, id(3), None).unwrap_err().kind(), ErrorKind::Modified);

    let update = store.update(&main, id(3), Some(id(1))).unwrap();
    assert_eq!(update.old, Some(id(1)));
    assert_eq!(store.resolve(&main).unwrap(), id(3));
}

#[test]
fn held_lock_times_out_as_locked() {
    let (dir, store) = setup();
    let store = store.with_lock_timeout(Duration::from_millis(20));
    store.update(&branch("main"), id(1), None).unwrap();

    let held = LockFile::acquire(dir.path().join("refs/heads/main")).unwrap();
    let err = store.update(&branch("main"), id(2), Some(id(1))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);
    drop(held);

    store.update(&branch("main"), id(2), Some(id(1))).unwrap();
    assert!(!dir.path().join("refs/heads/main.lock").exists());
}

#[test]
fn rejected_update_releases_lock() {
    let (dir, store) = setup();
    store.update(&branch("main"), id(1), None).unwrap();
    store.update(&branch("main"), id(2), Some(id(9))).unwrap_err();
    assert!(!dir.path().join("refs/heads/main.lock").exists());
    assert!(store.lock_timeout() > Duration::ZERO);
}

#[test]
fn delete_semantics() {
    let (dir, store) = setup();
    store.update(&branch("main"), id(1), None).unwrap();
    store.create(&branch("feature/deep"), id(2), false).unwrap();

    assert_eq!(store.delete(&branch("gone")).unwrap_err().kind(), ErrorKind::NotFound);

    let err = store.delete(&branch("main")).unwrap_err();
    assert!(matches!(err, RefError::CheckedOut(_)));
    assert!(store.exists(&branch("main")).unwrap());
    assert!(store.delete(&RefName::head()).is_err());

    store.delete(&branch("feature/deep")).unwrap();
    assert!(!store.exists(&branch("feature/deep")).unwrap());
    assert!(!dir.path().join("refs/heads/feature").exists());
    assert!(dir.path().join("refs/heads").exists());

    // Once HEAD is detached the branch may go.
    store.create(&RefName::head(), id(1), true).unwrap();
    store.delete(&branch("main")).unwrap();
}

#[test]
fn list_is_sorted_filtered_and_fresh() {
    let (dir, store) = setup();
    store.update(&branch("main"), id(1), None).unwrap();
    store.create(&branch("b/x"), id(2), false).unwrap();
    store.create(&RefName::tag("v1").unwrap(), id(3), false).unwrap();
    fs::write(
        dir.path().join("packed-refs"),
        format!("{} refs/tags/v0\n{} refs/heads/main\n", id(4), id(9)),
    )
    .unwrap();

    let names = |prefix: &str| -> Vec<String> {
        store.list(prefix).unwrap().map(|r| r.name().to_string()).collect()
    };
    assert_eq!(
        names(""),
        ["HEAD", "refs/heads/b/x", "refs/heads/main", "refs/tags/v0", "refs/tags/v1"]
    );
    assert_eq!(names("refs/heads/"), ["refs/heads/b/x", "refs/heads/main"]);
    assert_eq!(names("refs/tags/"), ["refs/tags/v0", "refs/tags/v1"]);

    let main: Vec<Reference> = store.list("refs/heads/main").unwrap().collect();
    assert_eq!(main[0].target_id(), Some(id(1)));

    store.create(&branch("c"), id(5), false).unwrap();
    assert_eq!(names("refs/heads/").len(), 3);
}

#[test]
fn packed_peeled_values() {
    let (dir, store) = setup();
    fs::write(
        dir.path().join("packed-refs"),
        format!(
            "# pack-refs with: peeled fully-peeled sorted \n{} refs/tags/v1\n^{}\n",
            id(7),
            id(8)
        ),
    )
    .unwrap();
    let tag = RefName::tag("v1").unwrap();
    assert_eq!(store.resolve(&tag).unwrap(), id(7));
    assert_eq!(store.peeled(&tag).unwrap(), Some(id(8)));

    store.create(&tag, id(9), true).unwrap();
    assert_eq!(store.peeled(&tag).unwrap(), None);
}

#[test]
fn corrupt_loose_file_is_reported() {
    let (dir, store) = setup();
    fs::write(dir.path().join("refs/heads/bad"), "not an id\n").unwrap();
    let err = store.lookup(&branch("bad")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptObject);
}

#[test]
fn reflog_through_store() {
    let (dir, store) = setup();
    let who = Signature::new("R", "r@example.com", Time::new(100, 0)).unwrap();
    let main = branch("main");
    store.update(&main, id(2), None).unwrap();
    store
        .append_reflog(&main, &ReflogEntry::new(None, id(1), who.clone(), "branch: Created"))
        .unwrap();
    store
        .append_reflog(&main, &ReflogEntry::new(Some(id(1)), id(2), who, "commit: two"))
        .unwrap();

    let log = store.read_reflog(&main).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].new, id(2));
    assert!(log[1].old.is_null());

    store.create(&RefName::head(), id(2), true).unwrap();
    store.delete(&main).unwrap();
    assert!(store.read_reflog(&main).unwrap().is_empty());
    assert!(!dir.path().join("logs/refs/heads/main").exists());
}

#[test]
fn sha256_store_rejects_sha1_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesRefStore::new(dir.path(), HashAlgorithm::Sha256);
    let main = branch("main");
    let wide = ObjectId::Sha256([3; 32]);
    store.create(&main, wide, false).unwrap();
    assert_eq!(store.resolve(&main).unwrap(), wide);

    fs::write(dir.path().join("refs/heads/narrow"), format!("{}\n", id(1))).unwrap();
    assert_eq!(
        store.lookup(&branch("narrow")).unwrap_err().kind(),
        ErrorKind::CorruptObject
    );
}
