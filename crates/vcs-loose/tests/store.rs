use std::fs;
use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;

use flate2::write::ZlibEncoder;
use vcs_hash::{HashAlgorithm, ObjectId};
use vcs_loose::{LooseError, LooseObjectStore};
use vcs_object::{Blob, Object, ObjectType};
use vcs_utils::ErrorKind;

fn store(algo: HashAlgorithm) -> (tempfile::TempDir, LooseObjectStore) {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    fs::create_dir_all(&objects).unwrap();
    let store = LooseObjectStore::open(&objects, algo);
    (dir, store)
}

fn overwrite(path: &std::path::Path, data: &[u8]) {
    let mut perms = fs::metadata(path).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms).unwrap();
    fs::write(path, data).unwrap();
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

#[test]
fn write_then_read_blob() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let oid = store.write_raw(ObjectType::Blob, b"hello\n").unwrap();
    assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    assert!(store.contains(&oid));
    assert!(store.object_path(&oid).ends_with("ce/013625030ba8dba906f756967f9e9ca394464a"));

    let (ty, content) = store.read_raw(&oid).unwrap().unwrap();
    assert_eq!(ty, ObjectType::Blob);
    assert_eq!(content, b"hello\n");
    assert_eq!(store.read_header(&oid).unwrap(), Some((ObjectType::Blob, 6)));
}

#[test]
fn write_is_idempotent() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let obj = Object::Blob(Blob::new(&b"same"[..]));
    let a = store.write(&obj).unwrap();
    let b = store.write(&obj).unwrap();
    assert_eq!(a, b);
    assert_eq!(store.iter().unwrap().count(), 1);
    assert_eq!(store.read(&a).unwrap(), Some(obj));
}

#[test]
fn missing_object_is_none() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let oid = ObjectId::Sha1([7; 20]);
    assert!(!store.contains(&oid));
    assert!(store.read(&oid).unwrap().is_none());
    assert!(store.read_header(&oid).unwrap().is_none());
}

#[test]
fn id_of_other_algorithm_is_rejected() {
    let (_dir, store) = store(HashAlgorithm::Sha256);
    let err = store.read(&ObjectId::Sha1([1; 20])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpec);
}

#[test]
fn substituted_content_is_corrupt() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let oid = store.write_raw(ObjectType::Blob, b"original").unwrap();
    overwrite(&store.object_path(&oid), &deflate(b"blob 8\0tampered"));

    let err = store.read(&oid).unwrap_err();
    assert!(matches!(err, LooseError::DigestMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::CorruptObject);
}

#[test]
fn undecodable_file_is_corrupt() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let oid = store.write_raw(ObjectType::Blob, b"x").unwrap();
    overwrite(&store.object_path(&oid), b"not zlib at all");
    assert_eq!(store.read(&oid).unwrap_err().kind(), ErrorKind::CorruptObject);
}

#[test]
fn iter_is_sorted_and_skips_stray_files() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let mut ids: Vec<ObjectId> = (0..20)
        .map(|i| store.write_raw(ObjectType::Blob, format!("blob {i}").as_bytes()).unwrap())
        .collect();
    ids.sort();
    fs::write(store.objects_dir().join(&ids[0].to_hex()[..2]).join("tmp_obj_x"), b"").unwrap();
    fs::create_dir_all(store.objects_dir().join("info")).unwrap();

    let listed: Vec<ObjectId> = store.iter().unwrap().map(Result::unwrap).collect();
    assert_eq!(listed, ids);
}

#[test]
fn sha256_store_round_trips_tree() {
    let (_dir, store) = store(HashAlgorithm::Sha256);
    let blob = store.write_raw(ObjectType::Blob, b"content").unwrap();
    assert_eq!(blob.algorithm(), HashAlgorithm::Sha256);
    let tree = vcs_object::Tree::from_entries(vec![vcs_object::TreeEntry::new(
        vcs_object::FileMode::Regular,
        "a.txt",
        blob,
    )])
    .unwrap();
    let tree_id = store.write(&Object::Tree(tree.clone())).unwrap();
    assert_eq!(store.read(&tree_id).unwrap(), Some(Object::Tree(tree)));
}

#[test]
fn concurrent_writers_of_one_object_all_succeed() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.write_raw(ObjectType::Blob, b"contended").unwrap()
            })
        })
        .collect();

    let ids: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    let (_, content) = store.read_raw(&ids[0]).unwrap().unwrap();
    assert_eq!(content, b"contended");
    assert_eq!(store.iter().unwrap().count(), 1);
}

#[test]
fn lookup_prefix_reads_one_fanout() {
    let (_dir, store) = store(HashAlgorithm::Sha1);
    let oid = store.write_raw(ObjectType::Blob, b"hello\n").unwrap();
    store.write_raw(ObjectType::Blob, b"other").unwrap();

    assert_eq!(store.lookup_prefix("ce01").unwrap(), vec![oid]);
    assert_eq!(store.lookup_prefix(&oid.to_hex()).unwrap(), vec![oid]);
    assert!(store.lookup_prefix("ce02").unwrap().is_empty());
    assert_eq!(store.lookup_prefix("").unwrap().len(), 2);
}
