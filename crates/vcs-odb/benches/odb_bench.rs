use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vcs_hash::{HashAlgorithm, Hasher};
use vcs_object::ObjectType;
use vcs_odb::ObjectDatabase;

fn bench_hash(c: &mut Criterion) {
    let data = vec![0x5au8; 16 * 1024];
    for algo in HashAlgorithm::ALL {
        c.bench_function(&format!("hash_blob_16k_{}", algo.name()), |b| {
            b.iter(|| Hasher::hash_object(algo, "blob", black_box(&data)).unwrap())
        });
    }
}

fn bench_write(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let loose = ObjectDatabase::open(dir.path().join("objects"), HashAlgorithm::Sha1);
    let memory = ObjectDatabase::in_memory(HashAlgorithm::Sha1);

    let mut n = 0u64;
    c.bench_function("write_blob_loose", |b| {
        b.iter(|| {
            n += 1;
            loose.write_raw(ObjectType::Blob, format!("bench {n}").as_bytes()).unwrap()
        })
    });
    c.bench_function("write_blob_memory", |b| {
        b.iter(|| {
            n += 1;
            memory.write_raw(ObjectType::Blob, format!("bench {n}").as_bytes()).unwrap()
        })
    });
}

fn bench_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let db = ObjectDatabase::open(dir.path().join("objects"), HashAlgorithm::Sha1);
    let id = db.write_blob(&[7u8; 4096]).unwrap();

    c.bench_function("read_verified_loose", |b| b.iter(|| db.read(black_box(&id)).unwrap()));
    c.bench_function("read_cached", |b| b.iter(|| db.read_cached(black_box(&id)).unwrap()));
}

criterion_group!(benches, bench_hash, bench_write, bench_read);
criterion_main!(benches);
