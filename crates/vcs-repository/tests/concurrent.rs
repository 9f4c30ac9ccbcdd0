mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{commit, repo, sig, stage};
use vcs_repository::{ErrorKind, Repository};

const THREADS: usize = 6;

#[test]
fn one_stale_expectation_has_one_winner() {
    let (dir, repo) = repo();
    stage(&repo, "a.txt", "a\n");
    let base = commit(&repo, "base\n");
    let tree = repo.find_commit(&base).unwrap().tree;
    let candidates: Vec<_> = (0..THREADS)
        .map(|n| {
            repo.create_commit(None, &sig(), &sig(), format!("c{n}\n"), &tree, &[base])
                .unwrap()
        })
        .collect();
    repo.create_branch("race", &base, false).unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = candidates
        .iter()
        .map(|&candidate| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let repo = Repository::open(&path).unwrap();
                barrier.wait();
                repo.update_reference("refs/heads/race", &candidate, Some(&base), "race")
                    .map(|_| candidate)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "{results:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), ErrorKind::Modified | ErrorKind::Locked),
            "unexpected error: {err}"
        );
    }
    assert_eq!(repo.revparse_single("race").unwrap(), *winners[0]);
    assert_eq!(repo.reflog("refs/heads/race").unwrap().len(), 2);
}

#[test]
fn parallel_staging_of_distinct_objects() {
    let (_dir, repo) = repo();
    let repo = Arc::new(repo);
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                repo.odb().write_blob(format!("blob {n}\n").as_bytes())
            })
        })
        .collect();

    for handle in handles {
        let id = handle.join().unwrap().unwrap();
        assert!(repo.odb().exists(&id));
    }
}
