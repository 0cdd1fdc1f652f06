use code_anchor::git::test_utils::TmpRepo;
use code_anchor::git::topology::TopologicalSorter;

fn linear_repo() -> (TmpRepo, Vec<String>) {
    let repo = TmpRepo::new().unwrap();
    let mut shas = Vec::new();
    for i in 0..3 {
        repo.write_file("notes.txt", &format!("revision {}\n", i)).unwrap();
        shas.push(repo.commit_all(&format!("commit {}", i)).unwrap());
    }
    (repo, shas)
}

#[test]
fn topological_order_puts_parents_before_children() {
    let (repo, shas) = linear_repo();
    let sorter = TopologicalSorter::new(repo.path());

    let order = sorter.topological_order().unwrap();

    assert_eq!(order.len(), 3);
    for pair in shas.windows(2) {
        assert!(
            order[&pair[0]] < order[&pair[1]],
            "parent {} must sort before child {}",
            pair[0],
            pair[1]
        );
    }

    // Every parent edge respects the ordering, not just the commit chain we
    // happen to know about.
    for (sha, index) in &order {
        for parent in sorter.commit_parents(sha).unwrap() {
            assert!(order[&parent] < *index);
        }
    }
}

#[test]
fn root_commit_has_no_parents() {
    let (repo, shas) = linear_repo();
    let sorter = TopologicalSorter::new(repo.path());

    assert!(sorter.commit_parents(&shas[0]).unwrap().is_empty());
    assert_eq!(sorter.commit_parents(&shas[1]).unwrap(), vec![shas[0].clone()]);
}

#[test]
fn batch_parents_degrade_to_empty_on_bad_sha() {
    let (repo, shas) = linear_repo();
    let sorter = TopologicalSorter::new(repo.path());

    let result = sorter.batch_commit_parents(&[
        shas[2].clone(),
        "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string(),
    ]);

    assert_eq!(result.len(), 2);
    assert_eq!(result[&shas[2]], vec![shas[1].clone()]);
    assert!(result["deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"].is_empty());
}

#[test]
fn digest_is_stable_until_history_rewrites() {
    let (repo, _) = linear_repo();
    let sorter = TopologicalSorter::new(repo.path());

    let first = sorter.parent_digest().unwrap();
    let second = sorter.parent_digest().unwrap();
    assert_eq!(first, second);

    repo.write_file("notes.txt", "rewritten\n").unwrap();
    repo.amend_head("rewritten tip").unwrap();

    let after_rewrite = sorter.parent_digest().unwrap();
    assert_ne!(first, after_rewrite);
}
