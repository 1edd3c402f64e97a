use std::sync::Mutex;

use quit_git::{EntryMode, Repository, SortOrder};
use tempfile::TempDir;

/// `pull`/`push` authenticate through process-global environment variables
/// (`GIT_USERNAME`/`GIT_PASSWORD`, `SSH_AUTH_SOCK`); serialize the one test
/// that touches them so it doesn't race with anything else in this binary.
static CREDENTIAL_ENV_LOCK: Mutex<()> = Mutex::new(());

fn setup_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    std::process::Command::new("git")
        .args(["init", "--initial-branch=master", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    std::process::Command::new("git")
        .args(["config", "user.email", "test@test.com"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    std::process::Command::new("git")
        .args(["config", "user.name", "Test User"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let repo = Repository::open(dir.path(), false, None, false).unwrap();
    (dir, repo)
}

#[test]
fn open_repo() {
    let (_dir, repo) = setup_repo();
    assert!(repo.is_empty().unwrap());
}

#[test]
fn init_creates_new_repository() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path(), false).unwrap();
    assert!(repo.is_empty().unwrap());
    assert!(dir.path().join(".git").exists());
}

// Scenario 1: empty init + first commit.
#[test]
fn empty_init_plus_first_commit() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index
        .add("g1.nq", b"<a> <b> <c> <g> .\n", None)
        .unwrap();
    let commit_oid = index
        .commit("init", "A", "a@x", None, None, None, None)
        .unwrap();

    let revision = repo.revision(&commit_oid.to_hex()).unwrap();
    assert!(revision.parents().unwrap().is_empty());

    let node = revision.node(Some("g1.nq")).unwrap();
    assert!(node.is_file());
    assert_eq!(node.content().unwrap(), "<a> <b> <c> <g> .\n");

    let root = revision.node(None).unwrap();
    let entries = root.entries(false).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path(), "g1.nq");
}

// Scenario 2: shallow edit preserves sibling oids.
#[test]
fn shallow_edit_preserves_siblings() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("a.nq", b"a-content\n", None).unwrap();
    index.add("b.nq", b"b-content\n", None).unwrap();
    index.add("c.nq", b"c-content\n", None).unwrap();
    let base_oid = index.commit("base", "A", "a@x", None, None, None, None).unwrap();
    let base_rev = repo.revision(&base_oid.to_hex()).unwrap();
    let base_entries = base_rev.node(None).unwrap().entries(false).unwrap();

    let mut index2 = repo.index(Some(&base_oid.to_hex())).unwrap();
    index2.add("b.nq", b"b-content-v2\n", None).unwrap();
    let next_oid = index2.commit("edit b", "A", "a@x", None, None, None, None).unwrap();
    let next_rev = repo.revision(&next_oid.to_hex()).unwrap();
    let next_entries = next_rev.node(None).unwrap().entries(false).unwrap();

    let oid_for = |entries: &[quit_git::Node<'_>], name: &str| -> String {
        entries
            .iter()
            .find(|n| n.path() == name)
            .and_then(|n| n.content().ok())
            .unwrap()
    };
    assert_eq!(oid_for(&base_entries, "a.nq"), oid_for(&next_entries, "a.nq"));
    assert_eq!(oid_for(&base_entries, "c.nq"), oid_for(&next_entries, "c.nq"));
    assert_ne!(oid_for(&base_entries, "b.nq"), oid_for(&next_entries, "b.nq"));
}

// Scenario 3: nested path triggers subtree rebuild.
#[test]
fn nested_path_triggers_subtree_rebuild() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("sub/dir/x.nq", b"c1\n", None).unwrap();
    let r1_oid = index.commit("r1", "A", "a@x", None, None, None, None).unwrap();

    let mut index2 = repo.index(Some(&r1_oid.to_hex())).unwrap();
    index2.add("sub/dir/y.nq", b"c2\n", None).unwrap();
    let r2_oid = index2.commit("r2", "A", "a@x", None, None, None, None).unwrap();

    let r2 = repo.revision(&r2_oid.to_hex()).unwrap();
    let inner = r2.node(Some("sub/dir")).unwrap();
    let names: Vec<String> = inner
        .entries(false)
        .unwrap()
        .iter()
        .map(|n| n.path().rsplit('/').next().unwrap().to_owned())
        .collect();
    assert!(names.contains(&"x.nq".to_owned()));
    assert!(names.contains(&"y.nq".to_owned()));
}

// Scenario 4: property block parsing.
#[test]
fn property_block_parsing_round_trips_through_a_commit() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("f", b"x\n", None).unwrap();
    let message = "source: \"upstream\"\nticket: T42\n\nactual body line";
    let oid = index.commit(message, "A", "a@x", None, None, None, None).unwrap();

    let revision = repo.revision(&oid.to_hex()).unwrap();
    assert_eq!(revision.properties().get("source").map(String::as_str), Some("upstream"));
    assert_eq!(revision.properties().get("ticket").map(String::as_str), Some("T42"));
    assert_eq!(revision.message(), "actual body line");
}

// Scenario 5: double commit rejected.
#[test]
fn double_commit_is_rejected() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("f", b"x\n", None).unwrap();
    index.commit("first", "A", "a@x", None, None, None, None).unwrap();
    let second = index.commit("second", "A", "a@x", None, None, None, None);
    assert!(second.is_err());

    // A fresh index against the same base still works.
    let head = repo.revision("HEAD").unwrap().id();
    let mut fresh = repo.index(Some(&head.to_hex())).unwrap();
    fresh.add("g", b"y\n", None).unwrap();
    assert!(fresh.commit("third", "A", "a@x", None, None, None, None).is_ok());
}

// Scenario 6: history emits only changed revisions.
#[test]
fn history_emits_only_changed_revisions() {
    let (_dir, repo) = setup_repo();

    let mut index1 = repo.index(None).unwrap();
    index1.add("f", b"v1\n", None).unwrap();
    index1.add("other", b"a\n", None).unwrap();
    let c1 = index1.commit("c1", "A", "a@x", None, None, None, None).unwrap();

    let mut index2 = repo.index(Some(&c1.to_hex())).unwrap();
    index2.add("other", b"b\n", None).unwrap();
    let c2 = index2.commit("c2", "A", "a@x", None, None, None, None).unwrap();

    let mut index3 = repo.index(Some(&c2.to_hex())).unwrap();
    index3.add("f", b"v2\n", None).unwrap();
    let c3 = index3.commit("c3", "A", "a@x", None, None, None, None).unwrap();

    let mut index4 = repo.index(Some(&c3.to_hex())).unwrap();
    index4.add("other", b"c\n", None).unwrap();
    let c4 = index4.commit("c4", "A", "a@x", None, None, None, None).unwrap();

    let head_rev = repo.revision(&c4.to_hex()).unwrap();
    let node = head_rev.node(Some("f")).unwrap();
    let history = node.history().unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content().unwrap(), "v2\n");
    assert_eq!(history[1].content().unwrap(), "v1\n");
}

#[test]
fn remove_staged_path_is_not_found_afterward() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("a", b"1\n", None).unwrap();
    index.add("b", b"2\n", None).unwrap();
    let base = index.commit("base", "A", "a@x", None, None, None, None).unwrap();

    let mut index2 = repo.index(Some(&base.to_hex())).unwrap();
    index2.remove("a");
    let oid = index2.commit("remove a", "A", "a@x", None, None, None, None).unwrap();

    let revision = repo.revision(&oid.to_hex()).unwrap();
    assert!(revision.node(Some("a")).is_err());
    assert!(revision.node(Some("b")).is_ok());
}

#[test]
fn removing_an_unknown_path_fails_at_commit_time() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("a", b"1\n", None).unwrap();
    let base = index.commit("base", "A", "a@x", None, None, None, None).unwrap();

    let mut index2 = repo.index(Some(&base.to_hex())).unwrap();
    index2.remove("never-existed");
    assert!(index2.commit("bad removal", "A", "a@x", None, None, None, None).is_err());
}

#[test]
fn executable_mode_is_preserved() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("run.sh", b"#!/bin/sh\necho hi\n", Some(EntryMode::BlobExecutable)).unwrap();
    let oid = index.commit("exe", "A", "a@x", None, None, None, None).unwrap();
    let revision = repo.revision(&oid.to_hex()).unwrap();
    assert!(revision.node(Some("run.sh")).unwrap().is_file());
}

#[test]
fn revisions_walks_all_local_branches_without_duplicates() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("f", b"1\n", None).unwrap();
    index.commit("c1", "A", "a@x", None, None, None, None).unwrap();

    std::process::Command::new("git")
        .args(["branch", "feature"])
        .current_dir(repo.path())
        .output()
        .unwrap();

    let revisions = repo.revisions(None, SortOrder::TimeDescending).unwrap();
    assert_eq!(revisions.len(), 1);
}

#[test]
fn revision_not_found_for_unknown_spec() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("f", b"1\n", None).unwrap();
    index.commit("c1", "A", "a@x", None, None, None, None).unwrap();

    assert!(repo.revision("refs/heads/does-not-exist").is_err());
}

// Drives `push` and `pull` end to end through a real `git` subprocess
// against a shared bare "remote" on disk, the way the credential adapter's
// userpass fallback would see a plain filesystem remote: no SSH agent, no
// keypair, just GIT_USERNAME/GIT_PASSWORD so `resolve()` has something to
// pick (the remote itself is a local path and never actually checks them).
#[test]
fn pull_and_push_synchronize_two_clones_through_a_shared_remote() {
    let _lock = CREDENTIAL_ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    std::env::set_var("GIT_USERNAME", "test-user");
    std::env::set_var("GIT_PASSWORD", "test-pass");

    let origin_dir = TempDir::new().unwrap();
    std::process::Command::new("git")
        .args([
            "init",
            "--bare",
            "--initial-branch=master",
            origin_dir.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();
    let origin_path = origin_dir.path().to_str().unwrap().to_owned();

    let (repo_a_dir, repo_a) = setup_repo();
    std::process::Command::new("git")
        .args(["remote", "add", "origin", &origin_path])
        .current_dir(repo_a_dir.path())
        .output()
        .unwrap();

    let mut index = repo_a.index(None).unwrap();
    index.add("g1.nq", b"<a> <b> <c> <g> .\n", None).unwrap();
    index.commit("first", "A", "a@x", None, None, None, None).unwrap();
    repo_a.push(None, None).unwrap();

    let repo_b_dir = TempDir::new().unwrap();
    let repo_b = Repository::clone(&origin_path, repo_b_dir.path(), false).unwrap();
    let first = repo_b.revision("HEAD").unwrap();
    assert_eq!(
        first.node(Some("g1.nq")).unwrap().content().unwrap(),
        "<a> <b> <c> <g> .\n"
    );

    let mut index2 = repo_a.index(None).unwrap();
    index2.add("g2.nq", b"<d> <e> <f> <g> .\n", None).unwrap();
    index2.commit("second", "A", "a@x", None, None, None, None).unwrap();
    repo_a.push(None, None).unwrap();

    repo_b.pull(None, None).unwrap();
    let second = repo_b.revision("HEAD").unwrap();
    assert_eq!(
        second.node(Some("g2.nq")).unwrap().content().unwrap(),
        "<d> <e> <f> <g> .\n"
    );
    // The fast-forwarded clone still has the first commit's file too.
    assert_eq!(
        second.node(Some("g1.nq")).unwrap().content().unwrap(),
        "<a> <b> <c> <g> .\n"
    );

    std::env::remove_var("GIT_USERNAME");
    std::env::remove_var("GIT_PASSWORD");
}

#[test]
fn merge_and_revert_are_unsupported() {
    let (_dir, repo) = setup_repo();
    let mut index = repo.index(None).unwrap();
    index.add("f", b"1\n", None).unwrap();
    let oid = index.commit("c1", "A", "a@x", None, None, None, None).unwrap();

    assert!(repo.merge(oid).is_err());
    assert!(repo.revert(oid).is_err());
}
