//! Stress tests for arbitration contention
//!
//! Each thread owns its own Arbiter, which opens its own lock file handle, so
//! the threads contend exactly like separate processes would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use libunirun_core::{Arbiter, InstanceRole, OsAccount, ScopeIdentity};
use tempfile::tempdir;

fn contend(dir: &std::path::Path, name: &str, contenders: usize) -> (usize, usize) {
    let dir = Arc::new(dir.to_path_buf());
    let barrier = Arc::new(Barrier::new(contenders));
    let leaders = Arc::new(AtomicUsize::new(0));
    let followers = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let dir = Arc::clone(&dir);
            let barrier = Arc::clone(&barrier);
            let leaders = Arc::clone(&leaders);
            let followers = Arc::clone(&followers);
            let name = name.to_string();

            thread::spawn(move || {
                let arbiter = Arbiter::with_account(
                    dir.as_ref().clone(),
                    OsAccount::new("tester", "localhost"),
                );
                let identity = ScopeIdentity::explicit(&name).unwrap();
                barrier.wait();

                // A won lock stays held after this arbiter is dropped
                match arbiter.claim_or_observe(&identity).unwrap().role {
                    InstanceRole::Leader => leaders.fetch_add(1, Ordering::SeqCst),
                    InstanceRole::Follower => followers.fetch_add(1, Ordering::SeqCst),
                };
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    (
        leaders.load(Ordering::SeqCst),
        followers.load(Ordering::SeqCst),
    )
}

#[test]
fn test_exactly_one_leader() {
    for contenders in [1, 2, 8, 16] {
        let dir = tempdir().unwrap();
        let (leaders, followers) = contend(dir.path(), "app-X", contenders);
        assert_eq!(leaders, 1, "{} contenders", contenders);
        assert_eq!(followers, contenders - 1, "{} contenders", contenders);
    }
}

#[test]
fn test_scopes_are_independent() {
    let dir = tempdir().unwrap();
    let x = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("tester", "localhost"));
    let y = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("tester", "localhost"));

    let x_role = x
        .claim_or_observe(&ScopeIdentity::explicit("app-X").unwrap())
        .unwrap()
        .role;
    let y_role = y
        .claim_or_observe(&ScopeIdentity::explicit("app-Y").unwrap())
        .unwrap()
        .role;

    assert_eq!(x_role, InstanceRole::Leader);
    assert_eq!(y_role, InstanceRole::Leader);
}

#[test]
fn test_escaped_names_are_independent() {
    let dir = tempdir().unwrap();
    for (first, second) in [("café", "cafè"), ("org/app", "org_app"), ("a b", "a_b")] {
        let a = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("tester", "localhost"));
        let b = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("tester", "localhost"));

        let a_role = a.claim_or_observe(&ScopeIdentity::explicit(first).unwrap()).unwrap().role;
        let b_role = b.claim_or_observe(&ScopeIdentity::explicit(second).unwrap()).unwrap().role;
        assert_eq!(a_role, InstanceRole::Leader, "{}", first);
        assert_eq!(b_role, InstanceRole::Leader, "{}", second);
    }
}

#[test]
fn test_users_are_independent() {
    let dir = tempdir().unwrap();
    let alice = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("alice", "host"));
    let bob = Arbiter::with_account(dir.path().to_path_buf(), OsAccount::new("bob", "host"));
    let id = ScopeIdentity::explicit("app-X").unwrap();

    assert!(alice.claim_or_observe(&id).unwrap().role.is_leader());
    assert!(bob.claim_or_observe(&id).unwrap().role.is_leader());
}

#[test]
fn test_concurrent_calls_share_one_decision() {
    let dir = tempdir().unwrap();
    let arbiter = Arc::new(Arbiter::with_account(
        dir.path().to_path_buf(),
        OsAccount::new("tester", "localhost"),
    ));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let arbiter = Arc::clone(&arbiter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                arbiter
                    .claim_or_observe(&ScopeIdentity::explicit("app-X").unwrap())
                    .unwrap()
                    .role
            })
        })
        .collect();

    let roles: Vec<InstanceRole> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(roles.iter().all(|r| *r == InstanceRole::Leader));
    assert_eq!(arbiter.claim_attempts(), 1);
}
