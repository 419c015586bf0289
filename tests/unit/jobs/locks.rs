//! Unit tests for the per-account lock registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wingbot::jobs::AccountLocks;

#[test]
fn monitored_accounts_get_dedicated_locks() {
    let locks = AccountLocks::new(["100", "200"], 4);
    assert_eq!(locks.dedicated_count(), 2);
    assert!(Arc::ptr_eq(&locks.lock_for("100"), &locks.lock_for("100")));
    assert!(!Arc::ptr_eq(&locks.lock_for("100"), &locks.lock_for("200")));
}

#[test]
fn unknown_accounts_map_to_a_stable_stripe() {
    let locks = AccountLocks::new(Vec::<String>::new(), 8);
    assert!(Arc::ptr_eq(&locks.lock_for("999"), &locks.lock_for("999")));
}

#[tokio::test]
async fn same_account_critical_sections_never_overlap() {
    let locks = Arc::new(AccountLocks::new(["100"], 4));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let locks = locks.clone();
        let inside = inside.clone();
        let max_seen = max_seen.clone();
        handles.push(tokio::spawn(async move {
            let _guard = locks.acquire("100").await;
            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_accounts_do_not_block_each_other() {
    let locks = AccountLocks::new(["100", "200"], 4);
    let _first = locks.acquire("100").await;
    let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire("200")).await;
    assert!(second.is_ok());
}
