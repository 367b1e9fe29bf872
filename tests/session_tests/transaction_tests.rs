//! Transaction Tests
//!
//! Tests for BEGIN/COMMIT, lock acquisition and rollback.

use std::sync::Arc;

use tablekv::protocol::{encode, Message, MAX_ENCODED_LEN};
use tablekv::session::Mode;
use tablekv::{TableKvError, TableRegistry};

use crate::session_tests::{failure_text, logged_in, send};

fn registry_with(tables: &[&str]) -> Arc<TableRegistry> {
    let registry = Arc::new(TableRegistry::new());
    for name in tables {
        registry.create_table(name).unwrap();
    }
    registry
}

// =============================================================================
// BEGIN / COMMIT Tests
// =============================================================================

#[test]
fn test_commit_without_begin() {
    let registry = registry_with(&[]);
    let mut session = logged_in(&registry, "alice");

    assert_eq!(
        failure_text(send(&mut session, "COMMIT")),
        "no transaction has begun"
    );
}

#[test]
fn test_begin_twice() {
    let registry = registry_with(&[]);
    let mut session = logged_in(&registry, "alice");

    assert_eq!(send(&mut session, "BEGIN").unwrap(), Message::ok());
    assert_eq!(session.mode(), Mode::Transaction);

    assert_eq!(
        failure_text(send(&mut session, "BEGIN")),
        "transaction already in progress"
    );
    assert!(session.in_transaction());
}

#[test]
fn test_transaction_holds_locks_until_commit() {
    let registry = registry_with(&["invoices", "line_items"]);
    let mut session = logged_in(&registry, "alice");

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH 100").unwrap();
    send(&mut session, "SET invoices inv1").unwrap();
    send(&mut session, "PUSH 3").unwrap();
    send(&mut session, "SET line_items item1").unwrap();

    assert_eq!(session.locked_tables(), vec!["invoices", "line_items"]);
    let invoices = registry.find_table("invoices").unwrap();
    assert!(invoices.is_locked());

    assert_eq!(send(&mut session, "COMMIT").unwrap(), Message::ok());
    assert_eq!(session.mode(), Mode::Autocommit);
    assert!(session.locked_tables().is_empty());
    assert!(!invoices.is_locked());

    let guard = invoices.lock();
    assert_eq!(guard.get("inv1"), Some("100"));
    assert!(!guard.has_pending_changes());
}

#[test]
fn test_repeated_touch_reuses_lock() {
    let registry = registry_with(&["accounts"]);
    let mut session = logged_in(&registry, "alice");

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH 1").unwrap();
    send(&mut session, "SET accounts a").unwrap();
    send(&mut session, "GET accounts a").unwrap();
    send(&mut session, "SET accounts b").unwrap();

    assert_eq!(session.locked_tables(), vec!["accounts"]);
    send(&mut session, "COMMIT").unwrap();
}

#[test]
fn test_operation_failure_keeps_transaction_open() {
    let registry = registry_with(&["accounts"]);
    let mut session = logged_in(&registry, "alice");

    send(&mut session, "BEGIN").unwrap();
    assert_eq!(
        failure_text(send(&mut session, "GET accounts missing")),
        "key does not exist"
    );

    assert!(session.in_transaction());
    assert_eq!(session.locked_tables(), vec!["accounts"]);
}

// =============================================================================
// Lock Contention / Rollback Tests
// =============================================================================

#[test]
fn test_contended_table_fails_transaction() {
    let registry = registry_with(&["accounts"]);
    let mut alice = logged_in(&registry, "alice");
    let mut bob = logged_in(&registry, "bob");

    send(&mut alice, "BEGIN").unwrap();
    send(&mut alice, "PUSH 1").unwrap();
    send(&mut alice, "SET accounts a").unwrap();

    send(&mut bob, "BEGIN").unwrap();
    let result = send(&mut bob, "GET accounts a");
    match result {
        Err(TableKvError::FailedTransaction(msg)) => {
            assert_eq!(msg, "unable to lock table accounts")
        }
        other => panic!("Expected FailedTransaction, got {:?}", other),
    }

    // Bob is back in autocommit; Alice is untouched
    assert_eq!(bob.mode(), Mode::Autocommit);
    assert!(bob.is_logged_in());
    assert!(alice.in_transaction());
    assert_eq!(alice.locked_tables(), vec!["accounts"]);
}

#[test]
fn test_failed_transaction_restores_committed_state() {
    let registry = registry_with(&["t", "u"]);
    let mut holder = logged_in(&registry, "holder");
    let mut session = logged_in(&registry, "alice");

    // Committed baseline
    send(&mut session, "PUSH v1").unwrap();
    send(&mut session, "SET t a").unwrap();

    // Another connection's transaction holds u
    send(&mut holder, "BEGIN").unwrap();
    send(&mut holder, "PUSH x").unwrap();
    send(&mut holder, "SET u k").unwrap();

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH v2").unwrap();
    send(&mut session, "SET t a").unwrap();
    send(&mut session, "PUSH v3").unwrap();
    send(&mut session, "SET t b").unwrap();

    send(&mut session, "PUSH v4").unwrap();
    let err = send(&mut session, "SET u k").unwrap_err();
    assert!(matches!(err, TableKvError::FailedTransaction(_)));
    assert!(err.is_recoverable());

    assert!(!session.in_transaction());
    assert!(session.locked_tables().is_empty());

    let t = registry.find_table("t").unwrap();
    assert!(!t.is_locked());
    let guard = t.lock();
    assert_eq!(guard.get("a"), Some("v1"));
    assert!(!guard.has_key("b"));
    assert!(!guard.has_pending_changes());
}

#[test]
fn test_lock_failure_on_long_table_name_still_encodes() {
    let name = format!("t{}", "a".repeat(999));
    let registry = registry_with(&[name.as_str()]);
    let mut holder = logged_in(&registry, "holder");
    let mut session = logged_in(&registry, "alice");

    send(&mut holder, "BEGIN").unwrap();
    send(&mut holder, &format!("GET {} k", name)).unwrap_err();

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH 1").unwrap();
    let err = send(&mut session, &format!("SET {} k", name)).unwrap_err();
    assert!(matches!(err, TableKvError::FailedTransaction(_)));

    let reply = encode(&Message::failed(&err.to_string())).unwrap();
    assert!(reply.len() <= MAX_ENCODED_LEN);
    assert!(reply.starts_with("FAILED \"unable to lock table taaa"));
}

#[test]
fn test_table_usable_after_failed_transaction() {
    let registry = registry_with(&["t", "u"]);
    let mut holder = logged_in(&registry, "holder");
    let mut session = logged_in(&registry, "alice");

    send(&mut holder, "BEGIN").unwrap();
    send(&mut holder, "GET u k").unwrap_err();

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH 1").unwrap();
    send(&mut session, "SET t a").unwrap();
    send(&mut session, "SET u k").unwrap_err();

    // The released table can be locked by someone else now
    send(&mut holder, "PUSH 2").unwrap();
    send(&mut holder, "SET t a").unwrap();
    send(&mut holder, "COMMIT").unwrap();

    let guard = registry.find_table("t").unwrap().lock();
    assert_eq!(guard.get("a"), Some("2"));
}

#[test]
fn test_autocommit_write_is_not_undone_by_later_rollback() {
    let registry = registry_with(&["t", "u"]);
    let mut holder = logged_in(&registry, "holder");
    let mut session = logged_in(&registry, "alice");

    send(&mut session, "PUSH auto").unwrap();
    send(&mut session, "SET t a").unwrap();

    send(&mut holder, "BEGIN").unwrap();
    send(&mut holder, "GET u k").unwrap_err();

    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "GET t a").unwrap();
    send(&mut session, "GET u k").unwrap_err();

    let guard = registry.find_table("t").unwrap().lock();
    assert_eq!(guard.get("a"), Some("auto"));
}

// =============================================================================
// Session Teardown Tests
// =============================================================================

#[test]
fn test_drop_rolls_back_open_transaction() {
    let registry = registry_with(&["accounts"]);

    {
        let mut session = logged_in(&registry, "alice");
        send(&mut session, "PUSH 5").unwrap();
        send(&mut session, "SET accounts kept").unwrap();

        send(&mut session, "BEGIN").unwrap();
        send(&mut session, "PUSH 6").unwrap();
        send(&mut session, "SET accounts dropped").unwrap();
        send(&mut session, "PUSH 7").unwrap();
        send(&mut session, "SET accounts kept").unwrap();
    }

    let table = registry.find_table("accounts").unwrap();
    assert!(!table.is_locked());

    let guard = table.lock();
    assert_eq!(guard.get("kept"), Some("5"));
    assert!(!guard.has_key("dropped"));
}

#[test]
fn test_bye_mid_transaction_rolls_back_on_drop() {
    let registry = registry_with(&["accounts"]);

    let mut session = logged_in(&registry, "alice");
    send(&mut session, "BEGIN").unwrap();
    send(&mut session, "PUSH 1").unwrap();
    send(&mut session, "SET accounts a").unwrap();
    assert_eq!(send(&mut session, "BYE").unwrap(), Message::ok());
    drop(session);

    let guard = registry.find_table("accounts").unwrap().lock();
    assert!(guard.is_empty());
}

#[test]
fn test_drop_after_commit_keeps_changes() {
    let registry = registry_with(&["accounts"]);

    {
        let mut session = logged_in(&registry, "alice");
        send(&mut session, "BEGIN").unwrap();
        send(&mut session, "PUSH 1").unwrap();
        send(&mut session, "SET accounts a").unwrap();
        send(&mut session, "COMMIT").unwrap();
    }

    let guard = registry.find_table("accounts").unwrap().lock();
    assert_eq!(guard.get("a"), Some("1"));
}
