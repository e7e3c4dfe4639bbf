// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction and checkpoint behaviour through the handle API

#[path = "testutils/mod.rs"]
mod testutils;

use rdbi::{Error, TransactionIsolationLevel};
use std::fmt;
use testutils::{count_something, DbFixture, Something};

/// Application error that is not an rdbi error
#[derive(Debug, PartialEq)]
enum AppError {
    Io(String),
    IllegalArgument,
    Db(String),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        AppError::Db(e.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[test]
fn test_callback_returns_value() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let woot: Result<&str, Error> = h.in_transaction(|_, _| Ok("Woot!"));
    assert_eq!(woot.unwrap(), "Woot!");
}

#[test]
fn test_rollback_outside_transaction() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    h.insert("insert into something (id, name) values (?, ?)", (7, "Tom"))
        .unwrap();
    h.rollback().unwrap();
    assert_eq!(count_something(&mut h), 1);
}

#[test]
fn test_double_open() {
    let db = DbFixture::new();
    let mut h = db.open_handle();
    assert!(h.connection().autocommit());

    h.begin().unwrap();
    h.begin().unwrap();
    assert!(!h.connection().autocommit());
    h.commit().unwrap();
    assert!(h.connection().autocommit());
}

#[test]
fn test_exception_aborts_transaction() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let result: Result<(), AppError> = h.in_transaction(|handle, _| {
        handle.insert(
            "insert into something (id, name) values (:id, :name)",
            (0, "Keith"),
        )?;
        Err(AppError::Io("disk on fire".to_string()))
    });
    assert_eq!(result, Err(AppError::Io("disk on fire".to_string())));

    let rows: Vec<Something> = h
        .create_query("select * from something")
        .map_to_bean()
        .list()
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_rollback_only_aborts_transaction() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let result: Result<&str, Error> = h.in_transaction(|handle, status| {
        handle.insert(
            "insert into something (id, name) values (:id, :name)",
            (0, "Keith"),
        )?;
        status.set_rollback_only();
        Ok("Hi")
    });
    assert!(matches!(result, Err(Error::TransactionFailed(_))));

    let rows: Vec<Something> = h
        .create_query("select * from something")
        .map_to_bean()
        .list()
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_checkpoint() {
    let db = DbFixture::new();
    let mut h = db.open_handle();
    h.begin().unwrap();

    h.insert("insert into something (id, name) values (:id, :name)", (1, "Tom"))
        .unwrap();
    h.checkpoint("first").unwrap();
    h.insert("insert into something (id, name) values (:id, :name)", (2, "Martin"))
        .unwrap();
    assert_eq!(count_something(&mut h), 2);

    h.rollback_to("first").unwrap();
    assert_eq!(count_something(&mut h), 1);

    h.commit().unwrap();
    assert_eq!(count_something(&mut h), 1);
}

#[test]
fn test_release_checkpoint() {
    let db = DbFixture::new();
    let mut h = db.open_handle();
    h.begin().unwrap();
    h.checkpoint("first").unwrap();
    h.insert("insert into something (id, name) values (:id, :name)", (1, "Martin"))
        .unwrap();

    h.release("first").unwrap();

    let err = h.rollback_to("first").unwrap_err();
    assert!(matches!(err, Error::Transaction { .. }));
    h.rollback().unwrap();
    assert_eq!(count_something(&mut h), 0);
}

#[test]
fn test_checkpoint_without_transaction_fails() {
    let db = DbFixture::new();
    let mut h = db.open_handle();
    assert!(h.checkpoint("first").unwrap_err().is_transaction_error());
    assert!(h.rollback_to("never").unwrap_err().is_transaction_error());
}

#[test]
fn test_error_percolates_original() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let result: Result<(), AppError> = h.in_transaction(|_, _| Err(AppError::IllegalArgument));
    match result {
        Err(AppError::IllegalArgument) => {}
        other => panic!("expected the original error, got {:?}", other),
    }
    assert!(!h.is_in_transaction());
}

#[test]
fn test_use_transaction_commits() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    h.use_transaction(|th| -> Result<(), Error> {
        th.execute("insert into something (id, name) values (?, ?)", (1, "Brian"))?;
        th.execute("insert into something (id, name) values (?, ?)", (2, "Keith"))?;
        Ok(())
    })
    .unwrap();

    let names: Vec<String> = h
        .create_query("select name from something order by id")
        .map_to()
        .list()
        .unwrap();
    assert_eq!(names, vec!["Brian", "Keith"]);
}

#[test]
fn test_isolation_restored_after_transaction() {
    let db = DbFixture::new();
    let mut h = db.open_handle();
    let before = h.transaction_isolation();

    let level: Result<TransactionIsolationLevel, Error> = h.in_transaction_with_isolation(
        TransactionIsolationLevel::ReadUncommitted,
        |th, _| Ok(th.transaction_isolation()),
    );
    assert_eq!(level.unwrap(), TransactionIsolationLevel::ReadUncommitted);
    assert_eq!(h.transaction_isolation(), before);
}

#[test]
fn test_dropped_handle_rolls_back() {
    let db = DbFixture::new();
    {
        let mut h = db.open_handle();
        h.begin().unwrap();
        h.insert("insert into something (id, name) values (?, ?)", (1, "Tom"))
            .unwrap();
    }
    let mut h = db.open_handle();
    assert_eq!(count_something(&mut h), 0);
}

#[test]
fn test_factory_in_transaction() {
    let db = DbFixture::new();
    let inserted: usize = db
        .rdbi()
        .in_transaction(|h, _| -> Result<usize, Error> {
            h.insert("insert into something (id, name) values (?, ?)", (1, "Tom"))
        })
        .unwrap();
    assert_eq!(inserted, 1);

    let something: Something = db
        .rdbi()
        .with_handle(|h| {
            h.create_query("select id, name from something where id = :id")
                .bind("id", 1)
                .map_to_bean()
                .find_only()
        })
        .unwrap();
    assert_eq!(
        something,
        Something {
            id: 1,
            name: Some("Tom".to_string())
        }
    );
}
