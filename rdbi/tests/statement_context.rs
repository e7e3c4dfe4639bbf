// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Errors carry the context of the statement that produced them

#[path = "testutils/mod.rs"]
mod testutils;

use rdbi::Error;
use testutils::DbFixture;

#[test]
fn test_statement_error_exposes_raw_sql() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let err = h.insert("WOOF", (7, "Tom")).unwrap_err();
    assert!(matches!(err, Error::Statement { .. }));
    let context = err.statement_context().expect("statement error without context");
    assert_eq!(context.raw_sql(), "WOOF");
}

#[test]
fn test_context_lists_bound_arguments() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let err = h
        .create_update("insert into nowhere (id, name) values (:id, :name)")
        .bind("id", 1)
        .bind("name", "Tom")
        .execute()
        .unwrap_err();

    let context = err.statement_context().expect("statement error without context");
    assert_eq!(
        context.raw_sql(),
        "insert into nowhere (id, name) values (:id, :name)"
    );
    assert_eq!(
        context.rewritten_sql(),
        Some("insert into nowhere (id, name) values (?, ?)")
    );
    let binding = context.binding().expect("binding missing from context");
    assert!(binding.contains("id:1"));
    assert!(binding.contains("name:'Tom'"));
}

#[test]
fn test_missing_named_argument_is_a_binding_error() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let err = h
        .create_update("insert into something (id, name) values (:id, :name)")
        .bind("id", 1)
        .execute()
        .unwrap_err();

    assert!(matches!(err, Error::Binding { .. }));
    assert!(err.to_string().contains("name"));
}

#[test]
fn test_unused_named_argument_is_rejected() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let err = h
        .create_update("insert into something (id, name) values (:id, :name)")
        .bind("id", 1)
        .bind("name", "Tom")
        .bind("nickname", "Tommy")
        .execute()
        .unwrap_err();

    assert!(matches!(err, Error::Binding { .. }));
}

#[test]
fn test_negative_position_is_a_binding_error() {
    let db = DbFixture::new();
    let mut h = db.open_handle();

    let err = h
        .create_update("select 1")
        .bind(-1, 5)
        .bind_all((1,))
        .execute()
        .unwrap_err();
    assert!(matches!(err, Error::Binding { .. }));
    assert_eq!(err.statement_context().map(|c| c.raw_sql()), Some("select 1"));

    let err = h
        .create_call("? = CALL abs(?)")
        .register_out_parameter(-1, rdbi::SqlType::BigInt)
        .bind(1, 5)
        .invoke()
        .unwrap_err();
    assert!(matches!(err, Error::Binding { .. }));
}
