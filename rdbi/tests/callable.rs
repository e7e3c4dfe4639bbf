// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Callable statements and output parameters
//!
//! Out parameters are registered by 0-based position and read back by their
//! 1-based driver position.

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::NaiveDate;
use rdbi::{Error, SqlType, SqlValue, SqliteConnectionFactory};
use testutils::DbFixture;

fn fixture() -> DbFixture {
    DbFixture::with_factory(|path| {
        SqliteConnectionFactory::file(path)
            .with_function("TO_DEGREES", 1, |args| match args.first() {
                Some(SqlValue::Double(d)) => Ok(SqlValue::Double(d.to_degrees())),
                Some(SqlValue::Integer(i)) => Ok(SqlValue::Double((*i as f64).to_degrees())),
                Some(SqlValue::Null) | None => Ok(SqlValue::Null),
                Some(other) => Err(format!("TO_DEGREES expects a number, got {}", other.kind())),
            })
            .with_function("HALF", 1, |args| match args.first() {
                Some(SqlValue::Integer(i)) => Ok(SqlValue::Integer(i / 2)),
                other => Err(format!("HALF expects an integer, got {:?}", other)),
            })
            .with_function("TODAY", 0, |_| Ok(SqlValue::Text("2024-02-29".to_string())))
            .with_procedure("TEST_PROCEDURE", |args| {
                if let [input, output] = args {
                    *output = input.clone();
                    Ok(None)
                } else {
                    Err("TEST_PROCEDURE takes two arguments".to_string())
                }
            })
    })
}

const EXPECTED_DEGREES: f64 = 5729.5779513082325;

#[test]
fn test_statement() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("? = CALL TO_DEGREES(?)")
        .register_out_parameter(0, SqlType::Double)
        .bind(1, 100.0)
        .invoke()
        .expect("call failed");

    let degrees = ret.get_double(1).unwrap().unwrap();
    assert!((degrees - EXPECTED_DEGREES).abs() < 1e-9);
    assert_eq!(ret.get_long(1).unwrap(), Some(5729));
    assert_eq!(ret.get_short(1).unwrap(), Some(5729));
    assert_eq!(ret.get_int(1).unwrap(), Some(5729));
    assert!((ret.get_float(1).unwrap().unwrap() - 5729.578f32).abs() < 0.01);

    assert!(matches!(ret.get_date(1), Err(Error::TypeConversion(_))));
    assert!(matches!(ret.get_date(2), Err(Error::TypeConversion(_))));
}

#[test]
fn test_statement_with_named_param() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call(":x = CALL TO_DEGREES(:y)")
        .register_out_parameter("x", SqlType::Double)
        .bind("y", 100.0)
        .invoke()
        .expect("call failed");

    let degrees = ret.get_double("x").unwrap().unwrap();
    assert!((degrees - EXPECTED_DEGREES).abs() < 1e-9);
    assert_eq!(ret.get_long("x").unwrap(), Some(5729));
    assert_eq!(ret.get_short("x").unwrap(), Some(5729));
    assert_eq!(ret.get_int("x").unwrap(), Some(5729));
    assert!((ret.get_float("x").unwrap().unwrap() - 5729.578f32).abs() < 0.01);

    assert!(ret.get_date("x").is_err());
    assert!(ret.get_date("y").is_err());
}

#[test]
fn test_with_null_return() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("CALL TEST_PROCEDURE(?, ?)")
        .bind(0, None::<String>)
        .register_out_parameter(1, SqlType::Varchar)
        .invoke()
        .expect("call failed");

    assert_eq!(ret.get_string(2).unwrap(), None);
    assert_eq!(ret.get_object(2).unwrap(), None);
}

#[test]
fn test_with_null_return_with_named_param() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("CALL TEST_PROCEDURE(:x, :y)")
        .bind("x", None::<String>)
        .register_out_parameter("y", SqlType::Varchar)
        .invoke()
        .expect("call failed");

    assert_eq!(ret.get_string("y").unwrap(), None);
}

#[test]
fn test_procedure_passes_value_through() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("{CALL TEST_PROCEDURE(?, ?)}")
        .bind(0, "hello")
        .register_out_parameter(1, SqlType::Varchar)
        .invoke()
        .expect("call failed");

    assert_eq!(ret.get_string(2).unwrap(), Some("hello".to_string()));
    assert_eq!(ret.len(), 1);
}

#[test]
fn test_unknown_out_parameter_name() {
    let db = fixture();
    let mut h = db.open_handle();

    let err = h
        .create_call(":x = CALL TO_DEGREES(:y)")
        .register_out_parameter("z", SqlType::Double)
        .bind("y", 1.0)
        .invoke()
        .unwrap_err();

    assert!(matches!(err, Error::Binding { .. }));
    assert_eq!(
        err.statement_context().map(|c| c.raw_sql()),
        Some(":x = CALL TO_DEGREES(:y)")
    );
}

#[test]
fn test_out_value_takes_registered_type() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("? = CALL HALF(?)")
        .register_out_parameter(0, SqlType::Varchar)
        .bind(1, 10)
        .invoke()
        .unwrap();
    assert_eq!(ret.get_object(1).unwrap(), Some(SqlValue::Text("5".to_string())));
    assert_eq!(ret.get_string(1).unwrap(), Some("5".to_string()));
    assert_eq!(ret.get_long(1).unwrap(), Some(5));

    let ret = h
        .create_call("? = CALL TO_DEGREES(?)")
        .register_out_parameter(0, SqlType::BigInt)
        .bind(1, 100.0)
        .invoke()
        .unwrap();
    assert_eq!(ret.get_object(1).unwrap(), Some(SqlValue::Integer(5729)));
    assert_eq!(ret.get_double(1).unwrap(), Some(5729.0));
}

#[test]
fn test_accessor_must_match_registered_type() {
    let db = fixture();
    let mut h = db.open_handle();

    let ret = h
        .create_call("? = CALL TODAY()")
        .register_out_parameter(0, SqlType::Double)
        .invoke()
        .unwrap();
    assert!(matches!(ret.get_double(1), Err(Error::TypeConversion(_))));
    assert!(matches!(ret.get_date(1), Err(Error::TypeConversion(_))));
    assert!(matches!(ret.get_object(1), Err(Error::TypeConversion(_))));

    let ret = h
        .create_call("? = CALL TODAY()")
        .register_out_parameter(0, SqlType::Date)
        .invoke()
        .unwrap();
    assert_eq!(ret.get_date(1).unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29));
    assert_eq!(ret.get_string(1).unwrap(), Some("2024-02-29".to_string()));
    assert!(matches!(ret.get_double(1), Err(Error::TypeConversion(_))));
    assert!(matches!(ret.get_long(1), Err(Error::TypeConversion(_))));
}
