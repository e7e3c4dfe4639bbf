// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Driver seam between handles and concrete databases
//!
//! This module defines:
//! - `Connection`: autocommit, savepoint, isolation and execution primitives
//! - `ConnectionFactory`: opens connections for new handles
//! - Parameter, row and savepoint types exchanged across the seam
//!
//! Positions are 1-based on this side of the seam, as drivers expect.

pub mod call;
pub mod sqlite;

use crate::transaction::TransactionIsolationLevel;
use crate::value::{SqlType, SqlValue};
use thiserror::Error;

pub use call::{parse_call, CallArg, CallSyntax};
pub use sqlite::{SqliteConnection, SqliteConnectionFactory};

/// Error type for driver operations
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Procedure error: {0}")]
    Procedure(String),
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// One bound parameter slot
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub value: SqlValue,
    pub sql_type: SqlType,
}

impl BoundValue {
    pub fn new(value: SqlValue) -> Self {
        let sql_type = value.sql_type();
        Self { value, sql_type }
    }

    pub fn null(sql_type: SqlType) -> Self {
        Self {
            value: SqlValue::Null,
            sql_type,
        }
    }
}

/// Fully materialized query result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Driver savepoint reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Output parameter registration for a callable statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutParameter {
    /// 1-based driver position
    pub position: usize,
    pub sql_type: SqlType,
}

/// A live database connection
///
/// Mirrors the classic driver contract: a connection is in autocommit mode
/// until `set_autocommit(false)`, after which work accumulates until
/// `commit` or `rollback`.
pub trait Connection: Send {
    fn autocommit(&self) -> bool;

    fn set_autocommit(&mut self, autocommit: bool) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    fn set_savepoint(&mut self, name: &str) -> DriverResult<Savepoint>;

    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> DriverResult<()>;

    fn release_savepoint(&mut self, savepoint: &Savepoint) -> DriverResult<()>;

    fn transaction_isolation(&self) -> TransactionIsolationLevel;

    fn set_transaction_isolation(&mut self, level: TransactionIsolationLevel) -> DriverResult<()>;

    /// Execute a statement, returning the number of affected rows
    ///
    /// Statements that produce rows are run to completion; their rows are
    /// discarded.
    fn execute(&mut self, sql: &str, params: &[BoundValue]) -> DriverResult<usize>;

    fn query(&mut self, sql: &str, params: &[BoundValue]) -> DriverResult<RowSet>;

    /// Invoke a callable statement and return the requested output values
    /// keyed by driver position, converted to the registered type when the
    /// driver can
    fn call(
        &mut self,
        sql: &str,
        params: &[BoundValue],
        outs: &[OutParameter],
    ) -> DriverResult<Vec<(usize, SqlValue)>>;

    /// Run several `;`-separated statements without parameters
    fn execute_script(&mut self, sql: &str) -> DriverResult<()>;
}

/// Opens connections for new handles
pub trait ConnectionFactory: Send + Sync {
    fn open(&self) -> DriverResult<Box<dyn Connection>>;
}
