// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! rdbi - fluent handles over SQL connections
//!
//! This crate wraps a driver-level connection in a [`Handle`] that offers
//! transactions with named checkpoints, statements with positional and named
//! parameters, callable statements with output parameters, typed row mapping
//! (including array and hstore values) and declarative SQL objects.
//!
//! # Quick Start
//!
//! ```no_run
//! use rdbi::{Rdbi, SqliteConnectionFactory, Error};
//!
//! # fn main() -> Result<(), Error> {
//! let rdbi = Rdbi::new(SqliteConnectionFactory::file("./app.db"));
//! let mut handle = rdbi.open()?;
//!
//! handle.execute("create table something (id integer, name varchar(50))", ())?;
//! handle.in_transaction(|h, _status| {
//!     h.insert("insert into something (id, name) values (:id, :name)", (1, "Tom"))
//! })?;
//!
//! let names: Vec<String> = handle
//!     .create_query("select name from something order by id")
//!     .map_to()
//!     .list()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`driver`] - Connection seam and the SQLite driver
//! - [`handle`] - Handles and transaction control
//! - [`statement`] - Updates, queries, calls and out parameters
//! - [`argument`] - Argument binding, including [`NullArgument`]
//! - [`mapper`] - Row mapping
//! - [`types`] - Array and hstore literal codecs
//! - [`transaction`] - Transaction handlers and isolation levels
//! - [`sql_object`] - Declarative SQL objects
//! - [`config`] - Configuration
//! - [`error`] - Error types

pub mod argument;
pub mod config;
pub mod driver;
pub mod error;
pub mod factory;
pub mod handle;
pub mod mapper;
pub mod rewriter;
pub mod sql_object;
pub mod statement;
pub mod transaction;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use argument::{
    Argument, ArrayArgument, IntoArgument, IntoArguments, NullArgument, ParamKey, ValueArgument,
};
pub use config::RdbiConfig;
pub use driver::{Connection, ConnectionFactory, SqliteConnectionFactory};
pub use error::{Error, Result};
pub use factory::Rdbi;
pub use handle::Handle;
pub use mapper::{FromSqlValue, Row, RowMapper};
pub use sql_object::SqlObject;
pub use statement::{Call, OutParameters, Query, StatementContext, Update};
pub use transaction::{TransactionIsolationLevel, TransactionStatus};
pub use value::{Blob, SqlType, SqlValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
