// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for rdbi

use crate::driver::DriverError;
use crate::statement::StatementContext;
use thiserror::Error;

/// Result type alias for rdbi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rdbi operations
#[derive(Error, Debug)]
pub enum Error {
    /// Opening or talking to the connection outside of a statement failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// The driver rejected a statement; carries the SQL as it was given
    #[error("Statement error: {source} [{context}]")]
    Statement {
        context: Box<StatementContext>,
        #[source]
        source: DriverError,
    },

    /// Parameters could not be matched to the statement's placeholders
    #[error("Binding error: {message} [{context}]")]
    Binding {
        message: String,
        context: Box<StatementContext>,
    },

    /// Invalid transaction or checkpoint operation
    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<DriverError>,
    },

    /// A unit of work was marked rollback-only and nothing was committed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Value could not be converted to the requested type
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// Result set did not have the expected shape
    #[error("Result set error: {0}")]
    ResultSet(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn transaction(message: impl Into<String>) -> Self {
        Error::Transaction {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn transaction_driver(message: impl Into<String>, source: DriverError) -> Self {
        Error::Transaction {
            message: message.into(),
            source: Some(source),
        }
    }

    pub(crate) fn connection(message: impl Into<String>, source: DriverError) -> Self {
        Error::Connection {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Statement context for statement and binding errors
    pub fn statement_context(&self) -> Option<&StatementContext> {
        match self {
            Error::Statement { context, .. } | Error::Binding { context, .. } => Some(context.as_ref()),
            _ => None,
        }
    }

    /// True for `Transaction` and `TransactionFailed`
    pub fn is_transaction_error(&self) -> bool {
        matches!(self, Error::Transaction { .. } | Error::TransactionFailed(_))
    }
}
