// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Handle: one live connection plus its transaction state
//!
//! A handle is created per logical unit of work. It runs statements, controls
//! transactions and named checkpoints, and attaches SQL objects. Dropping a
//! handle with an open transaction rolls that transaction back.

use crate::argument::IntoArguments;
use crate::config::RdbiConfig;
use crate::driver::Connection;
use crate::error::{Error, Result};
use crate::sql_object::SqlObject;
use crate::statement::{Call, Query, StatementContext, Update};
use crate::transaction::{
    LocalTransactionHandler, TransactionHandler, TransactionIsolationLevel, TransactionStatus,
};
use std::sync::Arc;

pub struct Handle {
    connection: Box<dyn Connection>,
    transactions: Box<dyn TransactionHandler>,
    config: Arc<RdbiConfig>,
    closed: bool,
}

impl Handle {
    /// Wrap an open connection, applying the configured default isolation
    pub fn new(connection: Box<dyn Connection>, config: Arc<RdbiConfig>) -> Result<Self> {
        let mut handle = Self {
            connection,
            transactions: Box::new(LocalTransactionHandler::new()),
            config,
            closed: false,
        };
        if let Some(level) = handle.config.transactions.default_isolation {
            handle.set_transaction_isolation(level)?;
        }
        Ok(handle)
    }

    /// Replace the transaction handler; only valid outside a transaction
    pub fn with_transaction_handler(mut self, handler: Box<dyn TransactionHandler>) -> Result<Self> {
        if self.is_in_transaction() {
            return Err(Error::transaction(
                "Cannot replace the transaction handler during a transaction",
            ));
        }
        self.transactions = handler;
        Ok(self)
    }

    pub fn config(&self) -> &RdbiConfig {
        &self.config
    }

    /// The underlying driver connection
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub(crate) fn connection_mut(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    pub(crate) fn log_statement(&self, context: &StatementContext) {
        if self.config.statements.log_statements {
            log::info!("Executing {}", context);
        } else {
            log::debug!("Executing {}", context);
        }
    }

    /// Execute a statement with positional arguments, returning rows affected
    pub fn execute(&mut self, sql: &str, arguments: impl IntoArguments) -> Result<usize> {
        self.create_update(sql).bind_all(arguments).execute()
    }

    pub fn insert(&mut self, sql: &str, arguments: impl IntoArguments) -> Result<usize> {
        self.execute(sql, arguments)
    }

    pub fn update(&mut self, sql: &str, arguments: impl IntoArguments) -> Result<usize> {
        self.execute(sql, arguments)
    }

    /// Query with positional arguments already bound
    pub fn select(&mut self, sql: &str, arguments: impl IntoArguments) -> Query<'_> {
        self.create_query(sql).bind_all(arguments)
    }

    pub fn create_update(&mut self, sql: &str) -> Update<'_> {
        Update::new(self, sql)
    }

    pub fn create_query(&mut self, sql: &str) -> Query<'_> {
        Query::new(self, sql)
    }

    pub fn create_call(&mut self, sql: &str) -> Call<'_> {
        Call::new(self, sql)
    }

    /// Run `;`-separated statements without arguments
    pub fn execute_script(&mut self, sql: &str) -> Result<()> {
        let context = StatementContext::new(sql);
        self.log_statement(&context);
        self.connection.execute_script(sql).map_err(|source| Error::Statement {
            context: Box::new(context),
            source,
        })
    }

    /// Start a transaction; nested calls join the open one
    pub fn begin(&mut self) -> Result<()> {
        self.transactions.begin(self.connection.as_mut())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.transactions.commit(self.connection.as_mut())
    }

    /// Roll back the whole transaction; a no-op outside one
    pub fn rollback(&mut self) -> Result<()> {
        self.transactions.rollback(self.connection.as_mut())
    }

    pub fn is_in_transaction(&self) -> bool {
        self.transactions.is_in_transaction(self.connection.as_ref())
    }

    /// Create a named checkpoint in the current transaction
    pub fn checkpoint(&mut self, name: &str) -> Result<()> {
        self.transactions.checkpoint(self.connection.as_mut(), name)
    }

    /// Discard a checkpoint; rolling back to it afterwards fails
    pub fn release(&mut self, name: &str) -> Result<()> {
        self.transactions.release(self.connection.as_mut(), name)
    }

    /// Undo everything after the named checkpoint, which stays usable
    pub fn rollback_to(&mut self, name: &str) -> Result<()> {
        self.transactions
            .rollback_to_checkpoint(self.connection.as_mut(), name)
    }

    pub fn transaction_isolation(&self) -> TransactionIsolationLevel {
        self.connection.transaction_isolation()
    }

    pub fn set_transaction_isolation(&mut self, level: TransactionIsolationLevel) -> Result<()> {
        if self.is_in_transaction() && level != self.transaction_isolation() {
            return Err(Error::transaction(format!(
                "Cannot change isolation level to {} inside a transaction",
                level
            )));
        }
        self.connection
            .set_transaction_isolation(level)
            .map_err(|e| Error::transaction_driver(format!("Unable to set isolation level {}", level), e))
    }

    /// Run `f` inside a transaction
    ///
    /// Commits when `f` returns `Ok`. When `f` fails the transaction is rolled
    /// back and the error is returned unchanged. When `f` marks the status
    /// rollback-only, nothing is committed and `Error::TransactionFailed` is
    /// returned instead of the callback's value. Inside an open transaction
    /// the callback joins it and the outer transaction decides the outcome.
    pub fn in_transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Handle, &TransactionStatus) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let status = TransactionStatus::new();

        if self.is_in_transaction() {
            let value = f(self, &status)?;
            if status.is_rollback_only() {
                return Err(Error::TransactionFailed(
                    "Nested unit of work was marked rollback-only".to_string(),
                )
                .into());
            }
            return Ok(value);
        }

        self.begin()?;
        match f(self, &status) {
            Ok(_) if status.is_rollback_only() => {
                self.rollback()?;
                Err(Error::TransactionFailed(
                    "Transaction was marked rollback-only, nothing was committed".to_string(),
                )
                .into())
            }
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback() {
                    log::warn!(
                        "Rollback after a failed unit of work also failed: {}",
                        rollback_error
                    );
                }
                Err(e)
            }
        }
    }

    /// [`Handle::in_transaction`] for callbacks without a result or status
    pub fn use_transaction<E, F>(&mut self, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut Handle) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.in_transaction(|handle, _| f(handle))
    }

    /// [`Handle::in_transaction`] at the given isolation level; the previous
    /// level is restored afterwards
    pub fn in_transaction_with_isolation<T, E, F>(
        &mut self,
        level: TransactionIsolationLevel,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Handle, &TransactionStatus) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let previous = self.transaction_isolation();
        self.set_transaction_isolation(level)?;
        let result = self.in_transaction(f);
        if let Err(e) = self.set_transaction_isolation(previous) {
            log::warn!("Unable to restore isolation level {}: {}", previous, e);
        }
        result
    }

    /// Attach a SQL object to this handle
    pub fn attach<'h, S: SqlObject<'h>>(&'h mut self) -> S {
        S::attach(self)
    }

    /// Close the handle
    ///
    /// A transaction left open is rolled back and reported as an error.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if !self.is_in_transaction() {
            log::debug!("Handle closed");
            return Ok(());
        }

        if let Err(e) = self.rollback() {
            log::warn!("Rollback while closing handle failed: {}", e);
        }
        Err(Error::transaction(
            "Improperly closed handle: an open transaction was rolled back",
        ))
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.closed || !self.is_in_transaction() {
            return;
        }
        log::warn!("Handle dropped inside an open transaction, rolling back");
        if let Err(e) = self.rollback() {
            log::warn!("Rollback of abandoned transaction failed: {}", e);
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("in_transaction", &self.is_in_transaction())
            .field("isolation", &self.transaction_isolation())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConnectionFactory, SqliteConnectionFactory};

    fn open() -> Handle {
        let connection = SqliteConnectionFactory::memory().open().unwrap();
        let mut handle = Handle::new(connection, Arc::new(RdbiConfig::default())).unwrap();
        handle
            .execute_script("CREATE TABLE something (id INTEGER PRIMARY KEY, name VARCHAR(50))")
            .unwrap();
        handle
    }

    fn count(handle: &mut Handle) -> i64 {
        handle
            .create_query("select count(*) from something")
            .map_to::<i64>()
            .find_only()
            .unwrap()
    }

    #[test]
    fn test_execute_accepts_statements_returning_rows() {
        let mut h = open();
        assert_eq!(h.execute("select 1", ()).unwrap(), 0);
        assert_eq!(
            h.execute("insert into something (id, name) values (?, ?)", (1, "Tom"))
                .unwrap(),
            1
        );
        assert_eq!(h.execute("select * from something where id = ?", (1,)).unwrap(), 0);
        assert_eq!(count(&mut h), 1);
    }

    #[test]
    fn test_double_begin_toggles_autocommit_once() {
        let mut h = open();
        assert!(h.connection().autocommit());
        h.begin().unwrap();
        h.begin().unwrap();
        assert!(!h.connection().autocommit());
        h.commit().unwrap();
        assert!(h.connection().autocommit());
    }

    #[test]
    fn test_rollback_outside_transaction_is_noop() {
        let mut h = open();
        h.insert("insert into something (id, name) values (?, ?)", (7, "Tom"))
            .unwrap();
        h.rollback().unwrap();
        assert_eq!(count(&mut h), 1);
    }

    #[test]
    fn test_close_with_open_transaction_rolls_back() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let factory = SqliteConnectionFactory::file(file.path());
        let config = Arc::new(RdbiConfig::default());

        let mut h = Handle::new(factory.open().unwrap(), config.clone()).unwrap();
        h.execute_script("CREATE TABLE something (id INTEGER, name TEXT)").unwrap();
        h.begin().unwrap();
        h.insert("insert into something (id, name) values (?, ?)", (1, "Tom"))
            .unwrap();
        assert!(h.close().unwrap_err().is_transaction_error());

        let mut h = Handle::new(factory.open().unwrap(), config).unwrap();
        assert_eq!(count(&mut h), 0);
    }

    #[test]
    fn test_isolation_cannot_change_mid_transaction() {
        let mut h = open();
        h.begin().unwrap();
        assert!(h
            .set_transaction_isolation(TransactionIsolationLevel::ReadUncommitted)
            .is_err());
        h.rollback().unwrap();
        h.set_transaction_isolation(TransactionIsolationLevel::ReadUncommitted)
            .unwrap();
    }

    #[test]
    fn test_nested_in_transaction_joins_outer() {
        let mut h = open();
        let result: Result<()> = h.in_transaction(|h, _| {
            h.insert("insert into something (id, name) values (?, ?)", (1, "a"))?;
            h.in_transaction(|h, _| {
                assert!(h.is_in_transaction());
                h.insert("insert into something (id, name) values (?, ?)", (2, "b"))
            })?;
            Err(Error::ResultSet("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count(&mut h), 0);
    }
}
