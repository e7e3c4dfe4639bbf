// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction control for handles
//!
//! A handle delegates begin/commit/rollback and named checkpoints to a
//! [`TransactionHandler`]. The default [`LocalTransactionHandler`] drives the
//! connection's own autocommit and savepoint primitives.

use crate::driver::{Connection, Savepoint};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl FromStr for TransactionIsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "read_uncommitted" => Ok(TransactionIsolationLevel::ReadUncommitted),
            "read_committed" => Ok(TransactionIsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(TransactionIsolationLevel::RepeatableRead),
            "serializable" => Ok(TransactionIsolationLevel::Serializable),
            _ => Err(format!("Invalid isolation level: {}", s)),
        }
    }
}

impl fmt::Display for TransactionIsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionIsolationLevel::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            TransactionIsolationLevel::ReadCommitted => write!(f, "READ COMMITTED"),
            TransactionIsolationLevel::RepeatableRead => write!(f, "REPEATABLE READ"),
            TransactionIsolationLevel::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// Status handed to unit-of-work callbacks
#[derive(Debug, Default)]
pub struct TransactionStatus {
    rollback_only: Cell<bool>,
}

impl TransactionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll back instead of committing when the callback returns
    pub fn set_rollback_only(&self) {
        self.rollback_only.set(true);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.get()
    }
}

/// Strategy for starting and ending transactions on a connection
pub trait TransactionHandler: Send {
    fn begin(&mut self, conn: &mut dyn Connection) -> Result<()>;

    fn commit(&mut self, conn: &mut dyn Connection) -> Result<()>;

    fn rollback(&mut self, conn: &mut dyn Connection) -> Result<()>;

    fn is_in_transaction(&self, conn: &dyn Connection) -> bool;

    fn checkpoint(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()>;

    fn release(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()>;

    fn rollback_to_checkpoint(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()>;
}

/// Transactions driven by the connection's autocommit flag
#[derive(Debug, Default)]
pub struct LocalTransactionHandler {
    /// Autocommit setting found by the outermost `begin`
    initial_autocommit: Option<bool>,
    depth: usize,
    checkpoints: Vec<(String, Savepoint)>,
}

impl LocalTransactionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting depth of `begin` calls; zero outside a transaction
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Checkpoint names, oldest first
    pub fn checkpoint_names(&self) -> Vec<&str> {
        self.checkpoints.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn find(&self, name: &str) -> Result<usize> {
        self.checkpoints
            .iter()
            .position(|(existing, _)| existing == name)
            .ok_or_else(|| Error::transaction(format!("Attempt to use unknown checkpoint '{}'", name)))
    }

    fn finish(&mut self, conn: &mut dyn Connection) -> Result<()> {
        let restore = self.initial_autocommit.take().unwrap_or(true);
        self.depth = 0;
        self.checkpoints.clear();
        conn.set_autocommit(restore)
            .map_err(|e| Error::transaction_driver("Failed to restore autocommit", e))
    }
}

impl TransactionHandler for LocalTransactionHandler {
    fn begin(&mut self, conn: &mut dyn Connection) -> Result<()> {
        if self.depth == 0 {
            let autocommit = conn.autocommit();
            if autocommit {
                conn.set_autocommit(false)
                    .map_err(|e| Error::transaction_driver("Failed to begin transaction", e))?;
            }
            self.initial_autocommit = Some(autocommit);
            log::debug!("Transaction started");
        }
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self, conn: &mut dyn Connection) -> Result<()> {
        if self.depth == 0 {
            log::debug!("Commit requested outside of a transaction, ignoring");
            return Ok(());
        }
        let committed = conn
            .commit()
            .map_err(|e| Error::transaction_driver("Failed to commit transaction", e));
        let restored = self.finish(conn);
        committed?;
        restored?;
        log::debug!("Transaction committed");
        Ok(())
    }

    fn rollback(&mut self, conn: &mut dyn Connection) -> Result<()> {
        if self.depth == 0 {
            log::debug!("Rollback requested outside of a transaction, ignoring");
            return Ok(());
        }
        let rolled_back = conn
            .rollback()
            .map_err(|e| Error::transaction_driver("Failed to roll back transaction", e));
        let restored = self.finish(conn);
        rolled_back?;
        restored?;
        log::debug!("Transaction rolled back");
        Ok(())
    }

    fn is_in_transaction(&self, conn: &dyn Connection) -> bool {
        self.depth > 0 || !conn.autocommit()
    }

    fn checkpoint(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::transaction(format!(
                "Cannot create checkpoint '{}' outside of a transaction",
                name
            )));
        }
        let savepoint = conn
            .set_savepoint(name)
            .map_err(|e| Error::transaction_driver(format!("Unable to create checkpoint '{}'", name), e))?;
        // Reusing a name moves the checkpoint; the driver does the same
        self.checkpoints.retain(|(existing, _)| existing != name);
        self.checkpoints.push((name.to_string(), savepoint));
        log::debug!("Checkpoint '{}' created", name);
        Ok(())
    }

    fn release(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()> {
        let index = self.find(name)?;
        conn.release_savepoint(&self.checkpoints[index].1)
            .map_err(|e| Error::transaction_driver(format!("Unable to release checkpoint '{}'", name), e))?;
        self.checkpoints.truncate(index);
        log::debug!("Checkpoint '{}' released", name);
        Ok(())
    }

    fn rollback_to_checkpoint(&mut self, conn: &mut dyn Connection, name: &str) -> Result<()> {
        let index = self.find(name)?;
        conn.rollback_to_savepoint(&self.checkpoints[index].1)
            .map_err(|e| {
                Error::transaction_driver(format!("Unable to roll back to checkpoint '{}'", name), e)
            })?;
        self.checkpoints.truncate(index + 1);
        log::debug!("Rolled back to checkpoint '{}'", name);
        Ok(())
    }
}
