// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Entry point: opens handles from a connection factory

use crate::config::{DatabaseConfig, RdbiConfig};
use crate::driver::{ConnectionFactory, SqliteConnectionFactory};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::transaction::TransactionStatus;
use std::sync::Arc;

struct RdbiInner {
    factory: Box<dyn ConnectionFactory>,
    config: Arc<RdbiConfig>,
}

/// Shared factory for handles; cheap to clone
#[derive(Clone)]
pub struct Rdbi {
    inner: Arc<RdbiInner>,
}

impl Rdbi {
    pub fn new(factory: impl ConnectionFactory + 'static) -> Self {
        Self::with_config(factory, RdbiConfig::default())
    }

    pub fn with_config(factory: impl ConnectionFactory + 'static, config: RdbiConfig) -> Self {
        Self {
            inner: Arc::new(RdbiInner {
                factory: Box::new(factory),
                config: Arc::new(config),
            }),
        }
    }

    /// SQLite database described by `config.database`
    pub fn from_config(config: RdbiConfig) -> Self {
        let factory = sqlite_factory(&config.database);
        Self::with_config(factory, config)
    }

    pub fn config(&self) -> &RdbiConfig {
        &self.inner.config
    }

    /// Open a handle on a fresh connection
    pub fn open(&self) -> Result<Handle> {
        let connection = self
            .inner
            .factory
            .open()
            .map_err(|e| Error::connection("Unable to open connection", e))?;
        Handle::new(connection, Arc::clone(&self.inner.config))
    }

    /// Open a handle, run `f` and close the handle
    pub fn with_handle<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Handle) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut handle = self.open()?;
        let result = f(&mut handle);
        let closed = handle.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Open a handle and run `f` in a transaction on it
    pub fn in_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Handle, &TransactionStatus) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.with_handle(|handle| handle.in_transaction(f))
    }

    pub fn use_transaction<E, F>(&self, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut Handle) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.with_handle(|handle| handle.use_transaction(f))
    }
}

impl std::fmt::Debug for Rdbi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rdbi")
            .field("config", &self.inner.config)
            .finish()
    }
}

fn sqlite_factory(database: &DatabaseConfig) -> SqliteConnectionFactory {
    let factory = match &database.path {
        Some(path) => SqliteConnectionFactory::file(path),
        None => SqliteConnectionFactory::memory(),
    };
    factory.with_busy_timeout(database.busy_timeout())
}
