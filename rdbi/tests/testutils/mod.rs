// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Shared fixture for integration tests

#![allow(dead_code)]

use rdbi::{Handle, Rdbi, RdbiConfig, SqliteConnectionFactory};
use serde::Deserialize;
use tempfile::TempDir;

/// Row of the `something` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Something {
    pub id: i64,
    pub name: Option<String>,
}

/// File-backed database that lives as long as the fixture
pub struct DbFixture {
    _dir: TempDir,
    rdbi: Rdbi,
}

impl DbFixture {
    /// Database with the `something` table
    pub fn new() -> Self {
        Self::with_factory(|path| SqliteConnectionFactory::file(path))
    }

    pub fn with_factory<F>(build: F) -> Self
    where
        F: FnOnce(&std::path::Path) -> SqliteConnectionFactory,
    {
        init_logging();
        let dir = TempDir::new().expect("Failed to create temp directory");
        let factory = build(&dir.path().join("test.db"));
        let rdbi = Rdbi::with_config(factory, RdbiConfig::default());

        let mut handle = rdbi.open().expect("Failed to open handle");
        handle
            .execute(
                "CREATE TABLE something (id INTEGER PRIMARY KEY, name VARCHAR(50))",
                (),
            )
            .expect("Failed to create table");

        Self { _dir: dir, rdbi }
    }

    pub fn rdbi(&self) -> &Rdbi {
        &self.rdbi
    }

    pub fn open_handle(&self) -> Handle {
        self.rdbi.open().expect("Failed to open handle")
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn count_something(handle: &mut Handle) -> i64 {
    handle
        .create_query("select count(*) from something")
        .map_to::<i64>()
        .find_only()
        .expect("count query failed")
}
