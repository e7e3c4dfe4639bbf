// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for rdbi
//!
//! Provides one-off statement execution, script execution in a single
//! transaction, and an interactive SQL shell with transaction commands.

pub mod commands;
pub mod output;
pub mod shell;

pub use commands::{Cli, Commands};
pub use shell::{handle_query, handle_script, handle_shell, load_config};
