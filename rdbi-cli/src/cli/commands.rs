// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command definitions for rdbi

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Info, warnings, and errors
    Info,
    /// Debug messages and above (verbose)
    Debug,
    /// All messages including trace (very verbose)
    Trace,
    /// Disable all logging
    Off,
}

impl LogLevel {
    /// Convert to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// rdbi CLI - fluent SQL handles from the shell
#[derive(Parser)]
#[command(name = "rdbi")]
#[command(about = "rdbi - run SQL with transactions and checkpoints against SQLite")]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace, off)
    #[arg(short = 'l', long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Verbose mode (equivalent to --log-level debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show detailed version information
    Version,

    /// Execute a single SQL statement
    Query {
        /// The SQL statement to execute
        sql: String,

        /// Database file (in-memory when omitted and not configured)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Execute a SQL script in one transaction
    Script {
        /// Script file
        file: PathBuf,

        /// Database file (in-memory when omitted and not configured)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Interactive SQL shell (REPL)
    Shell {
        /// Database file (in-memory when omitted and not configured)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::try_parse_from([
            "rdbi", "-v", "query", "select 1", "--path", "test.db", "--format", "json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Query { sql, path, format } => {
                assert_eq!(sql, "select 1");
                assert_eq!(path, Some(PathBuf::from("test.db")));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
    }
}
