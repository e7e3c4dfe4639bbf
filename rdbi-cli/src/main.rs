// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! rdbi command-line entry point

mod cli;

use clap::Parser;
use colored::Colorize;

use cli::{handle_query, handle_script, handle_shell, load_config, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.to_level_filter(),
        (None, true) => log::LevelFilter::Debug,
        (None, false) => log::LevelFilter::Warn,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Version => {
            println!("{} {}", "rdbi".bold().green(), env!("CARGO_PKG_VERSION"));
            println!("library {}", rdbi::VERSION);
            println!("driver  SQLite {}", sqlite_version());
            Ok(())
        }
        Commands::Query { sql, path, format } => {
            handle_query(load_config(config_path, path)?, sql, format)
        }
        Commands::Script { file, path } => handle_script(load_config(config_path, path)?, file),
        Commands::Shell { path } => handle_shell(load_config(config_path, path)?),
    }
}

fn sqlite_version() -> String {
    let rdbi = rdbi::Rdbi::new(rdbi::SqliteConnectionFactory::memory());
    rdbi.with_handle(|h| {
        h.create_query("select sqlite_version()")
            .map_to::<String>()
            .find_only()
    })
    .unwrap_or_else(|e| format!("unavailable ({})", e))
}
