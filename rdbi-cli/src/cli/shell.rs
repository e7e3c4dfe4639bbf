// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for rdbi

use colored::Colorize;
use rustyline::{error::ReadlineError, CompletionType, Config, EditMode, Editor};
use std::path::{Path, PathBuf};

use super::commands::OutputFormat;
use super::output::ResultFormatter;
use rdbi::{Handle, Rdbi, RdbiConfig};

/// Dot commands understood by the shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Begin,
    Commit,
    /// Whole transaction, or back to the named checkpoint
    Rollback(Option<String>),
    Checkpoint(String),
    Release(String),
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse a line starting with `.`; `None` for anything else
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        let rest = line.strip_prefix('.')?;
        let mut parts = rest.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        let argument = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Some(Err(format!("Too many arguments for .{}", command)));
        }

        let named = |make: fn(String) -> ShellCommand| {
            argument
                .clone()
                .map(make)
                .ok_or_else(|| format!("Usage: .{} <name>", command))
        };

        Some(match command.as_str() {
            "begin" => Ok(ShellCommand::Begin),
            "commit" => Ok(ShellCommand::Commit),
            "rollback" => Ok(ShellCommand::Rollback(argument.clone())),
            "checkpoint" | "savepoint" => named(ShellCommand::Checkpoint),
            "release" => named(ShellCommand::Release),
            "help" => Ok(ShellCommand::Help),
            "quit" | "exit" => Ok(ShellCommand::Quit),
            other => Err(format!("Unknown command .{}, try .help", other)),
        })
    }

    fn run(&self, handle: &mut Handle) -> rdbi::Result<String> {
        match self {
            ShellCommand::Begin => handle.begin().map(|_| "Transaction started".to_string()),
            ShellCommand::Commit => handle.commit().map(|_| "Committed".to_string()),
            ShellCommand::Rollback(None) => handle.rollback().map(|_| "Rolled back".to_string()),
            ShellCommand::Rollback(Some(name)) => handle
                .rollback_to(name)
                .map(|_| format!("Rolled back to checkpoint '{}'", name)),
            ShellCommand::Checkpoint(name) => handle
                .checkpoint(name)
                .map(|_| format!("Checkpoint '{}' created", name)),
            ShellCommand::Release(name) => handle
                .release(name)
                .map(|_| format!("Checkpoint '{}' released", name)),
            ShellCommand::Help | ShellCommand::Quit => Ok(String::new()),
        }
    }
}

/// Load configuration from `--config` and the environment, with `--path` last
pub fn load_config(
    config_path: Option<&Path>,
    path: Option<PathBuf>,
) -> Result<RdbiConfig, Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(file) => RdbiConfig::from_file(file)?,
        None => RdbiConfig::default(),
    };
    let config = config.with_env_overrides()?;
    Ok(match path {
        Some(path) => config.with_database_path(path),
        None => config,
    })
}

/// Statements whose first keyword produces a result set
fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_lowercase();
    matches!(
        keyword.as_str(),
        "select" | "with" | "values" | "pragma" | "explain"
    )
}

/// Run one statement and render its outcome
pub fn run_statement(handle: &mut Handle, sql: &str, format: OutputFormat) -> rdbi::Result<String> {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    if returns_rows(sql) {
        let rows = handle.create_query(sql).fetch()?;
        Ok(ResultFormatter::format(&rows, format))
    } else {
        let count = handle.execute(sql, ())?;
        Ok(ResultFormatter::format_update(count))
    }
}

/// Handle the query command (one-off statement)
pub fn handle_query(
    config: RdbiConfig,
    sql: String,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rdbi = Rdbi::from_config(config);
    let output = rdbi.with_handle(|h| run_statement(h, &sql, format))?;
    println!("{}", output);
    Ok(())
}

/// Handle the script command; the whole script runs in one transaction
pub fn handle_script(config: RdbiConfig, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let script = std::fs::read_to_string(&file)
        .map_err(|e| format!("Unable to read script {:?}: {}", file, e))?;

    let rdbi = Rdbi::from_config(config);
    rdbi.use_transaction(|h| h.execute_script(&script))?;

    println!("{}", format!("Script {:?} executed", file).green());
    Ok(())
}

/// Handle the shell (REPL) command
pub fn handle_shell(config: RdbiConfig) -> Result<(), Box<dyn std::error::Error>> {
    let location = match &config.database.path {
        Some(path) => format!("{:?}", path),
        None => "in-memory database".to_string(),
    };
    let rdbi = Rdbi::from_config(config);
    let mut handle = rdbi.open()?;

    println!("{}", "rdbi".bold().green());
    println!("Connected to {}", location);
    println!("Type '.help' for commands, '.quit' to exit");
    println!("Multi-line statements supported - use ';' to terminate");

    let editor_config = Config::builder()
        .edit_mode(EditMode::Emacs)
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .auto_add_history(false)
        .build();

    let mut rl = Editor::<(), _>::with_config(editor_config)?;

    let history_path = ".rdbi/.sql_history.txt";
    if let Some(parent) = Path::new(history_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.load_history(history_path);

    let mut buffer = String::new();

    loop {
        let prompt = match (buffer.is_empty(), handle.is_in_transaction()) {
            (true, false) => "rdbi> ".to_string(),
            (true, true) => format!("{}> ", "rdbi*".yellow()),
            (false, _) => "  ...> ".to_string(),
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if !buffer.is_empty() {
                    buffer.clear();
                    println!("{}", "\nStatement buffer cleared".yellow());
                }
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let trimmed = line.trim();

        if buffer.is_empty() {
            if trimmed.is_empty() {
                continue;
            }
            if let Some(command) = ShellCommand::parse(trimmed) {
                rl.add_history_entry(trimmed)?;
                match command {
                    Ok(ShellCommand::Quit) => break,
                    Ok(ShellCommand::Help) => print_help(),
                    Ok(command) => match command.run(&mut handle) {
                        Ok(message) => println!("{}", message.green()),
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                    Err(message) => eprintln!("{}", message.red()),
                }
                continue;
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');

        if trimmed.ends_with(';') {
            let sql = buffer.trim().to_string();
            rl.add_history_entry(&sql)?;

            match run_statement(&mut handle, &sql, OutputFormat::Table) {
                Ok(output) => println!("{}", output),
                Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
            }
            buffer.clear();
        }
    }

    let _ = rl.save_history(history_path);

    if handle.is_in_transaction() {
        println!("{}", "Open transaction rolled back".yellow());
    }
    match handle.close() {
        Ok(()) | Err(rdbi::Error::Transaction { .. }) => {}
        Err(e) => return Err(e.into()),
    }
    println!("{}", "Goodbye!".green());
    Ok(())
}

/// Print help message
fn print_help() {
    println!("{}", "Available commands:".bold().green());
    println!("  {}  - Start a transaction", ".begin".cyan());
    println!("  {}  - Commit the transaction", ".commit".cyan());
    println!(
        "  {}  - Roll back the transaction, or back to a checkpoint",
        ".rollback [name]".cyan()
    );
    println!("  {}  - Create a named checkpoint", ".checkpoint <name>".cyan());
    println!("  {}  - Release a checkpoint", ".release <name>".cyan());
    println!("  {}  - Show this help message", ".help".cyan());
    println!("  {}  - Exit the shell", ".quit".cyan());
    println!("\n{}", "Statement syntax:".bold().green());
    println!("  Multi-line statements are supported");
    println!("  Terminate statements with semicolon (;)");
    println!("\n{}", "Examples:".bold().green());
    println!("  {}", "create table something (id integer, name varchar(50));".yellow());
    println!("  {}", "insert into something values (1, 'Tom');".yellow());
    println!("  {}", "select * from something;".yellow());
}
