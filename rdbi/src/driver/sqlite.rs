// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! SQLite driver implementation
//!
//! SQLite has no connection-level autocommit switch, so the classic contract is
//! emulated: turning autocommit off issues `BEGIN`, and `commit`/`rollback`
//! immediately open the next transaction while autocommit stays off.
//!
//! Stored procedures do not exist in SQLite either. Callable statements are
//! served by Rust procedures registered on the factory, or fall back to a SQL
//! scalar function evaluated with `SELECT name(args)`.

use super::call::{parse_call, CallArg, CallSyntax};
use super::{
    BoundValue, Connection, ConnectionFactory, DriverError, DriverResult, OutParameter, RowSet,
    Savepoint,
};
use crate::transaction::TransactionIsolationLevel;
use crate::types::{encode_array, encode_hstore};
use crate::value::SqlValue;
use parking_lot::RwLock;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::params_from_iter;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Rust implementation of a stored procedure
///
/// Receives every call argument (out-only slots arrive as NULL) and may
/// overwrite them; the returned value fills the `? =` slot.
pub type Procedure = Arc<dyn Fn(&mut [SqlValue]) -> Result<Option<SqlValue>, String> + Send + Sync>;

/// Rust implementation of a SQL scalar function
pub type ScalarFunction = Arc<dyn Fn(&[SqlValue]) -> Result<SqlValue, String> + Send + Sync>;

struct FunctionDef {
    name: String,
    arity: i32,
    function: ScalarFunction,
}

#[derive(Default)]
struct Routines {
    functions: Vec<FunctionDef>,
    procedures: HashMap<String, Procedure>,
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// Opens SQLite connections and installs registered routines on each of them
pub struct SqliteConnectionFactory {
    target: Target,
    busy_timeout: Duration,
    routines: Arc<RwLock<Routines>>,
}

impl SqliteConnectionFactory {
    /// Connections share the database file at `path`
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(Target::File(path.as_ref().to_path_buf()))
    }

    /// Every connection gets its own private in-memory database
    pub fn memory() -> Self {
        Self::new(Target::Memory)
    }

    fn new(target: Target) -> Self {
        Self {
            target,
            busy_timeout: Duration::from_millis(5000),
            routines: Arc::new(RwLock::new(Routines::default())),
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_function<F>(self, name: &str, arity: i32, function: F) -> Self
    where
        F: Fn(&[SqlValue]) -> Result<SqlValue, String> + Send + Sync + 'static,
    {
        self.register_function(name, arity, function);
        self
    }

    pub fn with_procedure<F>(self, name: &str, procedure: F) -> Self
    where
        F: Fn(&mut [SqlValue]) -> Result<Option<SqlValue>, String> + Send + Sync + 'static,
    {
        self.register_procedure(name, procedure);
        self
    }

    /// Register a scalar function; installed on connections opened afterwards.
    /// An arity of -1 accepts any number of arguments.
    pub fn register_function<F>(&self, name: &str, arity: i32, function: F)
    where
        F: Fn(&[SqlValue]) -> Result<SqlValue, String> + Send + Sync + 'static,
    {
        self.routines.write().functions.push(FunctionDef {
            name: name.to_string(),
            arity,
            function: Arc::new(function),
        });
    }

    /// Register a procedure; visible to every connection of this factory
    pub fn register_procedure<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&mut [SqlValue]) -> Result<Option<SqlValue>, String> + Send + Sync + 'static,
    {
        self.routines
            .write()
            .procedures
            .insert(name.to_uppercase(), Arc::new(procedure));
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn open(&self) -> DriverResult<Box<dyn Connection>> {
        let conn = match &self.target {
            Target::File(path) => rusqlite::Connection::open(path)?,
            Target::Memory => rusqlite::Connection::open_in_memory()?,
        };
        conn.busy_timeout(self.busy_timeout)?;

        for def in self.routines.read().functions.iter() {
            install_function(&conn, def)?;
        }

        log::debug!("Opened SQLite connection ({:?})", self.target);
        Ok(Box::new(SqliteConnection::with_routines(
            conn,
            Arc::clone(&self.routines),
        )))
    }
}

fn install_function(conn: &rusqlite::Connection, def: &FunctionDef) -> DriverResult<()> {
    let function = AssertUnwindSafe(Arc::clone(&def.function));
    conn.create_scalar_function(
        def.name.as_str(),
        def.arity,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let function: &AssertUnwindSafe<ScalarFunction> = &function;
            let args: Vec<SqlValue> = (0..ctx.len())
                .map(|i| from_sqlite(Value::from(ctx.get_raw(i))))
                .collect();
            let result = (function.0)(&args)
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            Ok(to_sqlite(&result))
        },
    )?;
    Ok(())
}

/// Connection backed by `rusqlite`
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    autocommit: bool,
    isolation: TransactionIsolationLevel,
    routines: Arc<RwLock<Routines>>,
}

impl SqliteConnection {
    /// Wrap an already open connection; no procedures are registered
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self::with_routines(conn, Arc::new(RwLock::new(Routines::default())))
    }

    fn with_routines(conn: rusqlite::Connection, routines: Arc<RwLock<Routines>>) -> Self {
        Self {
            conn,
            autocommit: true,
            isolation: TransactionIsolationLevel::Serializable,
            routines,
        }
    }

    fn begin_if_manual(&mut self) -> DriverResult<()> {
        if !self.autocommit && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn procedure(&self, name: &str) -> Option<Procedure> {
        self.routines.read().procedures.get(&name.to_uppercase()).cloned()
    }

    fn evaluate(&mut self, expression: &str, positions: &[usize], params: &[BoundValue]) -> DriverResult<SqlValue> {
        let bound = positions
            .iter()
            .map(|&position| param_at(params, position).cloned())
            .collect::<DriverResult<Vec<_>>>()?;
        let rows = self.query(&format!("SELECT {}", expression), &bound)?;
        Ok(first_value(rows))
    }

    fn call_procedure(
        &mut self,
        procedure: Procedure,
        call: &CallSyntax,
        params: &[BoundValue],
        outs: &[OutParameter],
    ) -> DriverResult<Vec<(usize, SqlValue)>> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let value = match arg {
                CallArg::Placeholder(position) => param_at(params, *position)?.value.clone(),
                CallArg::Expression { sql, positions } => self.evaluate(sql, positions, params)?,
            };
            args.push(value);
        }

        let returned = procedure(&mut args)
            .map_err(|e| DriverError::Procedure(format!("{}: {}", call.name, e)))?;

        outs.iter()
            .map(|out| {
                if call.has_return && out.position == 1 {
                    return Ok((1, returned.clone().unwrap_or(SqlValue::Null)));
                }
                call.args
                    .iter()
                    .position(|arg| matches!(arg, CallArg::Placeholder(p) if *p == out.position))
                    .map(|index| (out.position, args[index].clone()))
                    .ok_or_else(|| {
                        DriverError::Unsupported(format!(
                            "position {} is not a plain argument of {}",
                            out.position, call.name
                        ))
                    })
            })
            .collect()
    }

    fn call_function(
        &mut self,
        call: &CallSyntax,
        params: &[BoundValue],
        outs: &[OutParameter],
    ) -> DriverResult<Vec<(usize, SqlValue)>> {
        if let Some(out) = outs.iter().find(|out| !(call.has_return && out.position == 1)) {
            return Err(DriverError::Unsupported(format!(
                "{} is not a registered procedure; only the return slot can be an output, not position {}",
                call.name, out.position
            )));
        }

        let mut fragments = Vec::with_capacity(call.args.len());
        let mut bound = Vec::new();
        for arg in &call.args {
            match arg {
                CallArg::Placeholder(position) => {
                    fragments.push("?".to_string());
                    bound.push(param_at(params, *position)?.clone());
                }
                CallArg::Expression { sql, positions } => {
                    fragments.push(sql.clone());
                    for position in positions {
                        bound.push(param_at(params, *position)?.clone());
                    }
                }
            }
        }

        let sql = format!("SELECT {}({})", call.name, fragments.join(", "));
        let value = first_value(self.query(&sql, &bound)?);
        Ok(outs.iter().map(|out| (out.position, value.clone())).collect())
    }
}

impl Connection for SqliteConnection {
    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, autocommit: bool) -> DriverResult<()> {
        if autocommit == self.autocommit {
            return Ok(());
        }
        self.autocommit = autocommit;
        if autocommit {
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("COMMIT")?;
            }
            Ok(())
        } else {
            self.begin_if_manual()
        }
    }

    fn commit(&mut self) -> DriverResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.begin_if_manual()
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.begin_if_manual()
    }

    fn set_savepoint(&mut self, name: &str) -> DriverResult<Savepoint> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", quote_identifier(name)))?;
        Ok(Savepoint::new(name))
    }

    fn rollback_to_savepoint(&mut self, savepoint: &Savepoint) -> DriverResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {}",
            quote_identifier(savepoint.name())
        ))?;
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: &Savepoint) -> DriverResult<()> {
        self.conn.execute_batch(&format!(
            "RELEASE SAVEPOINT {}",
            quote_identifier(savepoint.name())
        ))?;
        Ok(())
    }

    fn transaction_isolation(&self) -> TransactionIsolationLevel {
        self.isolation
    }

    fn set_transaction_isolation(&mut self, level: TransactionIsolationLevel) -> DriverResult<()> {
        // SQLite only distinguishes dirty reads (shared cache) from serializable
        let effective = match level {
            TransactionIsolationLevel::ReadUncommitted => {
                self.conn.execute_batch("PRAGMA read_uncommitted = 1")?;
                TransactionIsolationLevel::ReadUncommitted
            }
            _ => {
                self.conn.execute_batch("PRAGMA read_uncommitted = 0")?;
                TransactionIsolationLevel::Serializable
            }
        };
        self.isolation = effective;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[BoundValue]) -> DriverResult<usize> {
        let mut stmt = self.conn.prepare(sql)?;
        let values: Vec<Value> = params.iter().map(|p| to_sqlite(&p.value)).collect();
        if stmt.column_count() == 0 {
            return Ok(stmt.execute(params_from_iter(values))?);
        }

        // Row-returning statements are stepped to completion and their rows discarded
        let readonly = stmt.readonly();
        let mut rows = stmt.query(params_from_iter(values))?;
        while rows.next()?.is_some() {}
        drop(rows);
        Ok(if readonly { 0 } else { self.conn.changes() as usize })
    }

    fn query(&mut self, sql: &str, params: &[BoundValue]) -> DriverResult<RowSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let values: Vec<Value> = params.iter().map(|p| to_sqlite(&p.value)).collect();

        let mut rows = stmt.query(params_from_iter(values))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                let value: Value = row.get(index)?;
                record.push(from_sqlite(value));
            }
            result.push(record);
        }

        Ok(RowSet {
            columns,
            rows: result,
        })
    }

    fn call(
        &mut self,
        sql: &str,
        params: &[BoundValue],
        outs: &[OutParameter],
    ) -> DriverResult<Vec<(usize, SqlValue)>> {
        let call = parse_call(sql)?;
        if call.placeholder_count() != params.len() {
            return Err(DriverError::Syntax(format!(
                "{} has {} placeholders but {} parameters were supplied",
                call.name,
                call.placeholder_count(),
                params.len()
            )));
        }

        let values = match self.procedure(&call.name) {
            Some(procedure) => self.call_procedure(procedure, &call, params, outs)?,
            None => self.call_function(&call, params, outs)?,
        };

        // Storage classes are converted to the registered type where they can be
        Ok(values
            .into_iter()
            .map(|(position, value)| match outs.iter().find(|out| out.position == position) {
                Some(out) => (position, value.clone().convert_to(out.sql_type).unwrap_or(value)),
                None => (position, value),
            })
            .collect())
    }

    fn execute_script(&mut self, sql: &str) -> DriverResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}

fn param_at(params: &[BoundValue], position: usize) -> DriverResult<&BoundValue> {
    position
        .checked_sub(1)
        .and_then(|index| params.get(index))
        .ok_or_else(|| DriverError::Syntax(format!("no parameter at position {}", position)))
}

fn first_value(rows: RowSet) -> SqlValue {
    rows.rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .unwrap_or(SqlValue::Null)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a value into SQLite storage form
pub fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Boolean(b) => Value::Integer(i64::from(*b)),
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Double(d) => Value::Real(*d),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        SqlValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SqlValue::Array(items) => Value::Text(encode_array(items)),
        SqlValue::Map(map) => Value::Text(encode_hstore(map)),
    }
}

pub fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(d) => SqlValue::Double(d),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(bytes) => SqlValue::Blob(bytes),
    }
}
