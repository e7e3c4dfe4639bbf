// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Statements created from a handle
//!
//! - [`Update`]: inserts, updates, deletes and DDL
//! - [`Query`]: result-producing statements, mapped through a row mapper
//! - [`Call`]: callable statements returning [`OutParameters`]
//!
//! All three accept positional (0-based) and named arguments. Driver errors
//! are reported as [`Error::Statement`] carrying a [`StatementContext`].

use crate::argument::{Binding, IntoArgument, IntoArguments, ParamKey};
use crate::driver::{BoundValue, DriverError, OutParameter, RowSet};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::mapper::{BeanMapper, ColumnMapper, FromSqlValue, Row, RowMapper};
use crate::rewriter::{parse_sql, ParsedSql};
use crate::value::{parse_timestamp, SqlType, SqlValue};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

/// What was executed: the SQL as given, as sent, and the bound arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementContext {
    raw_sql: String,
    rewritten_sql: Option<String>,
    binding: Option<String>,
}

impl StatementContext {
    pub fn new(raw_sql: impl Into<String>) -> Self {
        Self {
            raw_sql: raw_sql.into(),
            rewritten_sql: None,
            binding: None,
        }
    }

    /// The statement text exactly as the caller supplied it
    pub fn raw_sql(&self) -> &str {
        &self.raw_sql
    }

    pub fn rewritten_sql(&self) -> Option<&str> {
        self.rewritten_sql.as_deref()
    }

    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    fn with_rewritten(mut self, sql: &str) -> Self {
        self.rewritten_sql = Some(sql.to_string());
        self
    }

    fn with_binding(mut self, binding: &Binding) -> Self {
        self.binding = Some(binding.to_string());
        self
    }
}

impl fmt::Display for StatementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "statement:[{}]", self.raw_sql)?;
        if let Some(rewritten) = &self.rewritten_sql {
            write!(f, ", rewritten:[{}]", rewritten)?;
        }
        if let Some(binding) = &self.binding {
            write!(f, ", arguments:{}", binding)?;
        }
        Ok(())
    }
}

/// SQL text and arguments shared by every statement kind
struct StatementCore<'h> {
    handle: &'h mut Handle,
    sql: String,
    binding: Binding,
}

struct Prepared {
    parsed: ParsedSql,
    context: StatementContext,
    params: Vec<BoundValue>,
}

impl<'h> StatementCore<'h> {
    fn new(handle: &'h mut Handle, sql: &str) -> Self {
        Self {
            handle,
            sql: sql.to_string(),
            binding: Binding::new(),
        }
    }

    fn bind(&mut self, key: ParamKey, value: impl IntoArgument) {
        self.binding.add(key, value.into_argument());
    }

    fn prepare_with<F>(&self, out_slots: F) -> Result<(Prepared, Vec<(usize, SqlType)>)>
    where
        F: FnOnce(&ParsedSql, &StatementContext) -> Result<Vec<(usize, SqlType)>>,
    {
        let context = StatementContext::new(&self.sql);
        let parsed = parse_sql(&self.sql).map_err(|message| Error::Binding {
            message,
            context: Box::new(context.clone()),
        })?;
        let context = context
            .with_rewritten(&parsed.sql)
            .with_binding(&self.binding);

        let unbound = out_slots(&parsed, &context)?;
        let allow_unused = self.handle.config().statements.allow_unused_bindings;
        let params = self.binding.resolve(&parsed, &context, allow_unused, &unbound)?;
        self.handle.log_statement(&context);

        Ok((
            Prepared {
                parsed,
                context,
                params,
            },
            unbound,
        ))
    }

    fn prepare(&self) -> Result<Prepared> {
        self.prepare_with(|_, _| Ok(Vec::new())).map(|(prepared, _)| prepared)
    }

    fn execute(mut self) -> Result<usize> {
        let prepared = self.prepare()?;
        self.handle
            .connection_mut()
            .execute(&prepared.parsed.sql, &prepared.params)
            .map_err(|source| statement_error(prepared.context, source))
    }

    fn query(mut self) -> Result<RowSet> {
        let prepared = self.prepare()?;
        self.handle
            .connection_mut()
            .query(&prepared.parsed.sql, &prepared.params)
            .map_err(|source| statement_error(prepared.context, source))
    }
}

fn statement_error(context: StatementContext, source: DriverError) -> Error {
    Error::Statement {
        context: Box::new(context),
        source,
    }
}

/// Statement executed for its row count
pub struct Update<'h> {
    core: StatementCore<'h>,
}

impl<'h> Update<'h> {
    pub(crate) fn new(handle: &'h mut Handle, sql: &str) -> Self {
        Self {
            core: StatementCore::new(handle, sql),
        }
    }

    pub fn bind(mut self, key: impl Into<ParamKey>, value: impl IntoArgument) -> Self {
        self.core.bind(key.into(), value);
        self
    }

    /// Bind positional arguments after any already bound
    pub fn bind_all(mut self, arguments: impl IntoArguments) -> Self {
        self.core.binding.extend_positional(arguments.into_arguments());
        self
    }

    /// Execute, returning the number of affected rows
    pub fn execute(self) -> Result<usize> {
        self.core.execute()
    }
}

/// Statement producing rows
pub struct Query<'h> {
    core: StatementCore<'h>,
}

impl<'h> Query<'h> {
    pub(crate) fn new(handle: &'h mut Handle, sql: &str) -> Self {
        Self {
            core: StatementCore::new(handle, sql),
        }
    }

    pub fn bind(mut self, key: impl Into<ParamKey>, value: impl IntoArgument) -> Self {
        self.core.bind(key.into(), value);
        self
    }

    /// Bind positional arguments after any already bound
    pub fn bind_all(mut self, arguments: impl IntoArguments) -> Self {
        self.core.binding.extend_positional(arguments.into_arguments());
        self
    }

    /// Map each row with a closure
    pub fn map<T, F>(self, f: F) -> MappedQuery<'h, T, F>
    where
        F: Fn(&Row<'_>) -> Result<T>,
    {
        self.map_with(f)
    }

    pub fn map_with<T, M: RowMapper<T>>(self, mapper: M) -> MappedQuery<'h, T, M> {
        MappedQuery {
            query: self,
            mapper,
            _marker: PhantomData,
        }
    }

    /// Map the first column of each row
    pub fn map_to<T: FromSqlValue>(self) -> MappedQuery<'h, T, ColumnMapper<T>> {
        self.map_with(ColumnMapper::first())
    }

    /// Map each row onto a deserializable struct; column names are matched
    /// case-insensitively
    pub fn map_to_bean<T: DeserializeOwned>(self) -> MappedQuery<'h, T, BeanMapper<T>> {
        self.map_with(BeanMapper::new())
    }

    /// Run the query and return the raw result
    pub fn fetch(self) -> Result<RowSet> {
        self.core.query()
    }
}

/// A query paired with its row mapper
pub struct MappedQuery<'h, T, M> {
    query: Query<'h>,
    mapper: M,
    _marker: PhantomData<fn() -> T>,
}

impl<'h, T, M: RowMapper<T>> MappedQuery<'h, T, M> {
    pub fn list(self) -> Result<Vec<T>> {
        let rows = self.query.fetch()?;
        rows.rows
            .iter()
            .map(|values| self.mapper.map(&Row::new(&rows.columns, values)))
            .collect()
    }

    /// First row, if any
    pub fn find_first(self) -> Result<Option<T>> {
        let rows = self.query.fetch()?;
        rows.rows
            .first()
            .map(|values| self.mapper.map(&Row::new(&rows.columns, values)))
            .transpose()
    }

    /// Exactly one row
    pub fn find_only(self) -> Result<T> {
        let rows = self.query.fetch()?;
        match rows.rows.as_slice() {
            [values] => self.mapper.map(&Row::new(&rows.columns, values)),
            [] => Err(Error::ResultSet("Expected one row, found none".to_string())),
            more => Err(Error::ResultSet(format!("Expected one row, found {}", more.len()))),
        }
    }
}

/// Callable statement with output parameters
pub struct Call<'h> {
    core: StatementCore<'h>,
    outs: Vec<(ParamKey, SqlType)>,
}

impl<'h> Call<'h> {
    pub(crate) fn new(handle: &'h mut Handle, sql: &str) -> Self {
        Self {
            core: StatementCore::new(handle, sql),
            outs: Vec::new(),
        }
    }

    pub fn bind(mut self, key: impl Into<ParamKey>, value: impl IntoArgument) -> Self {
        self.core.bind(key.into(), value);
        self
    }

    /// Register an output parameter by 0-based position or by name
    ///
    /// Position `n` is driver position `n + 1`, which is also the key used to
    /// read the value back from [`OutParameters`].
    pub fn register_out_parameter(mut self, key: impl Into<ParamKey>, sql_type: SqlType) -> Self {
        self.outs.push((key.into(), sql_type));
        self
    }

    pub fn invoke(mut self) -> Result<OutParameters> {
        let outs = &self.outs;
        let (prepared, slots) = self.core.prepare_with(|parsed, context| {
            outs.iter()
                .map(|(key, sql_type)| {
                    let index = match key {
                        ParamKey::Index(index) if *index < parsed.placeholder_count() => Some(*index),
                        ParamKey::Name(name) => parsed.index_of(name),
                        ParamKey::Index(_) | ParamKey::Negative(_) => None,
                    };
                    index.map(|index| (index, *sql_type)).ok_or_else(|| Error::Binding {
                        message: format!("Out parameter {} does not match any placeholder", key),
                        context: Box::new(context.clone()),
                    })
                })
                .collect()
        })?;

        let driver_outs: Vec<OutParameter> = slots
            .iter()
            .map(|(index, sql_type)| OutParameter {
                position: index + 1,
                sql_type: *sql_type,
            })
            .collect();

        let values = self
            .core
            .handle
            .connection_mut()
            .call(&prepared.parsed.sql, &prepared.params, &driver_outs)
            .map_err(|source| statement_error(prepared.context, source))?;

        let mut names = HashMap::new();
        for ((key, _), (index, _)) in self.outs.iter().zip(slots.iter()) {
            if let ParamKey::Name(name) = key {
                names.insert(name.clone(), index + 1);
            }
        }

        Ok(OutParameters {
            values: values.into_iter().collect(),
            types: slots
                .iter()
                .map(|(index, sql_type)| (index + 1, *sql_type))
                .collect(),
            names,
        })
    }
}

/// Accessor families checked against the registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Object,
    Number,
    Text,
    Date,
}

impl Access {
    fn accepts(self, sql_type: SqlType) -> bool {
        match self {
            Access::Object => true,
            Access::Number => {
                sql_type.is_numeric() || matches!(sql_type, SqlType::Varchar | SqlType::Other)
            }
            Access::Text => sql_type != SqlType::Blob,
            Access::Date => matches!(
                sql_type,
                SqlType::Date | SqlType::Timestamp | SqlType::Varchar | SqlType::Other
            ),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Access::Object => "object",
            Access::Number => "number",
            Access::Text => "string",
            Access::Date => "date",
        };
        write!(f, "{}", name)
    }
}

/// Output values of an invoked call, keyed by driver position or name
///
/// Every accessor converts the value to the type it was registered with and
/// fails when the requested type cannot be read from that registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutParameters {
    values: BTreeMap<usize, SqlValue>,
    types: BTreeMap<usize, SqlType>,
    names: HashMap<String, usize>,
}

impl OutParameters {
    fn value(&self, key: ParamKey, access: Access) -> Result<SqlValue> {
        let position = match &key {
            ParamKey::Index(position) => Some(*position),
            ParamKey::Name(name) => self.names.get(name).copied(),
            ParamKey::Negative(_) => None,
        };
        let (value, sql_type) = position
            .and_then(|position| Some((self.values.get(&position)?, *self.types.get(&position)?)))
            .ok_or_else(|| Error::TypeConversion(format!("No out parameter registered for {}", key)))?;

        if !access.accepts(sql_type) {
            return Err(Error::TypeConversion(format!(
                "Out parameter {} is registered as {} and cannot be read as {}",
                key, sql_type, access
            )));
        }
        value.clone().convert_to(sql_type).map_err(|e| {
            Error::TypeConversion(format!("Out parameter {} registered as {}: {}", key, sql_type, e))
        })
    }

    pub fn get_object(&self, key: impl Into<ParamKey>) -> Result<Option<SqlValue>> {
        let value = self.value(key.into(), Access::Object)?;
        Ok((!value.is_null()).then_some(value))
    }

    pub fn get_double(&self, key: impl Into<ParamKey>) -> Result<Option<f64>> {
        as_f64(&self.value(key.into(), Access::Number)?)
    }

    pub fn get_float(&self, key: impl Into<ParamKey>) -> Result<Option<f32>> {
        Ok(self.get_double(key)?.map(|d| d as f32))
    }

    pub fn get_long(&self, key: impl Into<ParamKey>) -> Result<Option<i64>> {
        as_i64(&self.value(key.into(), Access::Number)?)
    }

    pub fn get_int(&self, key: impl Into<ParamKey>) -> Result<Option<i32>> {
        Ok(self.get_long(key)?.map(|l| l as i32))
    }

    pub fn get_short(&self, key: impl Into<ParamKey>) -> Result<Option<i16>> {
        Ok(self.get_long(key)?.map(|l| l as i16))
    }

    pub fn get_string(&self, key: impl Into<ParamKey>) -> Result<Option<String>> {
        match self.value(key.into(), Access::Text)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s)),
            SqlValue::Blob(_) => Err(Error::TypeConversion("Cannot read blob as string".to_string())),
            other => Ok(Some(other.to_string())),
        }
    }

    pub fn get_date(&self, key: impl Into<ParamKey>) -> Result<Option<NaiveDate>> {
        match self.value(key.into(), Access::Date)? {
            SqlValue::Null => Ok(None),
            SqlValue::Date(d) => Ok(Some(d)),
            SqlValue::Timestamp(ts) => Ok(Some(ts.date())),
            SqlValue::Text(s) => parse_timestamp(&s)
                .map(|ts| Some(ts.date()))
                .ok_or_else(|| Error::TypeConversion(format!("'{}' is not a date", s))),
            other => Err(Error::TypeConversion(format!("Cannot read {} as date", other.kind()))),
        }
    }

    /// Convert through [`FromSqlValue`]
    pub fn get<T: FromSqlValue>(&self, key: impl Into<ParamKey>) -> Result<T> {
        T::from_sql_value(self.value(key.into(), Access::Object)?)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn as_f64(value: &SqlValue) -> Result<Option<f64>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Double(d) => Ok(Some(*d)),
        SqlValue::Integer(i) => Ok(Some(*i as f64)),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::TypeConversion(format!("'{}' is not numeric", s))),
        other => Err(Error::TypeConversion(format!("Cannot read {} as number", other.kind()))),
    }
}

fn as_i64(value: &SqlValue) -> Result<Option<i64>> {
    match value {
        SqlValue::Integer(i) => Ok(Some(*i)),
        SqlValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(Some(i)),
            Err(_) => Ok(as_f64(value)?.map(|d| d as i64)),
        },
        other => Ok(as_f64(other)?.map(|d| d as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outs(values: &[(usize, SqlType, SqlValue)], names: &[(&str, usize)]) -> OutParameters {
        OutParameters {
            values: values.iter().map(|(p, _, v)| (*p, v.clone())).collect(),
            types: values.iter().map(|(p, t, _)| (*p, *t)).collect(),
            names: names.iter().map(|(n, p)| (n.to_string(), *p)).collect(),
        }
    }

    #[test]
    fn test_context_display() {
        let context = StatementContext::new("select :x").with_rewritten("select ?");
        assert_eq!(context.to_string(), "statement:[select :x], rewritten:[select ?]");
        assert_eq!(context.raw_sql(), "select :x");
        assert_eq!(context.binding(), None);
    }

    #[test]
    fn test_numeric_accessors_narrow() {
        let ret = outs(&[(1, SqlType::Double, SqlValue::Double(5729.577951308232))], &[("x", 1)]);
        assert_eq!(ret.get_long(1).unwrap(), Some(5729));
        assert_eq!(ret.get_int("x").unwrap(), Some(5729));
        assert_eq!(ret.get_short(1).unwrap(), Some(5729));
        assert!((ret.get_float(1).unwrap().unwrap() - 5729.578).abs() < 0.001);
    }

    #[test]
    fn test_date_accessor_rejects_numbers_and_unknown_keys() {
        let ret = outs(&[(1, SqlType::Double, SqlValue::Double(1.5))], &[("x", 1)]);
        assert!(matches!(ret.get_date(1), Err(Error::TypeConversion(_))));
        assert!(matches!(ret.get_date(2), Err(Error::TypeConversion(_))));
        assert!(matches!(ret.get_date("y"), Err(Error::TypeConversion(_))));
        assert!(matches!(ret.get_double(ParamKey::from(-1)), Err(Error::TypeConversion(_))));
    }

    #[test]
    fn test_null_and_text_values() {
        let ret = outs(
            &[
                (1, SqlType::Varchar, SqlValue::Null),
                (2, SqlType::Varchar, SqlValue::Text("2024-02-29".to_string())),
                (3, SqlType::Varchar, SqlValue::Text("42".to_string())),
            ],
            &[],
        );
        assert_eq!(ret.get_string(1).unwrap(), None);
        assert_eq!(ret.get_object(1).unwrap(), None);
        assert_eq!(
            ret.get_date(2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(ret.get_long(3).unwrap(), Some(42));
        assert!(ret.get_double(2).is_err());
        assert_eq!(ret.get::<Option<i32>>(3).unwrap(), Some(42));
    }

    #[test]
    fn test_values_follow_registered_type() {
        let ret = outs(
            &[
                (1, SqlType::Varchar, SqlValue::Integer(5)),
                (2, SqlType::Double, SqlValue::Integer(7)),
                (3, SqlType::Date, SqlValue::Text("2024-02-29".to_string())),
                (4, SqlType::Double, SqlValue::Text("2024-02-29".to_string())),
            ],
            &[],
        );
        assert_eq!(ret.get_object(1).unwrap(), Some(SqlValue::Text("5".to_string())));
        assert_eq!(ret.get_object(2).unwrap(), Some(SqlValue::Double(7.0)));
        assert_eq!(
            ret.get_object(3).unwrap(),
            Some(SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert!(matches!(ret.get_double(3), Err(Error::TypeConversion(_))));
        assert!(matches!(ret.get_double(4), Err(Error::TypeConversion(_))));
        assert!(matches!(ret.get_date(4), Err(Error::TypeConversion(_))));
    }
}
