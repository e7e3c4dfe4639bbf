// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Mapping result rows onto Rust types

use crate::error::{Error, Result};
use crate::types::{decode_elements, parse_hstore, ArrayElement, HStoreMap};
use crate::value::{Blob, SqlValue};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use uuid::Uuid;

/// Borrowed view of one result row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a [String], values: &'a [SqlValue]) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [SqlValue] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value by index or case-insensitive column name
    pub fn value(&self, index: impl ColumnIndex) -> Option<&'a SqlValue> {
        index.resolve(self.columns).and_then(|i| self.values.get(i))
    }

    pub fn get<T: FromSqlValue>(&self, index: impl ColumnIndex) -> Result<T> {
        let label = index.label();
        let value = self
            .value(index)
            .ok_or_else(|| Error::ResultSet(format!("No column {} in result", label)))?;
        T::from_sql_value(value.clone())
            .map_err(|e| Error::TypeConversion(format!("column {}: {}", label, e)))
    }

    /// Row as a JSON object keyed by lowercased column name
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .zip(self.values.iter())
            .map(|(column, value)| (column.to_lowercase(), value.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}

/// Column lookup by position or name
pub trait ColumnIndex {
    fn resolve(&self, columns: &[String]) -> Option<usize>;

    fn label(&self) -> String;
}

impl ColumnIndex for usize {
    fn resolve(&self, columns: &[String]) -> Option<usize> {
        (*self < columns.len()).then_some(*self)
    }

    fn label(&self) -> String {
        self.to_string()
    }
}

impl ColumnIndex for i32 {
    fn resolve(&self, columns: &[String]) -> Option<usize> {
        usize::try_from(*self).ok().and_then(|i| i.resolve(columns))
    }

    fn label(&self) -> String {
        self.to_string()
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, columns: &[String]) -> Option<usize> {
        columns.iter().position(|c| c.eq_ignore_ascii_case(self))
    }

    fn label(&self) -> String {
        format!("'{}'", self)
    }
}

/// Conversion from a column value
///
/// Conversion errors are reported as `Error::TypeConversion`.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> Result<Self>;
}

fn mismatch<T>(value: &SqlValue, target: &str) -> Result<T> {
    match value {
        SqlValue::Null => Err(Error::TypeConversion(format!(
            "NULL cannot be read as {}, use Option",
            target
        ))),
        other => Err(Error::TypeConversion(format!(
            "cannot read {} value {} as {}",
            other.kind(),
            other,
            target
        ))),
    }
}

macro_rules! integer_from_sql {
    ($($t:ty),*) => {
        $(
            impl FromSqlValue for $t {
                fn from_sql_value(value: SqlValue) -> Result<Self> {
                    let wide = match &value {
                        SqlValue::Integer(i) => *i,
                        SqlValue::Boolean(b) => i64::from(*b),
                        SqlValue::Text(s) => match s.trim().parse::<i64>() {
                            Ok(i) => i,
                            Err(_) => return mismatch(&value, stringify!($t)),
                        },
                        _ => return mismatch(&value, stringify!($t)),
                    };
                    <$t>::try_from(wide).map_err(|_| {
                        Error::TypeConversion(format!("{} is out of range for {}", wide, stringify!($t)))
                    })
                }
            }
        )*
    };
}

integer_from_sql!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match &value {
            SqlValue::Double(d) => Ok(*d),
            SqlValue::Integer(i) => Ok(*i as f64),
            SqlValue::Text(s) => s.trim().parse().or_else(|_| mismatch(&value, "f64")),
            _ => mismatch(&value, "f64"),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        f64::from_sql_value(value).map(|d| d as f32)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match &value {
            SqlValue::Boolean(b) => Ok(*b),
            SqlValue::Integer(i) => Ok(*i != 0),
            SqlValue::Text(s) => match s.to_lowercase().as_str() {
                "t" | "true" | "1" => Ok(true),
                "f" | "false" | "0" => Ok(false),
                _ => mismatch(&value, "bool"),
            },
            _ => mismatch(&value, "bool"),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Null | SqlValue::Blob(_) => mismatch(&value, "String"),
            other => Ok(other.to_string()),
        }
    }
}

impl FromSqlValue for Blob {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Blob(bytes) => Ok(Blob(bytes)),
            SqlValue::Text(s) => Ok(Blob(s.into_bytes())),
            other => mismatch(&other, "Blob"),
        }
    }
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim(), format).ok())
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match &value {
            SqlValue::Date(d) => Ok(*d),
            SqlValue::Timestamp(ts) => Ok(ts.date()),
            SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.date()))
                .map_or_else(|| mismatch(&value, "NaiveDate"), Ok),
            _ => mismatch(&value, "NaiveDate"),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match &value {
            SqlValue::Timestamp(ts) => Ok(*ts),
            SqlValue::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map_or_else(|| mismatch(&value, "NaiveDateTime"), Ok),
            SqlValue::Text(s) => parse_timestamp(s).map_or_else(|| mismatch(&value, "NaiveDateTime"), Ok),
            _ => mismatch(&value, "NaiveDateTime"),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match &value {
            SqlValue::Text(s) => Uuid::parse_str(s.trim()).or_else(|_| mismatch(&value, "Uuid")),
            SqlValue::Blob(bytes) => Uuid::from_slice(bytes).or_else(|_| mismatch(&value, "Uuid")),
            _ => mismatch(&value, "Uuid"),
        }
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl<T: ArrayElement> FromSqlValue for Vec<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        decode_elements(value).map_err(Error::TypeConversion)
    }
}

fn hstore_of(value: SqlValue) -> Result<HStoreMap> {
    match value {
        SqlValue::Map(map) => Ok(map),
        SqlValue::Text(text) => parse_hstore(&text).map_err(Error::TypeConversion),
        other => mismatch(&other, "hstore map"),
    }
}

fn without_nulls<C: FromIterator<(String, String)>>(map: HStoreMap) -> Result<C> {
    map.into_iter()
        .map(|(key, value)| {
            value.map(|v| (key.clone(), v)).ok_or_else(|| {
                Error::TypeConversion(format!(
                    "hstore key '{}' is NULL, map into Option<String> values instead",
                    key
                ))
            })
        })
        .collect()
}

impl FromSqlValue for HashMap<String, String> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        without_nulls(hstore_of(value)?)
    }
}

impl FromSqlValue for HashMap<String, Option<String>> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        Ok(hstore_of(value)?.into_iter().collect())
    }
}

impl FromSqlValue for BTreeMap<String, String> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        without_nulls(hstore_of(value)?)
    }
}

impl FromSqlValue for BTreeMap<String, Option<String>> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        hstore_of(value)
    }
}

/// Maps one row to a value
pub trait RowMapper<T> {
    fn map(&self, row: &Row<'_>) -> Result<T>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&Row<'_>) -> Result<T>,
{
    fn map(&self, row: &Row<'_>) -> Result<T> {
        self(row)
    }
}

/// Maps a single column, the first one by default
#[derive(Debug, Clone)]
pub struct ColumnMapper<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ColumnMapper<T> {
    pub fn first() -> Self {
        Self::at(0)
    }

    pub fn at(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }
}

impl<T: FromSqlValue> RowMapper<T> for ColumnMapper<T> {
    fn map(&self, row: &Row<'_>) -> Result<T> {
        row.get(self.index)
    }
}

/// Deserializes rows through `serde`, keyed by lowercased column name
#[derive(Debug, Clone)]
pub struct BeanMapper<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BeanMapper<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BeanMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> RowMapper<T> for BeanMapper<T> {
    fn map(&self, row: &Row<'_>) -> Result<T> {
        Ok(serde_json::from_value(row.to_json())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn columns() -> Vec<String> {
        vec!["ID".to_string(), "Name".to_string(), "tags".to_string()]
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Something {
        id: i64,
        name: Option<String>,
    }

    #[test]
    fn test_get_by_index_and_name() {
        let cols = columns();
        let values = vec![
            SqlValue::Integer(7),
            SqlValue::Text("Tom".into()),
            SqlValue::Text("{a,b}".into()),
        ];
        let row = Row::new(&cols, &values);

        assert_eq!(row.get::<i32>(0).unwrap(), 7);
        assert_eq!(row.get::<String>("name").unwrap(), "Tom");
        assert_eq!(row.get::<Vec<String>>("TAGS").unwrap(), vec!["a", "b"]);
        assert!(matches!(row.get::<i32>("missing"), Err(Error::ResultSet(_))));
        assert!(matches!(row.get::<i32>(1), Err(Error::TypeConversion(_))));
    }

    #[test]
    fn test_integer_range_checked() {
        assert!(i16::from_sql_value(SqlValue::Integer(70_000)).is_err());
        assert_eq!(u8::from_sql_value(SqlValue::Integer(255)).unwrap(), 255);
        assert!(i32::from_sql_value(SqlValue::Null).is_err());
        assert_eq!(Option::<i32>::from_sql_value(SqlValue::Null).unwrap(), None);
    }

    #[test]
    fn test_hstore_maps() {
        let text = SqlValue::Text(r#""a"=>"1", "b"=>NULL"#.to_string());
        let with_nulls = HashMap::<String, Option<String>>::from_sql_value(text.clone()).unwrap();
        assert_eq!(with_nulls.get("b"), Some(&None));
        assert!(HashMap::<String, String>::from_sql_value(text).is_err());
    }

    #[test]
    fn test_bean_mapping_ignores_column_case() {
        let cols = columns();
        let values = vec![SqlValue::Integer(1), SqlValue::Null, SqlValue::Null];
        let row = Row::new(&cols, &values);
        let bean = BeanMapper::<Something>::new().map(&row).unwrap();
        assert_eq!(bean, Something { id: 1, name: None });
    }

    #[test]
    fn test_dates_from_text() {
        let date = NaiveDate::from_sql_value(SqlValue::Text("2024-05-01".into())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let ts = NaiveDateTime::from_sql_value(SqlValue::Text("2024-05-01 10:30:00".into())).unwrap();
        assert_eq!(ts.date(), date);
    }
}
