// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system shared by arguments, drivers and mappers
//!
//! This module provides:
//! - `SqlType`: driver-level type codes, used for typed NULLs and out parameters
//! - `SqlValue`: a single column or parameter value
//! - `Blob`: binary argument newtype

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Driver-level SQL type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Varchar,
    Date,
    Timestamp,
    Blob,
    /// One-dimensional array
    Array,
    /// Vendor specific types (hstore and friends)
    Other,
}

impl SqlType {
    /// True for the integer and floating point codes
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt | SqlType::Real | SqlType::Double
        )
    }
}

impl std::str::FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" | "bool" => Ok(SqlType::Boolean),
            "smallint" | "short" => Ok(SqlType::SmallInt),
            "integer" | "int" => Ok(SqlType::Integer),
            "bigint" | "long" => Ok(SqlType::BigInt),
            "real" | "float" => Ok(SqlType::Real),
            "double" => Ok(SqlType::Double),
            "varchar" | "text" => Ok(SqlType::Varchar),
            "date" => Ok(SqlType::Date),
            "timestamp" => Ok(SqlType::Timestamp),
            "blob" => Ok(SqlType::Blob),
            "array" => Ok(SqlType::Array),
            "other" => Ok(SqlType::Other),
            _ => Err(format!("Unknown SQL type: {}", s)),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Blob => "BLOB",
            SqlType::Array => "ARRAY",
            SqlType::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

/// A single SQL value as seen by drivers and mappers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// One-dimensional array; elements are never nested arrays
    Array(Vec<SqlValue>),
    /// Key/value map (hstore); values may be NULL
    Map(BTreeMap<String, Option<String>>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The type code a driver should use when binding this value
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Null => SqlType::Other,
            SqlValue::Boolean(_) => SqlType::Boolean,
            SqlValue::Integer(_) => SqlType::BigInt,
            SqlValue::Double(_) => SqlType::Double,
            SqlValue::Text(_) => SqlType::Varchar,
            SqlValue::Blob(_) => SqlType::Blob,
            SqlValue::Date(_) => SqlType::Date,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::Array(_) => SqlType::Array,
            SqlValue::Map(_) => SqlType::Other,
        }
    }

    /// Short name of the variant, used in conversion error messages
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Boolean(_) => "boolean",
            SqlValue::Integer(_) => "integer",
            SqlValue::Double(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Array(_) => "array",
            SqlValue::Map(_) => "map",
        }
    }

    /// Convert to the representation of `sql_type`
    ///
    /// NULL converts to every type and `Other` keeps the value as is. Integer
    /// targets truncate doubles and reject values outside their range.
    pub fn convert_to(self, sql_type: SqlType) -> Result<SqlValue, String> {
        let value = match (sql_type, self) {
            (_, SqlValue::Null) => SqlValue::Null,
            (SqlType::Other, value) => value,
            (SqlType::Boolean, SqlValue::Boolean(b)) => SqlValue::Boolean(b),
            (SqlType::Boolean, SqlValue::Integer(i)) => SqlValue::Boolean(i != 0),
            (SqlType::Boolean, SqlValue::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "1" => SqlValue::Boolean(true),
                "false" | "f" | "0" => SqlValue::Boolean(false),
                _ => return Err(format!("'{}' is not a boolean", s)),
            },
            (SqlType::SmallInt | SqlType::Integer | SqlType::BigInt, value) => {
                let i = integer_of(&value)?;
                let fits = match sql_type {
                    SqlType::SmallInt => i16::try_from(i).is_ok(),
                    SqlType::Integer => i32::try_from(i).is_ok(),
                    _ => true,
                };
                if !fits {
                    return Err(format!("{} is out of range for {}", i, sql_type));
                }
                SqlValue::Integer(i)
            }
            (SqlType::Real | SqlType::Double, value) => SqlValue::Double(double_of(&value)?),
            (SqlType::Varchar, SqlValue::Text(s)) => SqlValue::Text(s),
            (SqlType::Varchar, SqlValue::Blob(_)) => {
                return Err(format!("Cannot convert blob to {}", sql_type))
            }
            (SqlType::Varchar, value) => SqlValue::Text(value.to_string()),
            (SqlType::Date, SqlValue::Date(d)) => SqlValue::Date(d),
            (SqlType::Date, SqlValue::Timestamp(ts)) => SqlValue::Date(ts.date()),
            (SqlType::Date, SqlValue::Text(s)) => parse_timestamp(&s)
                .map(|ts| SqlValue::Date(ts.date()))
                .ok_or_else(|| format!("'{}' is not a date", s))?,
            (SqlType::Timestamp, SqlValue::Timestamp(ts)) => SqlValue::Timestamp(ts),
            (SqlType::Timestamp, SqlValue::Date(d)) => d
                .and_hms_opt(0, 0, 0)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| format!("{} has no midnight", d))?,
            (SqlType::Timestamp, SqlValue::Text(s)) => parse_timestamp(&s)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| format!("'{}' is not a timestamp", s))?,
            (SqlType::Blob, SqlValue::Blob(bytes)) => SqlValue::Blob(bytes),
            (SqlType::Blob, SqlValue::Text(s)) => SqlValue::Blob(s.into_bytes()),
            (SqlType::Array, SqlValue::Array(items)) => SqlValue::Array(items),
            (SqlType::Array, SqlValue::Text(s)) => {
                SqlValue::Array(crate::types::array::parse_array(&s)?)
            }
            (sql_type, value) => {
                return Err(format!("Cannot convert {} to {}", value.kind(), sql_type))
            }
        };
        Ok(value)
    }

    /// Convert to a JSON value; used by bean mapping and the CLI
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            SqlValue::Null => Json::Null,
            SqlValue::Boolean(b) => Json::Bool(*b),
            SqlValue::Integer(i) => Json::from(*i),
            SqlValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            SqlValue::Text(s) => Json::String(s.clone()),
            SqlValue::Blob(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            SqlValue::Date(d) => Json::String(d.to_string()),
            SqlValue::Timestamp(ts) => Json::String(ts.to_string()),
            SqlValue::Array(items) => Json::Array(items.iter().map(SqlValue::to_json).collect()),
            SqlValue::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| {
                        let value = v.clone().map(Json::String).unwrap_or(Json::Null);
                        (k.clone(), value)
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Boolean(b) => write!(f, "{}", b),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Double(d) => write!(f, "{}", d),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            SqlValue::Date(d) => write!(f, "{}", d),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts),
            SqlValue::Array(items) => write!(f, "{}", crate::types::array::encode_array(items)),
            SqlValue::Map(map) => write!(f, "{}", crate::types::hstore::encode_hstore(map)),
        }
    }
}

fn double_of(value: &SqlValue) -> Result<f64, String> {
    match value {
        SqlValue::Double(d) => Ok(*d),
        SqlValue::Integer(i) => Ok(*i as f64),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not numeric", s)),
        other => Err(format!("Cannot read {} as number", other.kind())),
    }
}

fn integer_of(value: &SqlValue) -> Result<i64, String> {
    let d = match value {
        SqlValue::Integer(i) => return Ok(*i),
        SqlValue::Boolean(b) => return Ok(i64::from(*b)),
        SqlValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => return Ok(i),
            Err(_) => double_of(value)?,
        },
        other => double_of(other)?,
    };
    if d.is_finite() && d.abs() < i64::MAX as f64 {
        Ok(d.trunc() as i64)
    } else {
        Err(format!("{} is out of range for an integer", d))
    }
}

/// Parse `YYYY-MM-DD`, optionally followed by a time with ` ` or `T`
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Binary argument wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_parses_aliases() {
        assert_eq!("double".parse::<SqlType>().unwrap(), SqlType::Double);
        assert_eq!("INT".parse::<SqlType>().unwrap(), SqlType::Integer);
        assert_eq!("text".parse::<SqlType>().unwrap(), SqlType::Varchar);
        assert!("geometry".parse::<SqlType>().is_err());
    }

    #[test]
    fn test_display_renders_null_and_text() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Text("Tom".into()).to_string(), "'Tom'");
        assert_eq!(
            SqlValue::Array(vec![SqlValue::Integer(1), SqlValue::Integer(-2)]).to_string(),
            "{1,-2}"
        );
    }

    #[test]
    fn test_convert_to_registered_types() {
        assert_eq!(
            SqlValue::Integer(5).convert_to(SqlType::Varchar),
            Ok(SqlValue::Text("5".into()))
        );
        assert_eq!(
            SqlValue::Integer(5).convert_to(SqlType::Double),
            Ok(SqlValue::Double(5.0))
        );
        assert_eq!(
            SqlValue::Double(5729.57).convert_to(SqlType::BigInt),
            Ok(SqlValue::Integer(5729))
        );
        assert_eq!(
            SqlValue::Text("2024-02-29".into()).convert_to(SqlType::Date),
            Ok(SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(SqlValue::Null.convert_to(SqlType::Date), Ok(SqlValue::Null));
        assert!(SqlValue::Text("2024-02-29".into()).convert_to(SqlType::Double).is_err());
        assert!(SqlValue::Integer(70_000).convert_to(SqlType::SmallInt).is_err());
        assert!(SqlValue::Double(1.5).convert_to(SqlType::Date).is_err());
    }

    #[test]
    fn test_to_json_maps_nested_values() {
        let mut map = BTreeMap::new();
        map.insert("daily".to_string(), Some("100".to_string()));
        map.insert("weekly".to_string(), None);
        let json = SqlValue::Map(map).to_json();
        assert_eq!(json["daily"], serde_json::json!("100"));
        assert!(json["weekly"].is_null());
    }
}
