// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! One-dimensional SQL arrays in PostgreSQL text form
//!
//! Arrays travel through drivers without native array support as the text
//! literal `{1,-2,NULL,"a \"b\""}`. Decoding has no column type to lean on, so
//! bare elements that parse as numbers become numbers, quoted elements stay
//! text and a bare `NULL` is SQL NULL.

use crate::value::{SqlType, SqlValue};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not},
    character::complete::{anychar, char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::separated_list0,
    sequence::{delimited, pair, tuple},
    IResult,
};
use uuid::Uuid;

/// Render elements as an array literal
pub fn encode_array(elements: &[SqlValue]) -> String {
    let rendered: Vec<String> = elements.iter().map(encode_element).collect();
    format!("{{{}}}", rendered.join(","))
}

fn encode_element(element: &SqlValue) -> String {
    match element {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Boolean(b) => (if *b { "t" } else { "f" }).to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Double(d) => d.to_string(),
        SqlValue::Text(s) => quote(s),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            quote(&format!("\\x{}", hex))
        }
        SqlValue::Date(d) => quote(&d.to_string()),
        SqlValue::Timestamp(ts) => quote(&ts.to_string()),
        other => quote(&other.to_string()),
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parse an array literal into element values
pub fn parse_array(text: &str) -> Result<Vec<SqlValue>, String> {
    all_consuming(array_literal)(text.trim())
        .map(|(_, elements)| elements)
        .map_err(|e| format!("Invalid array literal '{}': {}", text, e))
}

fn array_literal(input: &str) -> IResult<&str, Vec<SqlValue>> {
    delimited(
        pair(char('{'), multispace0),
        separated_list0(tuple((multispace0, char(','), multispace0)), element),
        pair(multispace0, char('}')),
    )(input)
}

fn element(input: &str) -> IResult<&str, SqlValue> {
    alt((quoted_element, bare_element))(input)
}

fn quoted_element(input: &str) -> IResult<&str, SqlValue> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(is_not("\\\""), '\\', anychar)),
            char('"'),
        ),
        |text: Option<String>| SqlValue::Text(text.unwrap_or_default()),
    )(input)
}

fn bare_element(input: &str) -> IResult<&str, SqlValue> {
    map(is_not(",{}\""), |raw: &str| {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("null") {
            SqlValue::Null
        } else if let Ok(i) = raw.parse::<i64>() {
            SqlValue::Integer(i)
        } else if let Ok(d) = raw.parse::<f64>() {
            SqlValue::Double(d)
        } else {
            SqlValue::Text(raw.to_string())
        }
    })(input)
}

/// A Rust type usable as an array element
pub trait ArrayElement: Sized {
    /// Type code used when an array of this element is bound as NULL
    fn element_type() -> SqlType;

    fn to_element(&self) -> SqlValue;

    fn from_element(element: SqlValue) -> Result<Self, String>;
}

macro_rules! integer_element {
    ($($t:ty => $code:expr),* $(,)?) => {
        $(
            impl ArrayElement for $t {
                fn element_type() -> SqlType {
                    $code
                }

                fn to_element(&self) -> SqlValue {
                    SqlValue::Integer(i64::from(*self))
                }

                fn from_element(element: SqlValue) -> Result<Self, String> {
                    match element {
                        SqlValue::Integer(i) => <$t>::try_from(i)
                            .map_err(|_| format!("{} is out of range for {}", i, stringify!($t))),
                        SqlValue::Text(s) => s
                            .trim()
                            .parse::<$t>()
                            .map_err(|e| format!("cannot read '{}' as {}: {}", s, stringify!($t), e)),
                        other => Err(format!("cannot read {} element as {}", other.kind(), stringify!($t))),
                    }
                }
            }
        )*
    };
}

integer_element!(i16 => SqlType::SmallInt, i32 => SqlType::Integer, i64 => SqlType::BigInt);

impl ArrayElement for f64 {
    fn element_type() -> SqlType {
        SqlType::Double
    }

    fn to_element(&self) -> SqlValue {
        SqlValue::Double(*self)
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        match element {
            SqlValue::Double(d) => Ok(d),
            SqlValue::Integer(i) => Ok(i as f64),
            other => Err(format!("cannot read {} element as f64", other.kind())),
        }
    }
}

impl ArrayElement for bool {
    fn element_type() -> SqlType {
        SqlType::Boolean
    }

    fn to_element(&self) -> SqlValue {
        SqlValue::Boolean(*self)
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        match element {
            SqlValue::Boolean(b) => Ok(b),
            SqlValue::Integer(i) => Ok(i != 0),
            SqlValue::Text(s) => match s.to_lowercase().as_str() {
                "t" | "true" => Ok(true),
                "f" | "false" => Ok(false),
                _ => Err(format!("cannot read '{}' as bool", s)),
            },
            other => Err(format!("cannot read {} element as bool", other.kind())),
        }
    }
}

impl ArrayElement for String {
    fn element_type() -> SqlType {
        SqlType::Varchar
    }

    fn to_element(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        match element {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Null => Err("NULL element in a non-optional String array".to_string()),
            other => Ok(other.to_string()),
        }
    }
}

impl ArrayElement for Uuid {
    fn element_type() -> SqlType {
        SqlType::Other
    }

    fn to_element(&self) -> SqlValue {
        SqlValue::Text(self.hyphenated().to_string())
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        match element {
            SqlValue::Text(s) => Uuid::parse_str(&s).map_err(|e| format!("invalid uuid '{}': {}", s, e)),
            other => Err(format!("cannot read {} element as uuid", other.kind())),
        }
    }
}

impl ArrayElement for SqlValue {
    fn element_type() -> SqlType {
        SqlType::Other
    }

    fn to_element(&self) -> SqlValue {
        self.clone()
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        Ok(element)
    }
}

impl<T: ArrayElement> ArrayElement for Option<T> {
    fn element_type() -> SqlType {
        T::element_type()
    }

    fn to_element(&self) -> SqlValue {
        match self {
            Some(value) => value.to_element(),
            None => SqlValue::Null,
        }
    }

    fn from_element(element: SqlValue) -> Result<Self, String> {
        match element {
            SqlValue::Null => Ok(None),
            other => T::from_element(other).map(Some),
        }
    }
}

/// Decode a column value holding an array into typed elements
pub fn decode_elements<T: ArrayElement>(value: SqlValue) -> Result<Vec<T>, String> {
    let elements = match value {
        SqlValue::Array(elements) => elements,
        SqlValue::Text(text) => parse_array(&text)?,
        other => return Err(format!("cannot read {} as an array", other.kind())),
    };
    elements.into_iter().map(T::from_element).collect()
}
