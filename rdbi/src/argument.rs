// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Statement arguments and their binding onto driver parameters
//!
//! Every bound value is an [`Argument`] that writes itself into a
//! [`PreparedParams`] slot. Rust values become arguments through
//! [`IntoArgument`]; a [`Binding`] collects positional and named arguments and
//! resolves them against the placeholders of a rewritten statement.

use crate::driver::BoundValue;
use crate::error::{Error, Result};
use crate::rewriter::{ParsedSql, Placeholder};
use crate::statement::StatementContext;
use crate::types::{encode_array, ArrayElement};
use crate::value::{Blob, SqlType, SqlValue};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Parameter slots of a statement about to be executed; positions are 1-based
#[derive(Debug, Clone, Default)]
pub struct PreparedParams {
    slots: Vec<Option<BoundValue>>,
}

impl PreparedParams {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn set(&mut self, position: usize, value: BoundValue, ctx: &StatementContext) -> Result<()> {
        let count = self.slots.len();
        let slot = position
            .checked_sub(1)
            .and_then(|index| self.slots.get_mut(index))
            .ok_or_else(|| Error::Binding {
                message: format!(
                    "parameter position {} is out of range, statement has {} placeholders",
                    position, count
                ),
                context: Box::new(ctx.clone()),
            })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn set_value(&mut self, position: usize, value: SqlValue, ctx: &StatementContext) -> Result<()> {
        self.set(position, BoundValue::new(value), ctx)
    }

    pub fn set_null(&mut self, position: usize, sql_type: SqlType, ctx: &StatementContext) -> Result<()> {
        self.set(position, BoundValue::null(sql_type), ctx)
    }

    pub fn is_set(&self, position: usize) -> bool {
        position
            .checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .map_or(false, Option::is_some)
    }

    /// Finish binding; every slot must have been filled
    pub fn into_values(self, ctx: &StatementContext) -> Result<Vec<BoundValue>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::Binding {
                    message: format!("no argument bound for parameter position {}", index + 1),
                    context: Box::new(ctx.clone()),
                })
            })
            .collect()
    }
}

/// A value that knows how to bind itself to a statement parameter
pub trait Argument: fmt::Debug + fmt::Display {
    fn apply(&self, position: usize, params: &mut PreparedParams, ctx: &StatementContext) -> Result<()>;
}

/// Binds SQL NULL with an explicit type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullArgument {
    sql_type: SqlType,
}

impl NullArgument {
    pub fn new(sql_type: SqlType) -> Self {
        Self { sql_type }
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}

impl Argument for NullArgument {
    fn apply(&self, position: usize, params: &mut PreparedParams, ctx: &StatementContext) -> Result<()> {
        params.set_null(position, self.sql_type, ctx)
    }
}

impl fmt::Display for NullArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NULL")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueArgument(pub SqlValue);

impl Argument for ValueArgument {
    fn apply(&self, position: usize, params: &mut PreparedParams, ctx: &StatementContext) -> Result<()> {
        params.set_value(position, self.0.clone(), ctx)
    }
}

impl fmt::Display for ValueArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-dimensional array of typed elements
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayArgument {
    element_type: SqlType,
    elements: Vec<SqlValue>,
}

impl ArrayArgument {
    pub fn new<T: ArrayElement>(elements: &[T]) -> Self {
        Self {
            element_type: T::element_type(),
            elements: elements.iter().map(ArrayElement::to_element).collect(),
        }
    }

    pub fn element_type(&self) -> SqlType {
        self.element_type
    }
}

impl Argument for ArrayArgument {
    fn apply(&self, position: usize, params: &mut PreparedParams, ctx: &StatementContext) -> Result<()> {
        let value = BoundValue {
            value: SqlValue::Array(self.elements.clone()),
            sql_type: SqlType::Array,
        };
        params.set(position, value, ctx)
    }
}

impl fmt::Display for ArrayArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[]{}", self.element_type, encode_array(&self.elements))
    }
}

/// Conversion of Rust values into arguments
pub trait IntoArgument {
    fn into_argument(self) -> Box<dyn Argument>;
}

/// SQL type code of a Rust type, used to bind a typed NULL for `None`
pub trait HasSqlType {
    fn sql_type() -> SqlType;
}

macro_rules! value_argument {
    ($($t:ty => $code:expr, |$v:ident| $convert:expr);* $(;)?) => {
        $(
            impl IntoArgument for $t {
                fn into_argument(self) -> Box<dyn Argument> {
                    let $v = self;
                    Box::new(ValueArgument($convert))
                }
            }

            impl HasSqlType for $t {
                fn sql_type() -> SqlType {
                    $code
                }
            }
        )*
    };
}

value_argument! {
    bool => SqlType::Boolean, |v| SqlValue::Boolean(v);
    i16 => SqlType::SmallInt, |v| SqlValue::Integer(i64::from(v));
    i32 => SqlType::Integer, |v| SqlValue::Integer(i64::from(v));
    i64 => SqlType::BigInt, |v| SqlValue::Integer(v);
    f32 => SqlType::Real, |v| SqlValue::Double(f64::from(v));
    f64 => SqlType::Double, |v| SqlValue::Double(v);
    String => SqlType::Varchar, |v| SqlValue::Text(v);
    &str => SqlType::Varchar, |v| SqlValue::Text(v.to_string());
    Blob => SqlType::Blob, |v| SqlValue::Blob(v.0);
    NaiveDate => SqlType::Date, |v| SqlValue::Date(v);
    NaiveDateTime => SqlType::Timestamp, |v| SqlValue::Timestamp(v);
    Uuid => SqlType::Other, |v| SqlValue::Text(v.hyphenated().to_string());
    HashMap<String, String> => SqlType::Other,
        |v| SqlValue::Map(v.into_iter().map(|(k, v)| (k, Some(v))).collect());
    HashMap<String, Option<String>> => SqlType::Other, |v| SqlValue::Map(v.into_iter().collect());
    BTreeMap<String, String> => SqlType::Other,
        |v| SqlValue::Map(v.into_iter().map(|(k, v)| (k, Some(v))).collect());
    BTreeMap<String, Option<String>> => SqlType::Other, |v| SqlValue::Map(v);
}

impl IntoArgument for SqlValue {
    fn into_argument(self) -> Box<dyn Argument> {
        Box::new(ValueArgument(self))
    }
}

impl IntoArgument for NullArgument {
    fn into_argument(self) -> Box<dyn Argument> {
        Box::new(self)
    }
}

impl IntoArgument for ArrayArgument {
    fn into_argument(self) -> Box<dyn Argument> {
        Box::new(self)
    }
}

impl IntoArgument for Box<dyn Argument> {
    fn into_argument(self) -> Box<dyn Argument> {
        self
    }
}

impl<T: IntoArgument + HasSqlType> IntoArgument for Option<T> {
    fn into_argument(self) -> Box<dyn Argument> {
        match self {
            Some(value) => value.into_argument(),
            None => Box::new(NullArgument::new(T::sql_type())),
        }
    }
}

impl<T: ArrayElement> IntoArgument for Vec<T> {
    fn into_argument(self) -> Box<dyn Argument> {
        Box::new(ArrayArgument::new(&self))
    }
}

impl<T: ArrayElement> HasSqlType for Vec<T> {
    fn sql_type() -> SqlType {
        SqlType::Array
    }
}

impl<T: ArrayElement> IntoArgument for &[T] {
    fn into_argument(self) -> Box<dyn Argument> {
        Box::new(ArrayArgument::new(self))
    }
}

/// Positional argument lists accepted by `Handle::execute` and friends
pub trait IntoArguments {
    fn into_arguments(self) -> Vec<Box<dyn Argument>>;
}

impl IntoArguments for () {
    fn into_arguments(self) -> Vec<Box<dyn Argument>> {
        Vec::new()
    }
}

impl<T: IntoArgument> IntoArguments for Vec<T> {
    fn into_arguments(self) -> Vec<Box<dyn Argument>> {
        self.into_iter().map(IntoArgument::into_argument).collect()
    }
}

macro_rules! tuple_arguments {
    ($(($($name:ident),+))+) => {
        $(
            impl<$($name: IntoArgument),+> IntoArguments for ($($name,)+) {
                #[allow(non_snake_case)]
                fn into_arguments(self) -> Vec<Box<dyn Argument>> {
                    let ($($name,)+) = self;
                    vec![$($name.into_argument()),+]
                }
            }
        )+
    };
}

tuple_arguments! {
    (A)
    (A, B)
    (A, B, C)
    (A, B, C, D)
    (A, B, C, D, E)
    (A, B, C, D, E, F)
    (A, B, C, D, E, F, G)
    (A, B, C, D, E, F, G, H)
}

/// Key of a bound or registered parameter: 0-based position or name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Index(usize),
    Name(String),
    /// A negative position; never matches a placeholder
    Negative(i64),
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Index(index)
    }
}

impl From<i32> for ParamKey {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => ParamKey::Index(index),
            Err(_) => ParamKey::Negative(i64::from(index)),
        }
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(name)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Index(index) => write!(f, "{}", index),
            ParamKey::Name(name) => write!(f, ":{}", name),
            ParamKey::Negative(index) => write!(f, "{}", index),
        }
    }
}

/// Positional (0-based) and named arguments of one statement
#[derive(Debug, Default)]
pub struct Binding {
    positional: BTreeMap<usize, Box<dyn Argument>>,
    named: BTreeMap<String, Box<dyn Argument>>,
    negative: Vec<i64>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: ParamKey, argument: Box<dyn Argument>) {
        match key {
            ParamKey::Index(index) => self.add_positional(index, argument),
            ParamKey::Name(name) => self.add_named(name, argument),
            ParamKey::Negative(index) => self.negative.push(index),
        }
    }

    pub fn add_positional(&mut self, index: usize, argument: Box<dyn Argument>) {
        self.positional.insert(index, argument);
    }

    pub fn add_named(&mut self, name: impl Into<String>, argument: Box<dyn Argument>) {
        self.named.insert(name.into(), argument);
    }

    /// Append arguments after the highest bound position
    pub fn extend_positional(&mut self, arguments: Vec<Box<dyn Argument>>) {
        let mut next = self
            .positional
            .keys()
            .next_back()
            .map_or(Some(0), |last| last.checked_add(1));
        for argument in arguments {
            // Positions past usize::MAX are dropped; nothing can bind them
            let Some(position) = next else { break };
            self.positional.insert(position, argument);
            next = position.checked_add(1);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty() && self.negative.is_empty()
    }

    fn lookup(&self, index: usize, placeholder: &Placeholder) -> Option<&dyn Argument> {
        if let Placeholder::Named(name) = placeholder {
            if let Some(argument) = self.named.get(name) {
                return Some(argument.as_ref());
            }
        }
        self.positional.get(&index).map(|argument| argument.as_ref())
    }

    /// Bind every placeholder of `parsed`
    ///
    /// A named argument wins over the positional argument at the placeholder's
    /// index. Placeholders listed in `unbound` (0-based index, type) may stay
    /// unbound and are sent as typed NULLs. Positional arguments beyond the
    /// last placeholder are passed on unless `allow_unused` is set, leaving
    /// the driver to reject the parameter count.
    pub fn resolve(
        &self,
        parsed: &ParsedSql,
        ctx: &StatementContext,
        allow_unused: bool,
        unbound: &[(usize, SqlType)],
    ) -> Result<Vec<BoundValue>> {
        if let Some(index) = self.negative.first() {
            return Err(Error::Binding {
                message: format!("Invalid parameter position {}, positions start at 0", index),
                context: Box::new(ctx.clone()),
            });
        }
        if !allow_unused {
            self.check_unused_names(parsed, ctx)?;
        }

        let count = parsed.placeholder_count();
        let extra: Vec<&dyn Argument> = if allow_unused {
            Vec::new()
        } else {
            self.positional
                .range(count..)
                .map(|(_, argument)| argument.as_ref())
                .collect()
        };

        let mut params = PreparedParams::new(count + extra.len());
        for (index, placeholder) in parsed.placeholders.iter().enumerate() {
            let position = index + 1;
            match self.lookup(index, placeholder) {
                Some(argument) => argument.apply(position, &mut params, ctx)?,
                None => match unbound.iter().find(|(i, _)| *i == index) {
                    Some((_, sql_type)) => params.set_null(position, *sql_type, ctx)?,
                    None => {
                        let described = match placeholder {
                            Placeholder::Named(name) => format!("named parameter ':{}'", name),
                            Placeholder::Positional => format!("positional parameter {}", index),
                        };
                        return Err(Error::Binding {
                            message: format!("Unable to find argument for {}", described),
                            context: Box::new(ctx.clone()),
                        });
                    }
                },
            }
        }
        for (offset, argument) in extra.into_iter().enumerate() {
            argument.apply(count + offset + 1, &mut params, ctx)?;
        }
        params.into_values(ctx)
    }

    fn check_unused_names(&self, parsed: &ParsedSql, ctx: &StatementContext) -> Result<()> {
        let names: Vec<&str> = parsed.names().collect();
        match self.named.keys().find(|name| !names.contains(&name.as_str())) {
            Some(name) => Err(Error::Binding {
                message: format!("Superfluous named argument ':{}' is not used by the statement", name),
                context: Box::new(ctx.clone()),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positional: Vec<String> = self
            .positional
            .iter()
            .map(|(index, argument)| format!("{}:{}", index, argument))
            .collect();
        let named: Vec<String> = self
            .named
            .iter()
            .map(|(name, argument)| format!("{}:{}", name, argument))
            .collect();
        write!(
            f,
            "{{positional:{{{}}}, named:{{{}}}}}",
            positional.join(", "),
            named.join(", ")
        )
    }
}
