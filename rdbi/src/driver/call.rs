// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Callable statement syntax: `[{] [? =] CALL name(arg, ...) [}]`

use super::{DriverError, DriverResult};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric1, char, multispace0, multispace1},
    combinator::{opt, recognize},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

/// Parsed callable statement
#[derive(Debug, Clone, PartialEq)]
pub struct CallSyntax {
    /// True when the call starts with `? =`, which occupies position 1
    pub has_return: bool,
    pub name: String,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    /// A bare `?` at the given 1-based position
    Placeholder(usize),
    /// Any other SQL expression, with the positions of the placeholders it uses
    Expression { sql: String, positions: Vec<usize> },
}

impl CallSyntax {
    /// Total number of placeholders, including the return slot
    pub fn placeholder_count(&self) -> usize {
        let args: usize = self
            .args
            .iter()
            .map(|arg| match arg {
                CallArg::Placeholder(_) => 1,
                CallArg::Expression { positions, .. } => positions.len(),
            })
            .sum();
        args + usize::from(self.has_return)
    }
}

pub fn parse_call(sql: &str) -> DriverResult<CallSyntax> {
    let (rest, (has_return, name)) =
        header(sql).map_err(|e| DriverError::Syntax(format!("not a callable statement '{}': {}", sql, e)))?;

    let mut rest = rest.trim();
    if sql.trim_start().starts_with('{') {
        rest = rest
            .strip_suffix('}')
            .ok_or_else(|| DriverError::Syntax(format!("unterminated call escape in '{}'", sql)))?
            .trim_end();
    }

    let raw_args = if rest.is_empty() {
        Vec::new()
    } else {
        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| DriverError::Syntax(format!("malformed argument list in '{}'", sql)))?;
        split_arguments(inner)
    };

    let mut next_position = if has_return { 2 } else { 1 };
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        if raw == "?" {
            args.push(CallArg::Placeholder(next_position));
            next_position += 1;
        } else {
            let count = count_placeholders(&raw);
            let positions = (next_position..next_position + count).collect();
            next_position += count;
            args.push(CallArg::Expression { sql: raw, positions });
        }
    }

    Ok(CallSyntax {
        has_return,
        name: name.to_string(),
        args,
    })
}

fn header(input: &str) -> IResult<&str, (bool, &str)> {
    let (input, _) = multispace0(input)?;
    let (input, _) = opt(pair(char('{'), multispace0))(input)?;
    let (input, ret) = opt(tuple((char('?'), multispace0, char('='), multispace0)))(input)?;
    let (input, _) = tag_no_case("call")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, name) = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag(".")))),
    ))(input)?;
    Ok((input, (ret.is_some(), name)))
}

/// Split on top-level commas, ignoring commas inside quotes and parentheses
fn split_arguments(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    args.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    args.push(current.trim().to_string());
    args
}

fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}
