// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Statement rewriting: `:name` and `?` placeholders become driver `?` slots

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until},
    character::complete::{alpha1, alphanumeric1, anychar, char},
    combinator::{all_consuming, map, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// One placeholder of a rewritten statement; index `i` is driver position `i + 1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Positional,
    Named(String),
}

/// SQL with every placeholder rewritten to `?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    pub sql: String,
    pub placeholders: Vec<Placeholder>,
}

impl ParsedSql {
    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Index of the first placeholder carrying `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.placeholders
            .iter()
            .position(|p| matches!(p, Placeholder::Named(n) if n == name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().filter_map(|p| match p {
            Placeholder::Named(name) => Some(name.as_str()),
            Placeholder::Positional => None,
        })
    }
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Positional,
    Named(&'a str),
}

/// Parse SQL, collecting placeholders and rewriting named ones
pub fn parse_sql(sql: &str) -> Result<ParsedSql, String> {
    let (_, tokens) =
        all_consuming(many0(token))(sql).map_err(|e| format!("Unable to parse '{}': {}", sql, e))?;

    let mut rewritten = String::with_capacity(sql.len());
    let mut placeholders = Vec::new();
    for token in tokens {
        match token {
            Token::Text(text) => rewritten.push_str(text),
            Token::Positional => {
                rewritten.push('?');
                placeholders.push(Placeholder::Positional);
            }
            Token::Named(name) => {
                rewritten.push('?');
                placeholders.push(Placeholder::Named(name.to_string()));
            }
        }
    }

    Ok(ParsedSql {
        sql: rewritten,
        placeholders,
    })
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(string_literal, Token::Text),
        map(quoted_identifier, Token::Text),
        map(line_comment, Token::Text),
        map(block_comment, Token::Text),
        map(tag("::"), Token::Text),
        map(named, Token::Named),
        map(char('?'), |_| Token::Positional),
        map(is_not("'\"-/:?"), Token::Text),
        map(recognize(anychar), Token::Text),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        many0(alt((tag("''"), is_not("'")))),
        char('\''),
    ))(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), opt(is_not("\"")), char('"')))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("--"), opt(is_not("\n"))))(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

fn named(input: &str) -> IResult<&str, &str> {
    preceded(
        char(':'),
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
    )(input)
}
