// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! hstore key/value maps in PostgreSQL text form: `"k"=>"v", "n"=>NULL`

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{anychar, char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::separated_list0,
    sequence::{delimited, separated_pair, tuple},
    IResult,
};
use std::collections::BTreeMap;

pub type HStoreMap = BTreeMap<String, Option<String>>;

/// Render a map as hstore text; the empty map is the empty string
pub fn encode_hstore(map: &HStoreMap) -> String {
    map.iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}=>{}", quote(key), quote(value)),
            None => format!("{}=>NULL", quote(key)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Parse hstore text into a map
pub fn parse_hstore(text: &str) -> Result<HStoreMap, String> {
    let (_, pairs) = all_consuming(delimited(multispace0, pairs, multispace0))(text)
        .map_err(|e| format!("Invalid hstore literal '{}': {}", text, e))?;
    Ok(pairs.into_iter().collect())
}

fn pairs(input: &str) -> IResult<&str, Vec<(String, Option<String>)>> {
    separated_list0(
        tuple((multispace0, char(','), multispace0)),
        separated_pair(key, tuple((multispace0, tag("=>"), multispace0)), value),
    )(input)
}

fn key(input: &str) -> IResult<&str, String> {
    alt((quoted, map(bare, String::from)))(input)
}

fn value(input: &str) -> IResult<&str, Option<String>> {
    alt((
        map(quoted, Some),
        map(bare, |raw: &str| {
            if raw.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(raw.to_string())
            }
        }),
    ))(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(is_not("\\\""), '\\', anychar)),
            char('"'),
        ),
        Option::unwrap_or_default,
    )(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n=>,\"")(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(entries: &[(&str, Option<&str>)]) -> HStoreMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_parse_bare_pairs() {
        let parsed = parse_hstore("yearly=>10000, monthly=>5000, daily=>200").unwrap();
        assert_eq!(
            parsed,
            caps(&[
                ("yearly", Some("10000")),
                ("monthly", Some("5000")),
                ("daily", Some("200"))
            ])
        );
    }

    #[test]
    fn test_roundtrip_with_nulls_and_quotes() {
        let map = caps(&[("a key", Some("say \"hi\"")), ("gone", None)]);
        let text = encode_hstore(&map);
        assert_eq!(text, r#""a key"=>"say \"hi\"", "gone"=>NULL"#);
        assert_eq!(parse_hstore(&text).unwrap(), map);
    }

    #[test]
    fn test_empty_text_is_empty_map() {
        assert!(parse_hstore("").unwrap().is_empty());
        assert!(parse_hstore("   ").unwrap().is_empty());
        assert_eq!(encode_hstore(&HStoreMap::new()), "");
    }

    #[test]
    fn test_quoted_null_is_a_string() {
        let parsed = parse_hstore(r#""k"=>"NULL""#).unwrap();
        assert_eq!(parsed.get("k"), Some(&Some("NULL".to_string())));
    }

    #[test]
    fn test_rejects_dangling_arrow() {
        assert!(parse_hstore("k=>").is_err());
        assert!(parse_hstore("k=>v,").is_err());
    }
}
