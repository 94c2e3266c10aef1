// Shared lexical helpers

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, multispace0},
    combinator::{map, recognize},
    multi::many0_count,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Identifier: a letter or underscore, then letters, digits, `_` or `-`
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_"), tag("-")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("event_type rest"), Ok((" rest", "event_type".to_string())));
        assert_eq!(identifier("sub-type"), Ok(("", "sub-type".to_string())));
        assert!(identifier("2020").is_err());
    }

    #[test]
    fn test_ws() {
        let mut parser = ws(tag("year"));
        assert_eq!(parser("  year  ,"), Ok((",", "year")));
    }
}
