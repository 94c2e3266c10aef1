// Grouping dimension lists, e.g. "country, year"

use super::lexer::{identifier, ws};
use crate::aggregate::Dimension;
use nom::{
    character::complete::char,
    combinator::{all_consuming, map_opt},
    multi::separated_list1,
    IResult,
};

fn dimension(input: &str) -> IResult<&str, Dimension> {
    map_opt(identifier, |name| Dimension::from_name(&name))(input)
}

/// Parse a comma separated dimension list
/// Format: country | country, year | event_type, subtype
pub fn parse_dimensions(input: &str) -> IResult<&str, Vec<Dimension>> {
    separated_list1(ws(char(',')), ws(dimension))(input)
}

/// Parse a complete dimension list, rejecting trailing input
pub fn parse_dimension_list(input: &str) -> Result<Vec<Dimension>, String> {
    match all_consuming(parse_dimensions)(input) {
        Ok((_, dims)) => Ok(dims),
        Err(e) => Err(format!(
            "invalid dimension list '{}': expected names from country, year, subtype, event_type ({:?})",
            input, e
        )),
    }
}
