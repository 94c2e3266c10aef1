// Year coercion for YEAR / WEEK cells

use super::lexer::ws;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while_m_n},
    character::complete::{alpha1, char, digit1},
    combinator::{all_consuming, map, map_res, opt, verify},
    sequence::{preceded, terminated, tuple},
    IResult,
};

/// Coerce a year cell into a four-digit year.
///
/// Accepts plain years (`2020`, ` 2020 `, `2020.0`), week dates as found in
/// the weekly aggregated export (`04-January-2020`) and ISO dates
/// (`2020-01-04`). Anything else, including years outside 1000..=9999,
/// yields `None`.
pub fn parse_year(input: &str) -> Option<i32> {
    match all_consuming(ws(alt((week_date, iso_date, year_number))))(input) {
        Ok((_, year)) => Some(year),
        Err(_) => None,
    }
}

fn four_digit_year(input: &str) -> IResult<&str, i32> {
    verify(
        map_res(take_while_m_n(4, 4, |c: char| c.is_ascii_digit()), |s: &str| {
            s.parse::<i32>()
        }),
        |year: &i32| (1000..=9999).contains(year),
    )(input)
}

fn year_number(input: &str) -> IResult<&str, i32> {
    terminated(
        four_digit_year,
        opt(preceded(char('.'), take_while(|c: char| c == '0'))),
    )(input)
}

// dd-Month-yyyy
fn week_date(input: &str) -> IResult<&str, i32> {
    map(
        tuple((digit1, char('-'), alpha1, char('-'), four_digit_year)),
        |(_, _, _, _, year)| year,
    )(input)
}

// yyyy-mm-dd
fn iso_date(input: &str) -> IResult<&str, i32> {
    map(
        tuple((four_digit_year, char('-'), digit1, char('-'), digit1)),
        |(year, _, _, _, _)| year,
    )(input)
}
