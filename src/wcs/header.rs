//! Parsing of FITS-style projection headers.
//!
//! A header is a sequence of `KEY = value / comment` cards, either one per line
//! or packed as fixed 80-character records. Only numeric cards are retained;
//! string and logical values are accepted but skipped, and commentary cards
//! (`COMMENT`, `HISTORY`, `END`, blank) are ignored. Numbers may use the FORTRAN
//! `D` exponent (`1.5D+03`). After the value only a `/` comment may follow.
use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, multispace0},
    combinator::{eof, map, map_res, opt, rest, value},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use crate::skyframe_errors::SkyframeError;

/// Numeric header cards indexed by keyword.
pub type HeaderCards = HashMap<String, f64>;

const CARD_LENGTH: usize = 80;

fn is_keyword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn parse_keyword(input: &str) -> IResult<&str, &str> {
    terminated(
        take_while1(is_keyword_char),
        (multispace0, char('='), multispace0),
    )
    .parse(input)
}

fn parse_string_value(input: &str) -> IResult<&str, Option<f64>> {
    value(None, delimited(char('\''), opt(take_until("'")), char('\''))).parse(input)
}

fn parse_logical_value(input: &str) -> IResult<&str, Option<f64>> {
    value(None, alt((tag("T"), tag("F")))).parse(input)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | 'd' | 'D')
}

fn parse_number_value(input: &str) -> IResult<&str, f64> {
    map_res(take_while1(is_number_char), |number: &str| {
        number.replace(['d', 'D'], "E").parse::<f64>()
    })
    .parse(input)
}

fn parse_card_value(input: &str) -> IResult<&str, Option<f64>> {
    alt((
        map(parse_number_value, Some),
        parse_string_value,
        parse_logical_value,
    ))
    .parse(input)
}

fn parse_card_end(input: &str) -> IResult<&str, ()> {
    value(
        (),
        (multispace0, opt(preceded(char('/'), rest)), eof),
    )
    .parse(input)
}

fn parse_card(input: &str) -> IResult<&str, (&str, Option<f64>)> {
    (
        preceded(multispace0, parse_keyword),
        terminated(parse_card_value, parse_card_end),
    )
        .parse(input)
}

fn is_commentary(card: &str) -> bool {
    let card = card.trim();
    card.is_empty()
        || card == "END"
        || card.starts_with("COMMENT")
        || card.starts_with("HISTORY")
        || !card.contains('=')
}

fn split_cards(header: &str) -> Result<Vec<&str>, SkyframeError> {
    if header.contains('\n') || header.len() <= CARD_LENGTH {
        return Ok(header.lines().collect());
    }
    header
        .as_bytes()
        .chunks(CARD_LENGTH)
        .enumerate()
        .map(|(index, chunk)| {
            std::str::from_utf8(chunk).map_err(|_e| {
                SkyframeError::HeaderParse(format!("record {index} is not valid UTF-8"))
            })
        })
        .collect()
}

/// Parse a header text blob into its numeric cards.
///
/// Arguments
/// ---------
/// * `header`: the header text, newline separated or packed in 80-character records.
///
/// Return
/// ----------
/// * `Ok(HeaderCards)`: keyword → numeric value for every numeric card.
/// * `Err(SkyframeError::HeaderParse)`: a card with an `=` sign whose value could not be read
///   or is followed by anything but a comment, or a packed record that is not valid UTF-8.
pub fn parse_header(header: &str) -> Result<HeaderCards, SkyframeError> {
    let cards = split_cards(header)?
        .into_iter()
        .filter(|card| !is_commentary(card))
        .map(|card| {
            parse_card(card)
                .map_err(|_e| SkyframeError::HeaderParse(card.trim().to_string()))
                .map(|(_, (key, value))| value.map(|v| (key.to_string(), v)))
        })
        .collect::<Result<Vec<_>, SkyframeError>>()?
        .into_iter()
        .flatten()
        .collect();

    Ok(cards)
}
