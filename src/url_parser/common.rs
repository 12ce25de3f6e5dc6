//! Shared lexeme parsers
//!
//! Identifiers and values are the only places percent-decoding happens;
//! the grammar's meta-characters `/ ; , & ! $ @ ( ) = :` are recognized
//! un-encoded and must be escaped inside lexemes.

use nom::bytes::complete::{take_while, take_while1};
use nom::error::ParseError;
use nom::{IResult, Parser};
use percent_encoding::percent_decode_str;

use super::errors::UrlParsingError;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '%' | '~')
}

fn is_value_char(c: char) -> bool {
    !matches!(c, '&' | ';' | ',' | '(' | ')' | '/' | '@')
}

fn decoded<'a>(input: &'a str, raw: &'a str) -> Result<String, nom::Err<UrlParsingError<'a>>> {
    match percent_decode_str(raw).decode_utf8() {
        Ok(s) => Ok(s.into_owned()),
        Err(_) => Err(nom::Err::Failure(UrlParsingError::from_error_kind(
            input,
            nom::error::ErrorKind::Escaped,
        ))),
    }
}

/// A non-empty identifier lexeme, percent-decoded.
pub fn ident(input: &str) -> IResult<&str, String, UrlParsingError<'_>> {
    let (rest, raw) = take_while1(is_ident_char).parse(input)?;
    let s = decoded(input, raw)?;
    if s.is_empty() {
        return Err(nom::Err::Error(UrlParsingError {
            errors: vec![(input, "empty identifier")],
        }));
    }
    Ok((rest, s))
}

/// A possibly-empty value lexeme, percent-decoded.
pub fn value(input: &str) -> IResult<&str, String, UrlParsingError<'_>> {
    let (rest, raw) = take_while(is_value_char).parse(input)?;
    Ok((rest, decoded(input, raw)?))
}
