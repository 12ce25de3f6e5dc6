//! Name lexemes: 1-3 part names and the two wildcard forms.

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::opt;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::datapath::Name;

use super::common::ident;
use super::errors::UrlParsingError;

pub fn parse_name(input: &str) -> IResult<&str, Name, UrlParsingError<'_>> {
    // Bare wildcard first so '*' never lexes as an identifier.
    if let Ok((rest, _)) = char::<_, UrlParsingError>('*').parse(input) {
        return Ok((rest, Name::Wildcard));
    }

    let (rest, first) = ident(input)?;

    if let Ok((rest, _)) = tag::<_, _, UrlParsingError>(":*").parse(rest) {
        return Ok((rest, Name::AliasWildcard(first)));
    }

    let (rest, second) = opt(preceded(char(':'), ident)).parse(rest)?;
    let Some(second) = second else {
        return Ok((rest, Name::Unqualified(first)));
    };

    let (rest, third) = opt(preceded(char(':'), ident)).parse(rest)?;
    match third {
        Some(third) => Ok((rest, Name::FullyQualified(first, second, third))),
        None => Ok((rest, Name::Qualified(first, second))),
    }
}

/// `alias:=` prefix binding an alias to the element that follows.
pub fn alias_binding(input: &str) -> IResult<&str, String, UrlParsingError<'_>> {
    let (rest, alias) = ident(input)?;
    let (rest, _) = tag(":=").parse(rest)?;
    Ok((rest, alias))
}
