//! Projection list grammar
//!
//! `list := item (',' item)*`
//! `item := (alias ':=')? (fn '(' name ')' | name)`

use nom::character::complete::char;
use nom::combinator::{all_consuming, opt};
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::datapath::RawProjection;

use super::common::ident;
use super::errors::UrlParsingError;
use super::name::{alias_binding, parse_name};

fn projection_item(input: &str) -> IResult<&str, RawProjection, UrlParsingError<'_>> {
    let (rest, alias) = opt(alias_binding).parse(input)?;

    // Aggregate form first: an identifier immediately followed by '('.
    if let Ok((rest2, fn_name)) = ident(rest) {
        if let Ok((rest3, name)) =
            delimited(char::<_, UrlParsingError>('('), parse_name, char(')')).parse(rest2)
        {
            return Ok((
                rest3,
                RawProjection {
                    name,
                    alias,
                    aggregate: Some(fn_name),
                },
            ));
        }
    }

    let (rest, name) = parse_name(rest)?;
    Ok((
        rest,
        RawProjection {
            name,
            alias,
            aggregate: None,
        },
    ))
}

pub fn parse_projection_items(input: &str) -> IResult<&str, Vec<RawProjection>, UrlParsingError<'_>> {
    all_consuming(separated_list1(char(','), projection_item)).parse(input)
}
