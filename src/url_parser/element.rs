//! Path element grammar: one '/'-separated segment of the data path.

use nom::branch::alt;
use nom::character::complete::char;
use nom::combinator::{all_consuming, map, opt};
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

use super::ast::PathElementAst;
use super::common::ident;
use super::errors::UrlParsingError;
use super::filter::parse_filter_tree;
use super::name::{alias_binding, parse_name};

fn context_shift(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    map(preceded(char('$'), ident), PathElementAst::Context).parse(input)
}

fn explicit_link(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    let (rest, alias) = opt(alias_binding).parse(input)?;
    let (rest, name) = delimited(char('('), parse_name, char(')')).parse(rest)?;
    Ok((rest, PathElementAst::Link { name, alias }))
}

fn aliased_step(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    let (rest, alias) = alias_binding(input)?;
    let (rest, name) = parse_name(rest)?;
    Ok((
        rest,
        PathElementAst::Step {
            name,
            alias: Some(alias),
        },
    ))
}

fn filter_element(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    map(parse_filter_tree, PathElementAst::Filter).parse(input)
}

fn plain_step(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    map(parse_name, |name| PathElementAst::Step { name, alias: None }).parse(input)
}

/// Parse one complete segment. Alternatives are ordered so alias bindings
/// win over filter predicates and filters win over bare table steps.
pub fn parse_element(input: &str) -> IResult<&str, PathElementAst, UrlParsingError<'_>> {
    alt((
        all_consuming(context_shift),
        all_consuming(explicit_link),
        all_consuming(aliased_step),
        all_consuming(filter_element),
        all_consuming(plain_step),
    ))
    .parse(input)
}
