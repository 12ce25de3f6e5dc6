//! Path modifiers: `@sort(...)`, `@before(...)`, `@after(...)`.

use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::datapath::SortKey;

use super::common::value;
use super::errors::UrlParsingError;
use super::name::parse_name;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub sort: Vec<SortKey>,
    pub before: Option<Vec<String>>,
    pub after: Option<Vec<String>>,
}

fn sort_key(input: &str) -> IResult<&str, SortKey, UrlParsingError<'_>> {
    let (rest, name) = parse_name(input)?;
    let (rest, desc) = opt(tag("::desc::")).parse(rest)?;
    Ok((
        rest,
        SortKey {
            name,
            descending: desc.is_some(),
        },
    ))
}

fn key_values(input: &str) -> IResult<&str, Vec<String>, UrlParsingError<'_>> {
    delimited(char('('), separated_list1(char(','), value), char(')')).parse(input)
}

pub fn parse_modifiers(mut input: &str) -> IResult<&str, Modifiers, UrlParsingError<'_>> {
    let mut modifiers = Modifiers::default();
    loop {
        if let Ok((rest, keys)) = delimited(
            tag::<_, _, UrlParsingError>("@sort("),
            separated_list1(char(','), sort_key),
            char(')'),
        )
        .parse(input)
        {
            modifiers.sort = keys;
            input = rest;
            continue;
        }
        if let Ok((rest, values)) =
            nom::sequence::preceded(tag::<_, _, UrlParsingError>("@before"), key_values)
                .parse(input)
        {
            modifiers.before = Some(values);
            input = rest;
            continue;
        }
        if let Ok((rest, values)) =
            nom::sequence::preceded(tag::<_, _, UrlParsingError>("@after"), key_values).parse(input)
        {
            modifiers.after = Some(values);
            input = rest;
            continue;
        }
        break;
    }
    Ok((input, modifiers))
}
