//! Filter expression grammar
//!
//! `disjunction := conjunction (';' conjunction)*`
//! `conjunction := unary ('&' unary)*`
//! `unary := '!'? primary`
//! `primary := '(' disjunction ')' | predicate`
//! `predicate := name ('=' value | '::' op '::' value?)`

use nom::character::complete::char;
use nom::combinator::opt;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::datapath::{FilterOp, FilterTree};

use super::common::{ident, value};
use super::errors::UrlParsingError;
use super::name::parse_name;

pub fn parse_filter_tree(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    disjunction(input)
}

fn disjunction(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    let (rest, mut parts) = separated_list1(char(';'), conjunction).parse(input)?;
    if parts.len() == 1 {
        Ok((rest, parts.pop().expect("len checked")))
    } else {
        Ok((rest, FilterTree::Disj(parts)))
    }
}

fn conjunction(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    let (rest, mut parts) = separated_list1(char('&'), unary).parse(input)?;
    if parts.len() == 1 {
        Ok((rest, parts.pop().expect("len checked")))
    } else {
        Ok((rest, FilterTree::Conj(parts)))
    }
}

fn unary(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    let (rest, negated) = opt(char('!')).parse(input)?;
    let (rest, inner) = primary(rest)?;
    if negated.is_some() {
        Ok((rest, FilterTree::Neg(Box::new(inner))))
    } else {
        Ok((rest, inner))
    }
}

fn primary(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    if let Ok((rest, inner)) =
        delimited(char::<_, UrlParsingError>('('), disjunction, char(')')).parse(input)
    {
        return Ok((rest, inner));
    }
    predicate(input)
}

fn predicate(input: &str) -> IResult<&str, FilterTree, UrlParsingError<'_>> {
    let (rest, name) = parse_name(input)?;

    if let Ok((rest, _)) = char::<_, UrlParsingError>('=').parse(rest) {
        let (rest, val) = value(rest)?;
        return Ok((
            rest,
            FilterTree::Pred {
                name,
                op: FilterOp::Eq,
                value: Some(val),
            },
        ));
    }

    let (rest, _) = char(':').parse(rest)?;
    let (rest, _) = char(':').parse(rest)?;
    let (rest, op_name) = ident(rest)?;
    let (rest, _) = char(':').parse(rest)?;
    let (rest, _) = char(':').parse(rest)?;
    let (rest, val) = value(rest)?;

    let Some(op) = FilterOp::from_url(&op_name) else {
        return Err(nom::Err::Failure(UrlParsingError {
            errors: vec![(input, "unknown filter operator")],
        }));
    };
    let tree = if op.takes_value() {
        FilterTree::Pred {
            name,
            op,
            value: Some(val),
        }
    } else {
        if !val.is_empty() {
            return Err(nom::Err::Failure(UrlParsingError {
                errors: vec![(input, "null operator does not accept a value")],
            }));
        }
        FilterTree::Pred {
            name,
            op,
            value: None,
        }
    };
    Ok((rest, tree))
}
