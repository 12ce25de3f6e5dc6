//! URL data-path grammar
//!
//! Parses the raw, undecoded sub-resource part of a catalog URL into the
//! AST the endpoint dispatchers consume. Parsing the undecoded text lets
//! the grammar's meta-characters keep their meaning while percent-encoded
//! occurrences land inside identifiers and values.

use crate::datapath::RawProjection;
use crate::errors::RestError;

pub mod ast;
mod common;
mod element;
pub(crate) mod errors;
mod filter;
mod modifiers;
mod name;
mod projection;

pub use ast::{DataPathAst, PathElementAst};

/// Parse a complete data path: '/'-separated elements with optional
/// trailing `@sort`/`@before`/`@after` modifiers.
pub fn parse_data_path(raw: &str) -> Result<DataPathAst, RestError> {
    // Modifiers begin at the first '@'; it cannot occur unencoded anywhere
    // else in the grammar.
    let (path_part, modifier_part) = match raw.find('@') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };

    let mut elements = Vec::new();
    for segment in path_part.split('/') {
        if segment.is_empty() {
            continue;
        }
        let (_, element) = element::parse_element(segment)
            .map_err(|e| bad_syntax("data path", segment, e))?;
        elements.push(element);
    }
    if elements.is_empty() {
        return Err(RestError::BadSyntax(
            "data path requires at least a base table name".to_string(),
        ));
    }

    let modifiers = if modifier_part.is_empty() {
        modifiers::Modifiers::default()
    } else {
        match modifiers::parse_modifiers(modifier_part) {
            Ok(("", m)) => m,
            Ok((trailing, _)) => {
                return Err(RestError::BadSyntax(format!(
                    "unparsable path modifiers at \"{}\"",
                    trailing
                )))
            }
            Err(e) => return Err(bad_syntax("path modifiers", modifier_part, e)),
        }
    };

    Ok(DataPathAst {
        elements,
        sort: modifiers.sort,
        before: modifiers.before,
        after: modifiers.after,
    })
}

/// Parse a projection list segment.
pub fn parse_projection_list(raw: &str) -> Result<Vec<RawProjection>, RestError> {
    let (_, items) = projection::parse_projection_items(raw)
        .map_err(|e| bad_syntax("projection", raw, e))?;
    Ok(items)
}

/// Parse an attributegroup projection segment: `groupkeys;attributes`,
/// with the attribute list optional.
pub fn parse_group_projection(
    raw: &str,
) -> Result<(Vec<RawProjection>, Vec<RawProjection>), RestError> {
    match raw.split_once(';') {
        Some((keys, "")) => Ok((parse_projection_list(keys)?, Vec::new())),
        Some((keys, attrs)) => Ok((parse_projection_list(keys)?, parse_projection_list(attrs)?)),
        None => Ok((parse_projection_list(raw)?, Vec::new())),
    }
}

fn bad_syntax(
    what: &str,
    input: &str,
    err: nom::Err<errors::UrlParsingError<'_>>,
) -> RestError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            RestError::BadSyntax(format!("cannot parse {} \"{}\": {}", what, input, e))
        }
        nom::Err::Incomplete(_) => {
            RestError::BadSyntax(format!("cannot parse {} \"{}\": incomplete", what, input))
        }
    }
}
