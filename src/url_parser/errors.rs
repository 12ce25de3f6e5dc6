use nom::error::{ContextError, ParseError};
use std::fmt;

#[derive(Debug, PartialEq)]
pub struct UrlParsingError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> ParseError<&'a str> for UrlParsingError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        UrlParsingError {
            errors: vec![(input, "unknown error")],
        }
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "unknown error (appended)"));
        other
    }
}

impl<'a> ContextError<&'a str> for UrlParsingError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for UrlParsingError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {}", ctx, input)?;
        }
        Ok(())
    }
}

impl<'a> From<nom::error::Error<&'a str>> for UrlParsingError<'a> {
    fn from(err: nom::error::Error<&'a str>) -> Self {
        UrlParsingError {
            errors: vec![(err.input, "Unable to parse")],
        }
    }
}
