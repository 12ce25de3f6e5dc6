//! Wire-level types: content negotiation and query options.

use std::collections::{HashMap, HashSet};

use percent_encoding::percent_decode_str;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::errors::RestError;

/// Supported representations for reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    Json,
    Csv,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Csv => "text/csv",
        }
    }

    pub fn from_mime(value: &str) -> Option<ContentType> {
        let parsed: mime::Mime = value.trim().parse().ok()?;
        if parsed.type_() == mime::APPLICATION && parsed.subtype() == mime::JSON {
            Some(ContentType::Json)
        } else if parsed.type_() == mime::TEXT && parsed.subtype() == "csv" {
            Some(ContentType::Csv)
        } else {
            None
        }
    }

    /// Pick the response representation from an Accept header, falling back
    /// to `default` when the header is absent or only wildcards match.
    pub fn negotiate(accept: Option<&str>, default: ContentType) -> ContentType {
        let Some(accept) = accept else {
            return default;
        };
        for entry in accept.split(',') {
            let entry = entry.split(';').next().unwrap_or("").trim();
            if entry == "*/*" || entry.is_empty() {
                return default;
            }
            if let Some(ct) = ContentType::from_mime(entry) {
                return ct;
            }
        }
        default
    }
}

/// Query options parsed from the request's query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOpts {
    opts: HashMap<String, String>,
}

impl QueryOpts {
    pub fn parse(query: Option<&str>) -> QueryOpts {
        let mut opts = HashMap::new();
        if let Some(query) = query {
            for pair in query.split('&') {
                if pair.is_empty() {
                    continue;
                }
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let key = percent_decode_str(key).decode_utf8_lossy().into_owned();
                let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
                opts.insert(key, value);
            }
        }
        QueryOpts { opts }
    }

    /// The negotiated row limit: the `limit` parameter (integer or the
    /// literal string `none`), falling back to the configured default.
    pub fn negotiated_limit(&self, config: &ServerConfig) -> Result<Option<u64>, RestError> {
        match self.opts.get("limit") {
            None => Ok(Some(config.default_limit)),
            Some(value) if value.eq_ignore_ascii_case("none") => Ok(None),
            Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
                RestError::BadSyntax(
                    "The \"limit\" query-parameter requires an integer or the string \"none\"."
                        .to_string(),
                )
            }),
        }
    }

    /// The `defaults` parameter: a comma-separated column list; a single
    /// name is a singleton set.
    pub fn defaults(&self) -> HashSet<String> {
        match self.opts.get("defaults") {
            None => HashSet::new(),
            Some(value) => value
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }
}
