//! Request session and cache validation
//!
//! One `Session` per request carries the correlation id, the client
//! identity extracted from headers, and the vary set. It computes the
//! strong ETag and evaluates RFC 7232 preconditions; the transaction
//! envelope that consumes it lives in `server::envelope`.

use axum::http::{header, HeaderMap};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::RestError;

const DATA_VERSION_SQL: &str = "SELECT pg_current_snapshot()::text";

lazy_static! {
    // One quoted entry, optionally weak, then the unscanned rest. A leading
    // comma is tolerated the way lenient parsers have always taken it.
    static ref ETAG_ENTRY: Regex =
        Regex::new(r#"^,?\s*(?P<first>(W/)?"(?:[^"\\]|\\.)*")(?P<rest>.*)$"#).expect("static regex");
    static ref ETAG_WILDCARD: Regex = Regex::new(r"^,?\s*\*(?P<rest>.*)$").expect("static regex");
}

/// Parsed precondition list: quoted tags (with their strength flag) plus
/// whether `*` appeared.
#[derive(Debug, Default, PartialEq)]
pub struct ClientEtags {
    pub tags: Vec<(String, bool)>,
    pub wildcard: bool,
}

impl ClientEtags {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && !self.wildcard
    }

    pub fn contains(&self, etag: &str) -> bool {
        self.tags.iter().any(|(tag, _)| tag == etag)
    }
}

/// Parse an If-Match / If-None-Match header value.
pub fn parse_client_etags(header: &str) -> ClientEtags {
    let mut result = ClientEtags::default();
    let mut rest = header.trim();
    while !rest.is_empty() {
        if let Some(caps) = ETAG_ENTRY.captures(rest) {
            let mut tag = caps.name("first").expect("group in pattern").as_str();
            let strong = !tag.starts_with("W/");
            if !strong {
                tag = &tag[2..];
            }
            result.tags.push((tag.to_string(), strong));
            rest = caps.name("rest").expect("group in pattern").as_str().trim();
            continue;
        }
        if let Some(caps) = ETAG_WILDCARD.captures(rest) {
            result.wildcard = true;
            rest = caps.name("rest").expect("group in pattern").as_str().trim();
            continue;
        }
        break;
    }
    result
}

pub struct Session {
    pub correlation_id: Uuid,
    pub client: String,
    pub attributes: Vec<String>,
    pub max_retries: u32,
    vary_cookie: bool,
    vary_accept: bool,
}

impl Session {
    /// Build the per-request session from configuration and the identity
    /// context the authentication layer placed in headers.
    pub fn new(config: &ServerConfig, headers: &HeaderMap) -> Session {
        let client = headers
            .get("x-ermgate-client")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string();
        let attributes = headers
            .get("x-ermgate-attributes")
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Session {
            correlation_id: Uuid::new_v4(),
            client,
            attributes,
            max_retries: config.max_retries,
            vary_cookie: config.vary_cookie,
            vary_accept: config.vary_accept,
        }
    }

    pub fn vary_header(&self) -> String {
        let mut parts = Vec::new();
        if self.vary_cookie {
            parts.push("Cookie");
        }
        if self.vary_accept {
            parts.push("Accept");
        }
        parts.join(", ")
    }

    /// Compute the strong ETag from the data-version token. Components the
    /// response does not vary on collapse to `*`.
    pub fn make_etag(&self, version: &str, accept: &str) -> String {
        let client = if self.vary_cookie { self.client.as_str() } else { "*" };
        let accept = if self.vary_accept { accept } else { "*" };
        let joined = format!("{};{};{}", client, accept, version);
        format!("\"{}\"", joined.replace('"', "\\\""))
    }

    /// Evaluate If-Match / If-None-Match against the computed ETag.
    /// Failure is 304 for GET/HEAD and 412 otherwise, carrying the headers
    /// RFC 7232 requires.
    pub fn check_preconditions(
        &self,
        headers: &HeaderMap,
        etag: &str,
        is_get: bool,
    ) -> Result<(), RestError> {
        let mut failed = false;

        let if_match = headers
            .get(header::IF_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(parse_client_etags)
            .unwrap_or_default();
        if !if_match.is_empty() && !if_match.wildcard && !if_match.contains(etag) {
            failed = true;
        }

        let if_none_match = headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(parse_client_etags)
            .unwrap_or_default();
        if !if_none_match.is_empty() && (if_none_match.wildcard || if_none_match.contains(etag)) {
            failed = true;
        }

        if !failed {
            return Ok(());
        }
        let etag = etag.to_string();
        let vary = self.vary_header();
        if is_get {
            Err(RestError::NotModified { etag, vary })
        } else {
            Err(RestError::PreconditionFailed { etag, vary })
        }
    }
}

/// Read the opaque data-version token inside the request's transaction, so
/// the ETag is consistent with the rows the transaction can see.
pub async fn data_version(txn: &tokio_postgres::Transaction<'_>) -> Result<String, RestError> {
    let row = txn.query_one(DATA_VERSION_SQL, &[]).await?;
    Ok(row.get::<_, String>(0))
}
