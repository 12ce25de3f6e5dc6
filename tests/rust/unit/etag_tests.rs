//! ETag computation and RFC 7232 precondition handling.

use axum::http::{header, HeaderMap};
use ermgate::config::ServerConfig;
use ermgate::errors::RestError;
use ermgate::server::session::{parse_client_etags, Session};

fn session_with(vary_cookie: bool, vary_accept: bool, client: Option<&str>) -> Session {
    let config = ServerConfig {
        vary_cookie,
        vary_accept,
        ..Default::default()
    };
    let mut headers = HeaderMap::new();
    if let Some(client) = client {
        headers.insert("x-ermgate-client", client.parse().unwrap());
    }
    Session::new(&config, &headers)
}

#[test]
fn etag_is_strong_and_double_quoted() {
    let session = session_with(true, true, Some("alice"));
    let etag = session.make_etag("snap-1", "application/json");
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert!(!etag.starts_with("W/"));
    assert_eq!(etag, "\"alice;application/json;snap-1\"");
}

#[test]
fn etag_varies_with_client_and_version() {
    let alice = session_with(true, true, Some("alice"));
    let bob = session_with(true, true, Some("bob"));
    assert_ne!(
        alice.make_etag("v", "application/json"),
        bob.make_etag("v", "application/json")
    );
    assert_ne!(
        alice.make_etag("v1", "application/json"),
        alice.make_etag("v2", "application/json")
    );
}

#[test]
fn unvaried_components_collapse() {
    let session = session_with(false, false, Some("alice"));
    assert_eq!(session.make_etag("v", "text/csv"), "\"*;*;v\"");
}

#[test]
fn embedded_quotes_are_escaped() {
    let session = session_with(true, false, Some("o\"ops"));
    let etag = session.make_etag("v", "");
    assert!(etag.contains("o\\\"ops"));
}

#[test]
fn rfc7232_list_parsing() {
    let parsed = parse_client_etags("W/\"weak\", \"strong\", *");
    assert_eq!(parsed.tags.len(), 2);
    assert_eq!(parsed.tags[0], ("\"weak\"".to_string(), false));
    assert_eq!(parsed.tags[1], ("\"strong\"".to_string(), true));
    assert!(parsed.wildcard);

    let empty = parse_client_etags("");
    assert!(empty.is_empty());
}

#[test]
fn if_none_match_current_etag_gets_304_on_get() {
    let session = session_with(true, true, None);
    let etag = session.make_etag("v", "application/json");
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_NONE_MATCH, etag.parse().unwrap());
    match session.check_preconditions(&headers, &etag, true).unwrap_err() {
        RestError::NotModified { etag: e, vary } => {
            assert_eq!(e, etag);
            assert_eq!(vary, "Cookie, Accept");
        }
        other => panic!("expected NotModified, got {:?}", other),
    }
}

#[test]
fn if_none_match_current_etag_gets_412_on_put() {
    let session = session_with(true, true, None);
    let etag = session.make_etag("v", "application/json");
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_NONE_MATCH, etag.parse().unwrap());
    assert!(matches!(
        session.check_preconditions(&headers, &etag, false).unwrap_err(),
        RestError::PreconditionFailed { .. }
    ));
}

#[test]
fn if_match_stale_etag_fails() {
    let session = session_with(true, true, None);
    let current = session.make_etag("v2", "application/json");
    let stale = session.make_etag("v1", "application/json");
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_MATCH, stale.parse().unwrap());
    assert!(session.check_preconditions(&headers, &current, false).is_err());
}

#[test]
fn if_match_current_etag_passes() {
    let session = session_with(true, true, None);
    let etag = session.make_etag("v", "application/json");
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_MATCH, etag.parse().unwrap());
    assert!(session.check_preconditions(&headers, &etag, false).is_ok());
}

#[test]
fn wildcard_if_none_match_always_fails() {
    let session = session_with(true, true, None);
    let etag = session.make_etag("v", "application/json");
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_NONE_MATCH, "*".parse().unwrap());
    assert!(session.check_preconditions(&headers, &etag, true).is_err());
}
