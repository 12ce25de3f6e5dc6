//! Sort, page-key, and limit semantics.

use ermgate::errors::RestError;
use ermgate::sql::{render_query, QueryShape};

use super::common::{build_path, fixture_model};

#[test]
fn after_page_is_tuple_inequality() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(name,id)@after(alice,7)").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, Some(2)).unwrap();
    assert!(sql.contains(
        "WHERE ((s.\"name\" > 'alice') OR (s.\"name\" = 'alice' AND s.\"id\" > '7'))"
    ));
    assert!(sql.contains("ORDER BY \"name\", \"id\""));
    assert!(sql.trim_end().ends_with("LIMIT 2"));
}

#[test]
fn before_page_scans_backwards_and_restores_order() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(name)@before(carol)").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, Some(3)).unwrap();
    assert!(sql.contains("s.\"name\" < 'carol'"));
    // Inner scan inverted (tiebreak included), outer restores.
    assert!(sql.contains("ORDER BY \"name\" DESC, \"id\" DESC"));
    assert!(sql.trim_end().ends_with("ORDER BY \"name\", \"id\""));
}

#[test]
fn descending_sort_key() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(name::desc::)@after(carol)").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    // Descending keys page with the mirrored comparison.
    assert!(sql.contains("s.\"name\" < 'carol'"));
    assert!(sql.contains("ORDER BY \"name\" DESC, \"id\""));
}

#[test]
fn sort_appends_row_key_tiebreak() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(name)").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("ORDER BY \"name\", \"id\""));
}

#[test]
fn page_key_arity_mismatch_is_bad_request() {
    let model = fixture_model();
    let err = build_path(&model, "S:people@sort(name,id)@after(alice)").unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    match err {
        RestError::BadSyntax(message) => {
            assert!(message.contains("does not match the \"sort\" key"));
        }
        other => panic!("expected BadSyntax, got {:?}", other),
    }
}

#[test]
fn page_without_sort_is_bad_request() {
    let model = fixture_model();
    let err = build_path(&model, "S:people@after(alice)").unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[test]
fn limit_only_wraps_without_order() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, Some(10)).unwrap();
    assert!(sql.trim_end().ends_with("LIMIT 10"));
    assert!(!sql.contains("ORDER BY"));
}

#[test]
fn no_limit_no_wrapper() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(!sql.contains("FROM (\n"));
}
