//! End-to-end path semantics: URL text in, bound path and SQL text out.

use ermgate::catalog::LinkDirection;
use ermgate::errors::RestError;
use ermgate::sql::{render_query, QueryShape};

use super::common::{build_path, fixture_model};

#[test]
fn simple_entity_path() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert_eq!(
        sql,
        "SELECT t0.\"id\" AS \"id\", t0.\"name\" AS \"name\", t0.\"dept_id\" AS \"dept_id\"\nFROM \"S\".\"people\" AS t0"
    );
}

#[test]
fn inferred_join_left_to_right() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/S:dept").unwrap();
    assert_eq!(path.len(), 2);
    let link = path.elements()[1].link.as_ref().unwrap();
    assert_eq!(link.direction, LinkDirection::LeftToRight);

    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    // Join inferred with no explicit column in the URL; dept rows returned.
    assert!(sql.contains("JOIN \"S\".\"dept\" AS t1 ON t0.\"dept_id\" = t1.\"id\""));
    assert!(sql.starts_with("SELECT DISTINCT t1.\"id\" AS \"id\""));
}

#[test]
fn ambiguous_link_reported() {
    let model = fixture_model();
    let err = build_path(&model, "Sales:orders/Sales:customer").unwrap_err();
    match &err {
        RestError::ConflictModel(message) => {
            assert_eq!(
                message,
                "Ambiguous links found between tables orders and customer"
            );
        }
        other => panic!("expected ConflictModel, got {:?}", other),
    }
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
}

#[test]
fn no_link_reported() {
    let model = fixture_model();
    let err = build_path(&model, "S:employee/S:dept").unwrap_err();
    match err {
        RestError::ConflictModel(message) => {
            assert_eq!(message, "No link found between tables employee and dept");
        }
        other => panic!("expected ConflictModel, got {:?}", other),
    }
}

#[test]
fn inferred_self_link_rejected() {
    let model = fixture_model();
    let err = build_path(&model, "S:employee/S:employee").unwrap_err();
    match err {
        RestError::ConflictModel(message) => {
            assert_eq!(message, "Ambiguous self-link for table S:employee");
        }
        other => panic!("expected ConflictModel, got {:?}", other),
    }
}

#[test]
fn explicit_self_join_allowed() {
    let model = fixture_model();
    let path = build_path(&model, "S:employee/M:=(manager_id)").unwrap();
    assert_eq!(path.len(), 2);
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("JOIN \"S\".\"employee\" AS t1 ON t0.\"manager_id\" = t1.\"id\""));
}

#[test]
fn alias_and_context_filter() {
    let model = fixture_model();
    // Scenario: filter on people.name while the addressed entity set stays
    // the dept tail.
    let path = build_path(&model, "P:=S:people/S:dept/$P/name=alice").unwrap();
    assert_eq!(path.tail_position(), 1);
    assert_eq!(path.context_position(), 0);

    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.starts_with("SELECT DISTINCT t1.\"id\""));
    assert!(sql.contains("WHERE t0.\"name\" = 'alice'"));
}

#[test]
fn context_then_further_links() {
    let model = fixture_model();
    // After $P the next inferred link departs from people again.
    let path = build_path(&model, "P:=S:people/S:dept/$P/S:dept").unwrap();
    assert_eq!(path.len(), 3);
    let link = path.elements()[2].link.as_ref().unwrap();
    assert_eq!(link.source, 0);
}

#[test]
fn alias_filter_without_context_shift() {
    let model = fixture_model();
    let path = build_path(&model, "P:=S:people/S:dept/P:name=alice").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    // The alias pins the predicate to position 0 even though the context
    // is the tail.
    assert!(sql.contains("WHERE t0.\"name\" = 'alice'"));
}

#[test]
fn unbound_alias_in_filter_rejected() {
    let model = fixture_model();
    let err = build_path(&model, "S:people/Z:name=alice").unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
}

#[test]
fn unbound_context_alias_is_bad_data() {
    let model = fixture_model();
    let err = build_path(&model, "S:people/$Z").unwrap_err();
    match err {
        RestError::BadData(message) => {
            assert!(message.contains("not a bound alias"));
        }
        other => panic!("expected BadData, got {:?}", other),
    }
}

#[test]
fn unqualified_table_requires_unambiguity() {
    let model = fixture_model();
    // "people" exists only in S, so the bare name resolves.
    assert!(build_path(&model, "people").is_ok());
    // Unknown tables are conflicts against the model.
    let err = build_path(&model, "nonesuch").unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
}

#[test]
fn filter_disjunction_renders_parenthesized() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=a;name=b").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("WHERE (t0.\"name\" = 'a' OR t0.\"name\" = 'b')"));
}

#[test]
fn filters_conjoin_across_segments() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=a/id::gt::3").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("WHERE t0.\"name\" = 'a' AND t0.\"id\" > '3'"));
}

#[test]
fn freetext_filter_over_row() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/*::ts::ali").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("t0::text ILIKE '%ali%'"));
}

#[test]
fn sql_injection_is_quoted_out() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=a'%3B%20DROP%20TABLE%20x--").unwrap();
    let sql = render_query(&model, &path, QueryShape::Entity, None).unwrap();
    assert!(sql.contains("t0.\"name\" = 'a''; DROP TABLE x--'"));
}
