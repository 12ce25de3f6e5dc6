//! Write-path SQL: inserts, upserts, defaults, and deletes.

use std::collections::HashSet;

use ermgate::datapath::preprocess_projection;
use ermgate::server::streaming::parse_input_rows;
use ermgate::server::models::ContentType;
use ermgate::sql::{render_attribute_delete, render_delete, render_insert};
use ermgate::url_parser::parse_projection_list;

use super::common::{build_path, fixture_model};

#[test]
fn post_with_server_supplied_id() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(br#"[{"name": "c"}]"#, ContentType::Json).unwrap();
    let defaults: HashSet<String> = ["id".to_string()].into_iter().collect();

    let sql = render_insert(people, &input, &defaults, false).unwrap();
    assert!(sql.starts_with("INSERT INTO \"S\".\"people\" (\"name\")\nVALUES ('c')"));
    // The response echoes the inserted row with the database-assigned id.
    assert!(sql.contains("RETURNING \"id\", \"name\", \"dept_id\""));
}

#[test]
fn put_upserts_on_covered_key() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(
        br#"[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]"#,
        ContentType::Json,
    )
    .unwrap();

    let sql = render_insert(people, &input, &HashSet::new(), true).unwrap();
    assert!(sql.contains("VALUES (1, 'a'),\n       (2, 'b')"));
    assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""));
}

#[test]
fn null_and_bool_literals_render_natively() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(
        br#"[{"id": 3, "name": null, "dept_id": 4}]"#,
        ContentType::Json,
    )
    .unwrap();
    let sql = render_insert(people, &input, &HashSet::new(), true).unwrap();
    assert!(sql.contains("VALUES (3, NULL, 4)"));
}

#[test]
fn csv_input_round_trips_into_insert() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(b"id,name\n1,alice\n", ContentType::Csv).unwrap();
    let sql = render_insert(people, &input, &HashSet::new(), false).unwrap();
    assert!(sql.contains("VALUES ('1', 'alice')"));
}

#[test]
fn unknown_input_column_is_model_conflict() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(br#"[{"salary": 9}]"#, ContentType::Json).unwrap();
    let err = render_insert(people, &input, &HashSet::new(), false).unwrap_err();
    assert!(err.to_string().contains("salary"));
}

#[test]
fn unknown_default_column_rejected() {
    let model = fixture_model();
    let people = model.table(model.lookup_table(Some("S"), "people").unwrap());
    let input = parse_input_rows(br#"[{"name": "a"}]"#, ContentType::Json).unwrap();
    let defaults: HashSet<String> = ["nonesuch".to_string()].into_iter().collect();
    let err = render_insert(people, &input, &defaults, false).unwrap_err();
    assert!(err.to_string().contains("nonesuch"));
}

#[test]
fn delete_follows_path_filters() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=alice").unwrap();
    let sql = render_delete(&model, &path);
    assert!(sql.starts_with("DELETE FROM \"S\".\"people\" AS d"));
    assert!(sql.contains("WHERE d.ctid IN ("));
    assert!(sql.contains("t0.\"name\" = 'alice'"));
}

#[test]
fn delete_through_join_targets_tail() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=alice/S:dept").unwrap();
    let sql = render_delete(&model, &path);
    // The addressed entity set is the dept tail reachable from matching
    // people rows.
    assert!(sql.starts_with("DELETE FROM \"S\".\"dept\" AS d"));
    assert!(sql.contains("SELECT t1.ctid"));
}

#[test]
fn attribute_delete_nulls_non_key_columns() {
    let model = fixture_model();
    let path = build_path(&model, "S:people/name=alice").unwrap();
    let items = preprocess_projection(&model, &path, parse_projection_list("dept_id").unwrap())
        .unwrap();
    let sql = render_attribute_delete(&model, &path, &items).unwrap();
    assert!(sql.starts_with("UPDATE \"S\".\"people\" AS u\nSET \"dept_id\" = NULL"));
}

#[test]
fn attribute_delete_refuses_key_column() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("id").unwrap()).unwrap();
    assert!(render_attribute_delete(&model, &path, &items).is_err());
}
