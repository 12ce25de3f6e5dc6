//! Projection binding, wildcard expansion, and aggregate planning.

use ermgate::datapath::preprocess_projection;
use ermgate::sql::{render_query, QueryShape};
use ermgate::url_parser::parse_projection_list;

use super::common::{build_path, fixture_model};

#[test]
fn wildcard_expands_tail_columns_in_declared_order() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("*").unwrap()).unwrap();
    let outputs: Vec<String> = items.iter().map(|i| i.output_name()).collect();
    assert_eq!(outputs, vec!["id", "name", "dept_id"]);
}

#[test]
fn alias_wildcard_prefixes_output_names() {
    let model = fixture_model();
    let path = build_path(&model, "P:=S:people/S:dept").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("P:*").unwrap()).unwrap();
    let outputs: Vec<String> = items.iter().map(|i| i.output_name()).collect();
    assert_eq!(outputs, vec!["P:id", "P:name", "P:dept_id"]);

    let sql = render_query(&model, &path, QueryShape::Attributes(&items), None).unwrap();
    assert!(sql.contains("t0.\"id\" AS \"P:id\""));
    assert!(sql.contains("t0.\"dept_id\" AS \"P:dept_id\""));
}

#[test]
fn mixed_projection_with_aliases() {
    let model = fixture_model();
    let path = build_path(&model, "P:=S:people/S:dept").unwrap();
    let items = preprocess_projection(
        &model,
        &path,
        parse_projection_list("who:=P:name,name").unwrap(),
    )
    .unwrap();
    let sql = render_query(&model, &path, QueryShape::Attributes(&items), None).unwrap();
    assert!(sql.contains("t0.\"name\" AS \"who\""));
    assert!(sql.contains("t1.\"name\" AS \"name\""));
}

#[test]
fn wildcard_with_alias_label_rejected() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let err = preprocess_projection(&model, &path, parse_projection_list("all:=*").unwrap())
        .unwrap_err();
    assert!(err.to_string().contains("cannot be given an alias"));
}

#[test]
fn aggregate_endpoint_requires_functions() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("name").unwrap()).unwrap();
    let err = render_query(&model, &path, QueryShape::Aggregate(&items), None).unwrap_err();
    assert!(err.to_string().contains("requires an aggregate function"));
}

#[test]
fn row_count_aggregate() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("n:=cnt(*)").unwrap())
            .unwrap();
    let sql = render_query(&model, &path, QueryShape::Aggregate(&items), None).unwrap();
    assert!(sql.contains("count(*) AS \"n\""));
}

#[test]
fn distinct_count_and_arrays() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let items = preprocess_projection(
        &model,
        &path,
        parse_projection_list("d:=cnt_d(dept_id),names:=array(name)").unwrap(),
    )
    .unwrap();
    let sql = render_query(&model, &path, QueryShape::Aggregate(&items), None).unwrap();
    assert!(sql.contains("count(DISTINCT t0.\"dept_id\") AS \"d\""));
    assert!(sql.contains("array_agg(t0.\"name\") AS \"names\""));
}

#[test]
fn group_by_keys_and_aggregates() {
    let model = fixture_model();
    let path = build_path(&model, "S:people").unwrap();
    let keys =
        preprocess_projection(&model, &path, parse_projection_list("dept_id").unwrap()).unwrap();
    let attrs = preprocess_projection(
        &model,
        &path,
        parse_projection_list("n:=cnt(*),top:=max(name)").unwrap(),
    )
    .unwrap();
    let sql = render_query(
        &model,
        &path,
        QueryShape::AttributeGroup {
            keys: &keys,
            attributes: &attrs,
        },
        None,
    )
    .unwrap();
    assert!(sql.contains("GROUP BY t0.\"dept_id\""));
    assert!(sql.contains("count(*) AS \"n\""));
    assert!(sql.contains("max(t0.\"name\") AS \"top\""));
}

#[test]
fn projected_sort_uses_output_names() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(who)").unwrap();
    let items = preprocess_projection(
        &model,
        &path,
        parse_projection_list("who:=name,id").unwrap(),
    )
    .unwrap();
    let sql = render_query(&model, &path, QueryShape::Attributes(&items), None).unwrap();
    assert!(sql.contains("ORDER BY \"who\", \"id\""));
}

#[test]
fn sort_key_missing_from_projection_rejected() {
    let model = fixture_model();
    let path = build_path(&model, "S:people@sort(name)").unwrap();
    let items =
        preprocess_projection(&model, &path, parse_projection_list("id").unwrap()).unwrap();
    let err = render_query(&model, &path, QueryShape::Attributes(&items), None).unwrap_err();
    assert!(err.to_string().contains("not in the output projection"));
}
