//! SELECT generation
//!
//! Renders a frozen entity path plus an optional projection into SQL text.
//! Every path element becomes a table reference aliased `tN` by position;
//! the element's bound link decides which side's columns form the equi-join
//! predicate. Sort, paging, and limit are applied in an outer query over
//! the projection's output names, so `DISTINCT` and `GROUP BY` cores never
//! interfere with ordering.

use crate::catalog::{LinkDirection, Model, Table, TableId};
use crate::datapath::{BoundFilter, EntityPath, FilterOp, ProjectionItem};

use super::errors::SqlError;
use super::literal::{sql_identifier, sql_literal};

#[derive(Debug, Clone, Copy)]
pub enum QueryShape<'a> {
    Entity,
    Attributes(&'a [ProjectionItem]),
    AttributeGroup {
        keys: &'a [ProjectionItem],
        attributes: &'a [ProjectionItem],
    },
    Aggregate(&'a [ProjectionItem]),
}

/// Declared types the driver decodes natively; everything else is cast in
/// the select list so rows survive the wire.
fn cast_for(sql_type: &str) -> Option<&'static str> {
    match sql_type {
        "smallint" | "integer" | "bigint" | "boolean" | "real" | "double precision" | "text"
        | "character varying" | "character" | "name" | "json" | "jsonb" | "uuid" | "date"
        | "time without time zone" | "timestamp without time zone"
        | "timestamp with time zone" => None,
        "numeric" => Some("float8"),
        _ => Some("text"),
    }
}

/// `tN."col"`, with a decode cast when the declared type needs one.
pub fn column_expr(model: &Model, table: TableId, pos: usize, column: &str) -> String {
    let base = format!("t{}.{}", pos, sql_identifier(column));
    match model.table(table).column(column).and_then(|c| cast_for(&c.sql_type)) {
        Some(cast) => format!("({})::{}", base, cast),
        None => base,
    }
}

/// Cast applied to a bare column in RETURNING lists.
pub fn returning_expr(table: &Table, column: &str) -> String {
    let base = sql_identifier(column);
    match table.column(column).and_then(|c| cast_for(&c.sql_type)) {
        Some(cast) => format!("({})::{} AS {}", base, cast, sql_identifier(column)),
        None => base,
    }
}

pub fn render_from(model: &Model, path: &EntityPath) -> String {
    let mut out = String::new();
    for element in path.elements() {
        let table = model.table(element.table);
        let table_ref = format!(
            "{}.{} AS t{}",
            sql_identifier(&table.schema),
            sql_identifier(&table.name),
            element.pos
        );
        match &element.link {
            None => {
                out.push_str("FROM ");
                out.push_str(&table_ref);
            }
            Some(link) => {
                let fk = model.fkey(link.fkey);
                let key_cols = &model.table(fk.ref_table).uniques[fk.ref_key].columns;
                let (src_cols, dst_cols) = match link.direction {
                    // Source element holds the foreign key.
                    LinkDirection::LeftToRight => (&fk.columns, key_cols),
                    // Source element holds the referenced key.
                    LinkDirection::RightToLeft => (key_cols, &fk.columns),
                };
                let on: Vec<String> = src_cols
                    .iter()
                    .zip(dst_cols.iter())
                    .map(|(s, d)| {
                        format!(
                            "t{}.{} = t{}.{}",
                            link.source,
                            sql_identifier(s),
                            element.pos,
                            sql_identifier(d)
                        )
                    })
                    .collect();
                out.push_str(&format!("\nJOIN {} ON {}", table_ref, on.join(" AND ")));
            }
        }
    }
    out
}

pub fn render_where(path: &EntityPath) -> Option<String> {
    let preds: Vec<String> = path
        .elements()
        .iter()
        .flat_map(|e| e.filters.iter())
        .map(render_filter)
        .collect();
    if preds.is_empty() {
        None
    } else {
        Some(preds.join(" AND "))
    }
}

fn render_filter(filter: &BoundFilter) -> String {
    match filter {
        BoundFilter::Pred {
            column,
            pos,
            op,
            value,
        } => {
            let value = value.as_deref().unwrap_or("");
            if column.is_freetext() {
                return match op {
                    FilterOp::Null => format!("t{}::text IS NULL", pos),
                    _ => format!(
                        "t{}::text ILIKE {}",
                        pos,
                        sql_literal(&format!("%{}%", value))
                    ),
                };
            }
            let lhs = format!("t{}.{}", pos, sql_identifier(&column.column));
            match op {
                FilterOp::Eq => format!("{} = {}", lhs, sql_literal(value)),
                FilterOp::Lt => format!("{} < {}", lhs, sql_literal(value)),
                FilterOp::Leq => format!("{} <= {}", lhs, sql_literal(value)),
                FilterOp::Gt => format!("{} > {}", lhs, sql_literal(value)),
                FilterOp::Geq => format!("{} >= {}", lhs, sql_literal(value)),
                FilterOp::Like => format!("({})::text LIKE {}", lhs, sql_literal(value)),
                FilterOp::Regexp => format!("({})::text ~ {}", lhs, sql_literal(value)),
                FilterOp::Ciregexp => format!("({})::text ~* {}", lhs, sql_literal(value)),
                FilterOp::Ts => format!(
                    "({})::text ILIKE {}",
                    lhs,
                    sql_literal(&format!("%{}%", value))
                ),
                FilterOp::Null => format!("{} IS NULL", lhs),
            }
        }
        BoundFilter::Neg(inner) => format!("NOT ({})", render_filter(inner)),
        BoundFilter::Conj(parts) => {
            let rendered: Vec<String> = parts.iter().map(render_filter).collect();
            format!("({})", rendered.join(" AND "))
        }
        BoundFilter::Disj(parts) => {
            let rendered: Vec<String> = parts.iter().map(render_filter).collect();
            format!("({})", rendered.join(" OR "))
        }
    }
}

fn projection_expr(model: &Model, item: &ProjectionItem) -> String {
    if item.is_row_count() {
        return "count(*)".to_string();
    }
    let operand = column_expr(model, item.column.table, item.pos, &item.column.column);
    match item.aggregate {
        Some(agg) => agg.render(&operand),
        None => operand,
    }
}

/// The core SELECT (no ordering, paging, or limit), plus its output names.
fn render_core(
    model: &Model,
    path: &EntityPath,
    shape: QueryShape<'_>,
) -> Result<(String, Vec<String>), SqlError> {
    let mut select_list: Vec<String> = Vec::new();
    let mut outputs: Vec<String> = Vec::new();
    let mut distinct = false;
    let mut group_by: Vec<String> = Vec::new();

    match shape {
        QueryShape::Entity => {
            let tail = path.tail_position();
            let table = model.table(path.tail_table());
            for col in table.columns_in_order() {
                select_list.push(format!(
                    "{} AS {}",
                    column_expr(model, path.tail_table(), tail, &col.name),
                    sql_identifier(&col.name)
                ));
                outputs.push(col.name.clone());
            }
            // A joined path denotes the set of reachable tail rows.
            distinct = path.len() > 1;
        }
        QueryShape::Attributes(items) => {
            for item in items {
                if item.aggregate.is_some() {
                    return Err(SqlError::AggregateNotAllowed {
                        name: item.name.to_string(),
                    });
                }
                let out = item.output_name();
                select_list.push(format!(
                    "{} AS {}",
                    projection_expr(model, item),
                    sql_identifier(&out)
                ));
                outputs.push(out);
            }
        }
        QueryShape::AttributeGroup { keys, attributes } => {
            for item in keys {
                if item.aggregate.is_some() {
                    return Err(SqlError::AggregateNotAllowed {
                        name: item.name.to_string(),
                    });
                }
                let expr = projection_expr(model, item);
                let out = item.output_name();
                select_list.push(format!("{} AS {}", expr, sql_identifier(&out)));
                group_by.push(expr);
                outputs.push(out);
            }
            for item in attributes {
                if item.aggregate.is_none() {
                    return Err(SqlError::AggregateRequired {
                        name: item.name.to_string(),
                    });
                }
                let out = item.output_name();
                select_list.push(format!(
                    "{} AS {}",
                    projection_expr(model, item),
                    sql_identifier(&out)
                ));
                outputs.push(out);
            }
        }
        QueryShape::Aggregate(items) => {
            for item in items {
                if item.aggregate.is_none() {
                    return Err(SqlError::AggregateRequired {
                        name: item.name.to_string(),
                    });
                }
                let out = item.output_name();
                select_list.push(format!(
                    "{} AS {}",
                    projection_expr(model, item),
                    sql_identifier(&out)
                ));
                outputs.push(out);
            }
        }
    }

    let mut sql = format!(
        "SELECT {}{}\n{}",
        if distinct { "DISTINCT " } else { "" },
        select_list.join(", "),
        render_from(model, path)
    );
    if let Some(cond) = render_where(path) {
        sql.push_str("\nWHERE ");
        sql.push_str(&cond);
    }
    if !group_by.is_empty() {
        sql.push_str("\nGROUP BY ");
        sql.push_str(&group_by.join(", "));
    }
    Ok((sql, outputs))
}

/// Sort entries as (output name, descending), validated against the output
/// list and extended with a stable row-key tiebreak when the key columns
/// are part of the output.
fn sort_entries(
    model: &Model,
    path: &EntityPath,
    shape: QueryShape<'_>,
    outputs: &[String],
) -> Result<Vec<(String, bool)>, SqlError> {
    let mut entries: Vec<(String, bool)> = Vec::new();
    for key in path.sort() {
        let name = key.name.to_string();
        if !outputs.contains(&name) {
            return Err(SqlError::SortKeyNotInOutput { key: name });
        }
        entries.push((name, key.descending));
    }
    if entries.is_empty() {
        return Ok(entries);
    }

    // Tiebreak on the addressed entity's row key, when visible.
    let tiebreak_ok = matches!(shape, QueryShape::Entity | QueryShape::Attributes(_));
    if tiebreak_ok {
        if let Some(key) = model.table(path.tail_table()).row_key() {
            if key.columns.iter().all(|c| outputs.contains(c)) {
                for col in &key.columns {
                    if !entries.iter().any(|(n, _)| n == col) {
                        entries.push((col.clone(), false));
                    }
                }
            }
        }
    }
    Ok(entries)
}

/// Tuple inequality over the sort key, expanded per column so descending
/// keys compare in their own direction.
fn page_predicate(entries: &[(String, bool)], values: &[String], after: bool) -> String {
    let mut ors: Vec<String> = Vec::new();
    for (i, (name, descending)) in entries.iter().take(values.len()).enumerate() {
        let mut ands: Vec<String> = (0..i)
            .map(|j| format!("s.{} = {}", sql_identifier(&entries[j].0), sql_literal(&values[j])))
            .collect();
        let forward = after != *descending;
        let op = if forward { ">" } else { "<" };
        ands.push(format!(
            "s.{} {} {}",
            sql_identifier(name),
            op,
            sql_literal(&values[i])
        ));
        ors.push(format!("({})", ands.join(" AND ")));
    }
    format!("({})", ors.join(" OR "))
}

fn order_clause(entries: &[(String, bool)], invert: bool) -> String {
    let keys: Vec<String> = entries
        .iter()
        .map(|(name, descending)| {
            let desc = *descending != invert;
            format!(
                "{}{}",
                sql_identifier(name),
                if desc { " DESC" } else { "" }
            )
        })
        .collect();
    format!("ORDER BY {}", keys.join(", "))
}

/// Render the complete query for a frozen path and shape.
pub fn render_query(
    model: &Model,
    path: &EntityPath,
    shape: QueryShape<'_>,
    limit: Option<u64>,
) -> Result<String, SqlError> {
    let (core, outputs) = render_core(model, path, shape)?;
    let entries = sort_entries(model, path, shape, &outputs)?;

    let needs_wrap = !entries.is_empty() || limit.is_some();
    if !needs_wrap {
        return Ok(core);
    }

    let mut preds: Vec<String> = Vec::new();
    if let Some(values) = path.after() {
        preds.push(page_predicate(&entries, values, true));
    }
    if let Some(values) = path.before() {
        preds.push(page_predicate(&entries, values, false));
    }
    // A bare "before" page reads backwards and is re-ordered by one more
    // wrapper; the streamer never buffers to reverse.
    let backwards = path.before().is_some() && path.after().is_none();

    let mut sql = format!("SELECT * FROM (\n{}\n) AS s", core);
    if !preds.is_empty() {
        sql.push_str("\nWHERE ");
        sql.push_str(&preds.join(" AND "));
    }
    if !entries.is_empty() {
        sql.push('\n');
        sql.push_str(&order_clause(&entries, backwards));
    }
    if let Some(n) = limit {
        sql.push_str(&format!("\nLIMIT {}", n));
    }

    if backwards {
        sql = format!(
            "SELECT * FROM (\n{}\n) AS s\n{}",
            sql,
            order_clause(&entries, false)
        );
    }
    Ok(sql)
}
