//! Write generation
//!
//! Entity writes land on the path's base table: POST renders an insert-only
//! INSERT, PUT an insert-or-update with `ON CONFLICT` over the key the input
//! rows cover, and `defaults` names columns whose values the database
//! supplies. Entity DELETE and attribute DELETE address rows through the
//! rendered path, keyed by `ctid` so tables without declared keys still
//! delete correctly.

use std::collections::HashSet;

use serde_json::Value;

use crate::catalog::{Model, Table};
use crate::datapath::{EntityPath, ProjectionItem};

use super::errors::SqlError;
use super::literal::{sql_identifier, sql_json_literal};
use super::select::{render_from, render_where, returning_expr};

/// A parsed, homogeneous input row set.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteInput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn qualified(table: &Table) -> String {
    format!(
        "{}.{}",
        sql_identifier(&table.schema),
        sql_identifier(&table.name)
    )
}

fn returning_list(table: &Table) -> String {
    table
        .columns_in_order()
        .iter()
        .map(|c| returning_expr(table, &c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The key discipline for upserts: the first unique key (primary key first)
/// whose columns are all present in the insert column list.
fn input_key<'t>(table: &'t Table, columns: &[String]) -> Option<&'t [String]> {
    let mut keys: Vec<&crate::catalog::UniqueKey> = table.uniques.iter().collect();
    keys.sort_by_key(|k| !k.is_primary);
    keys.iter()
        .find(|k| k.columns.iter().all(|c| columns.contains(c)))
        .map(|k| k.columns.as_slice())
}

/// Render an entity write. `allow_existing` selects PUT's insert-or-update
/// semantics; POST passes false and lets key collisions surface as
/// conflicts.
pub fn render_insert(
    table: &Table,
    input: &WriteInput,
    defaults: &HashSet<String>,
    allow_existing: bool,
) -> Result<String, SqlError> {
    for col in &input.columns {
        if !table.has_column(col) {
            return Err(SqlError::UnknownInputColumn {
                column: col.clone(),
                table: table.to_string(),
            });
        }
    }
    for col in defaults {
        if !table.has_column(col) {
            return Err(SqlError::UnknownDefaultColumn {
                column: col.clone(),
                table: table.to_string(),
            });
        }
    }

    let insert_cols: Vec<&String> = input
        .columns
        .iter()
        .filter(|c| !defaults.contains(*c))
        .collect();
    let col_indices: Vec<usize> = input
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !defaults.contains(*c))
        .map(|(i, _)| i)
        .collect();

    let mut sql = format!(
        "INSERT INTO {} ({})\nVALUES ",
        qualified(table),
        insert_cols
            .iter()
            .map(|c| sql_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let rows: Vec<String> = input
        .rows
        .iter()
        .map(|row| {
            let vals: Vec<String> = col_indices
                .iter()
                .map(|&i| sql_json_literal(&row[i]))
                .collect();
            format!("({})", vals.join(", "))
        })
        .collect();
    sql.push_str(&rows.join(",\n       "));

    if allow_existing {
        let insert_col_names: Vec<String> = insert_cols.iter().map(|c| (*c).clone()).collect();
        let key = input_key(table, &insert_col_names).ok_or_else(|| SqlError::NoInputKey {
            table: table.to_string(),
        })?;
        let non_key: Vec<&String> = insert_cols
            .iter()
            .filter(|c| !key.contains(*c))
            .copied()
            .collect();
        let updates: Vec<String> = if non_key.is_empty() {
            // Touch a key column with itself so RETURNING still emits the row.
            vec![format!(
                "{} = EXCLUDED.{}",
                sql_identifier(&key[0]),
                sql_identifier(&key[0])
            )]
        } else {
            non_key
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", sql_identifier(c), sql_identifier(c)))
                .collect()
        };
        sql.push_str(&format!(
            "\nON CONFLICT ({}) DO UPDATE SET {}",
            key.iter()
                .map(|c| sql_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
            updates.join(", ")
        ));
    }

    sql.push_str(&format!("\nRETURNING {}", returning_list(table)));
    Ok(sql)
}

/// Addressed-row subquery over the rendered path, selecting the tail
/// element's `ctid`.
fn addressed_rows(model: &Model, path: &EntityPath) -> String {
    let mut sub = format!(
        "SELECT t{}.ctid\n{}",
        path.tail_position(),
        render_from(model, path)
    );
    if let Some(cond) = render_where(path) {
        sub.push_str("\nWHERE ");
        sub.push_str(&cond);
    }
    sub
}

/// Entity DELETE: remove the rows the path denotes.
pub fn render_delete(model: &Model, path: &EntityPath) -> String {
    let table = model.table(path.tail_table());
    format!(
        "DELETE FROM {} AS d\nWHERE d.ctid IN (\n{}\n)",
        qualified(table),
        addressed_rows(model, path)
    )
}

/// Attribute DELETE: null out the projected columns on the addressed
/// entity set. Only non-key columns of the addressed entity may be
/// targeted.
pub fn render_attribute_delete(
    model: &Model,
    path: &EntityPath,
    items: &[ProjectionItem],
) -> Result<String, SqlError> {
    let table = model.table(path.tail_table());
    let key_cols: HashSet<&String> = table
        .row_key()
        .map(|k| k.columns.iter().collect())
        .unwrap_or_default();

    let mut sets: Vec<String> = Vec::new();
    for item in items {
        if item.column.table != path.tail_table() || item.column.is_freetext() {
            return Err(SqlError::AttributeDeleteNotTail {
                column: item.name.to_string(),
            });
        }
        if key_cols.contains(&item.column.column) {
            return Err(SqlError::AttributeDeleteKeyColumn {
                column: item.column.column.clone(),
            });
        }
        sets.push(format!("{} = NULL", sql_identifier(&item.column.column)));
    }

    Ok(format!(
        "UPDATE {} AS u\nSET {}\nWHERE u.ctid IN (\n{}\n)",
        qualified(table),
        sets.join(", "),
        addressed_rows(model, path)
    ))
}
