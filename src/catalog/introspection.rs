//! Catalog introspection
//!
//! Builds a [`Model`] from a live database by reading the standard
//! `information_schema` views: columns, unique/primary key constraints, and
//! foreign keys joined to the unique constraints they reference. System
//! schemas are excluded. Order clauses keep the arena layout deterministic
//! so two introspections of an unchanged catalog produce identical models.

use tokio_postgres::GenericClient;

use super::errors::ModelError;
use super::model::{ColumnSpec, Model, ModelBuilder};
use crate::errors::RestError;

const COLUMNS_SQL: &str = "\
SELECT c.table_schema, c.table_name, c.column_name, c.data_type, c.is_nullable = 'YES'
FROM information_schema.columns c
WHERE c.table_schema NOT IN ('pg_catalog', 'information_schema')
ORDER BY c.table_schema, c.table_name, c.ordinal_position";

const KEYS_SQL: &str = "\
SELECT tc.table_schema, tc.table_name, tc.constraint_name,
       tc.constraint_type = 'PRIMARY KEY',
       array_agg(kcu.column_name::text ORDER BY kcu.ordinal_position)
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_schema = tc.constraint_schema
 AND kcu.constraint_name = tc.constraint_name
WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
  AND tc.table_schema NOT IN ('pg_catalog', 'information_schema')
GROUP BY tc.table_schema, tc.table_name, tc.constraint_name, tc.constraint_type
ORDER BY tc.table_schema, tc.table_name, tc.constraint_name";

const FKEYS_SQL: &str = "\
SELECT tc.table_schema, tc.table_name, tc.constraint_name,
       array_agg(kcu.column_name::text ORDER BY kcu.ordinal_position),
       utc.table_schema, utc.table_name, rc.unique_constraint_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON kcu.constraint_schema = tc.constraint_schema
 AND kcu.constraint_name = tc.constraint_name
JOIN information_schema.referential_constraints rc
  ON rc.constraint_schema = tc.constraint_schema
 AND rc.constraint_name = tc.constraint_name
JOIN information_schema.table_constraints utc
  ON utc.constraint_schema = rc.unique_constraint_schema
 AND utc.constraint_name = rc.unique_constraint_name
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema NOT IN ('pg_catalog', 'information_schema')
GROUP BY tc.table_schema, tc.table_name, tc.constraint_name,
         utc.table_schema, utc.table_name, rc.unique_constraint_name
ORDER BY tc.table_schema, tc.table_name, tc.constraint_name";

const MODEL_VERSION_SQL: &str = "\
SELECT version FROM _ermgate.model_version LIMIT 1";

/// Read the catalog's model-version token, or 0 when the catalog does not
/// carry a `_ermgate.model_version` table.
pub async fn read_model_version<C: GenericClient>(client: &C) -> Result<i64, RestError> {
    match client.query_opt(MODEL_VERSION_SQL, &[]).await {
        Ok(Some(row)) => Ok(row.get::<_, i64>(0)),
        Ok(None) => Ok(0),
        Err(e) => {
            // undefined_table / undefined_schema: the catalog is unversioned
            if let Some(code) = e.code() {
                if code.code() == "42P01" || code.code() == "3F000" {
                    return Ok(0);
                }
            }
            Err(RestError::from(e))
        }
    }
}

/// Introspect the connected database into a sealed model.
pub async fn introspect<C: GenericClient>(client: &C) -> Result<Model, RestError> {
    let version = read_model_version(client).await?;
    let mut builder = Model::builder().with_version(version);

    load_tables(client, &mut builder).await?;
    load_keys(client, &mut builder).await?;
    load_fkeys(client, &mut builder).await?;

    builder.finish().map_err(rest)
}

async fn load_tables<C: GenericClient>(
    client: &C,
    builder: &mut ModelBuilder,
) -> Result<(), RestError> {
    let mut current: Option<(String, String, Vec<ColumnSpec>)> = None;
    for row in client.query(COLUMNS_SQL, &[]).await? {
        let schema: String = row.get(0);
        let table: String = row.get(1);
        let column: String = row.get(2);
        let sql_type: String = row.get(3);
        let nullable: bool = row.get(4);

        let same = matches!(&current, Some((s, t, _)) if *s == schema && *t == table);
        if !same {
            if let Some((s, t, cols)) = current.take() {
                builder.add_table(&s, &t, cols).map_err(rest)?;
            }
            current = Some((schema, table, Vec::new()));
        }
        if let Some((_, _, cols)) = current.as_mut() {
            cols.push(ColumnSpec {
                name: column,
                sql_type,
                nullable,
            });
        }
    }
    if let Some((s, t, cols)) = current.take() {
        builder.add_table(&s, &t, cols).map_err(rest)?;
    }
    Ok(())
}

async fn load_keys<C: GenericClient>(
    client: &C,
    builder: &mut ModelBuilder,
) -> Result<(), RestError> {
    for row in client.query(KEYS_SQL, &[]).await? {
        let schema: String = row.get(0);
        let table: String = row.get(1);
        let name: String = row.get(2);
        let is_primary: bool = row.get(3);
        let columns: Vec<String> = row.get(4);

        let id = builder
            .lookup(&schema, &table)
            .ok_or_else(|| rest(ModelError::TableNotFound { table: format!("{}:{}", schema, table) }))?;
        let cols: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
        builder.add_unique(id, &name, &cols, is_primary).map_err(rest)?;
    }
    Ok(())
}

async fn load_fkeys<C: GenericClient>(
    client: &C,
    builder: &mut ModelBuilder,
) -> Result<(), RestError> {
    for row in client.query(FKEYS_SQL, &[]).await? {
        let schema: String = row.get(0);
        let table: String = row.get(1);
        let name: String = row.get(2);
        let columns: Vec<String> = row.get(3);
        let ref_schema: String = row.get(4);
        let ref_table: String = row.get(5);
        let ref_key: String = row.get(6);

        let id = builder
            .lookup(&schema, &table)
            .ok_or_else(|| rest(ModelError::TableNotFound { table: format!("{}:{}", schema, table) }))?;
        let ref_id = builder
            .lookup(&ref_schema, &ref_table)
            .ok_or_else(|| rest(ModelError::TableNotFound { table: format!("{}:{}", ref_schema, ref_table) }))?;
        let cols: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
        builder
            .add_fkey(&name, id, &cols, ref_id, &ref_key)
            .map_err(rest)?;
    }
    Ok(())
}

fn rest(err: ModelError) -> RestError {
    RestError::ServiceUnavailable(format!("catalog introspection failed: {}", err))
}
