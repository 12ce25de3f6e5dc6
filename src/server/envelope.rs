//! Transaction envelope and verb execution
//!
//! Every request body runs inside one envelope: acquire a pooled
//! connection, begin a transaction, install the session variables the
//! policy predicates read, execute the verb, commit. Transient connection
//! failures re-run the whole envelope up to the configured bound; errors
//! never partially commit, and nothing streams before commit.

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::catalog::Model;
use crate::datapath::{
    preprocess_projection, EntityPath, Name, ProjectionItem, RawProjection,
};
use crate::errors::RestError;
use crate::sql::{self, QueryShape, WriteInput};
use crate::url_parser::{DataPathAst, PathElementAst};

use super::session::{data_version, Session};
use super::streaming::{self, RowSet};
use super::AppState;

const SESSION_VARS_SQL: &str = "\
SELECT set_config('ermgate.client', $1, false),
       set_config('ermgate.attributes', $2, false)";

/// What a read endpoint projects.
#[derive(Debug)]
pub enum Projection {
    Entity,
    Attributes(Vec<RawProjection>),
    Group(Vec<RawProjection>, Vec<RawProjection>),
    Aggregate(Vec<RawProjection>),
}

/// The single verb a dispatcher applies to its path.
#[derive(Debug)]
pub enum Verb<'r> {
    Read {
        ast: &'r DataPathAst,
        projection: &'r Projection,
        limit: Option<u64>,
    },
    Write {
        ast: &'r DataPathAst,
        input: &'r WriteInput,
        defaults: &'r HashSet<String>,
        allow_existing: bool,
    },
    Delete {
        ast: &'r DataPathAst,
    },
    AttributeDelete {
        ast: &'r DataPathAst,
        items: &'r [RawProjection],
    },
    ModelGet,
    ModelRefresh,
}

pub enum Outcome {
    /// Read result with its validator.
    Rows { etag: String, rowset: RowSet },
    /// Write echo; writes do not carry validators.
    WriteRows(RowSet),
    Deleted,
    Model(Arc<Model>),
}

/// Run one verb inside the transaction envelope, retrying transient
/// failures. Effects are strictly ordered: session-variable setup, body,
/// commit; header emission and body streaming happen after return.
pub async fn perform(
    state: &AppState,
    catalog: u64,
    session: &Session,
    headers: &HeaderMap,
    verb: &Verb<'_>,
) -> Result<Outcome, RestError> {
    let pool = state.pools.get(catalog)?;
    let attributes_json =
        serde_json::to_string(&session.attributes).expect("string list always serializes");

    let mut attempt = 0u32;
    loop {
        let result = attempt_once(state, catalog, session, headers, verb, pool, &attributes_json)
            .await;
        match result {
            Err(e) if e.is_retryable() && attempt < session.max_retries => {
                attempt += 1;
                log::warn!(
                    "request {}: transient failure ({}), retry {}/{}",
                    session.correlation_id,
                    e,
                    attempt,
                    session.max_retries
                );
            }
            other => return other,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn attempt_once(
    state: &AppState,
    catalog: u64,
    session: &Session,
    headers: &HeaderMap,
    verb: &Verb<'_>,
    pool: &deadpool_postgres::Pool,
    attributes_json: &str,
) -> Result<Outcome, RestError> {
    let mut conn = pool.get().await?;
    let txn = conn.transaction().await.map_err(RestError::from)?;
    txn.execute(SESSION_VARS_SQL, &[&session.client, &attributes_json])
        .await
        .map_err(RestError::from)?;

    let outcome = execute_verb(state, catalog, session, headers, &txn, verb).await?;
    txn.commit().await.map_err(RestError::from)?;
    Ok(outcome)
}

async fn execute_verb(
    state: &AppState,
    catalog: u64,
    session: &Session,
    headers: &HeaderMap,
    txn: &tokio_postgres::Transaction<'_>,
    verb: &Verb<'_>,
) -> Result<Outcome, RestError> {
    match verb {
        Verb::ModelGet => {
            let model = state.registry.model(catalog, txn).await?;
            Ok(Outcome::Model(model))
        }
        Verb::ModelRefresh => {
            let model = state.registry.refresh(catalog, txn).await?;
            Ok(Outcome::Model(model))
        }
        Verb::Read {
            ast,
            projection,
            limit,
        } => {
            let model = state.registry.model(catalog, txn).await?;
            let mut path = build_entity_path(&model, ast)?;

            let bound = bind_projection(&model, &path, projection)?;
            if !matches!(bound, BoundShape::Entity) {
                path.freeze();
            }
            apply_modifiers(&mut path, ast)?;

            let version = data_version(txn).await?;
            let etag = session.make_etag(&version, accept_of(headers));
            session.check_preconditions(headers, &etag, true)?;

            let sql = sql::render_query(&model, &path, bound.as_shape(), *limit)?;
            let rowset = streaming::fetch_rows(txn, &sql).await?;
            Ok(Outcome::Rows { etag, rowset })
        }
        Verb::Write {
            ast,
            input,
            defaults,
            allow_existing,
        } => {
            let model = state.registry.model(catalog, txn).await?;
            let path = build_entity_path(&model, ast)?;

            let version = data_version(txn).await?;
            let etag = session.make_etag(&version, accept_of(headers));
            session.check_preconditions(headers, &etag, false)?;

            if input.rows.is_empty() {
                return Ok(Outcome::WriteRows(RowSet::empty()));
            }
            let table = model.table(path.tail_table());
            let sql = sql::render_insert(table, input, defaults, *allow_existing)?;
            let rowset = streaming::fetch_rows(txn, &sql).await?;
            Ok(Outcome::WriteRows(rowset))
        }
        Verb::Delete { ast } => {
            let model = state.registry.model(catalog, txn).await?;
            let path = build_entity_path(&model, ast)?;

            let version = data_version(txn).await?;
            let etag = session.make_etag(&version, accept_of(headers));
            session.check_preconditions(headers, &etag, false)?;

            let sql = sql::render_delete(&model, &path);
            streaming::execute(txn, &sql).await?;
            Ok(Outcome::Deleted)
        }
        Verb::AttributeDelete { ast, items } => {
            let model = state.registry.model(catalog, txn).await?;
            let path = build_entity_path(&model, ast)?;
            let bound = preprocess_projection(&model, &path, items.to_vec())?;

            let version = data_version(txn).await?;
            let etag = session.make_etag(&version, accept_of(headers));
            session.check_preconditions(headers, &etag, false)?;

            let sql = sql::render_attribute_delete(&model, &path, &bound)?;
            streaming::execute(txn, &sql).await?;
            Ok(Outcome::Deleted)
        }
    }
}

fn accept_of(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

enum BoundShape {
    Entity,
    Attributes(Vec<ProjectionItem>),
    Group(Vec<ProjectionItem>, Vec<ProjectionItem>),
    Aggregate(Vec<ProjectionItem>),
}

impl BoundShape {
    fn as_shape(&self) -> QueryShape<'_> {
        match self {
            BoundShape::Entity => QueryShape::Entity,
            BoundShape::Attributes(items) => QueryShape::Attributes(items),
            BoundShape::Group(keys, attrs) => QueryShape::AttributeGroup {
                keys,
                attributes: attrs,
            },
            BoundShape::Aggregate(items) => QueryShape::Aggregate(items),
        }
    }
}

fn bind_projection(
    model: &Model,
    path: &EntityPath,
    projection: &Projection,
) -> Result<BoundShape, RestError> {
    Ok(match projection {
        Projection::Entity => BoundShape::Entity,
        Projection::Attributes(items) => {
            BoundShape::Attributes(preprocess_projection(model, path, items.clone())?)
        }
        Projection::Group(keys, attrs) => BoundShape::Group(
            preprocess_projection(model, path, keys.clone())?,
            preprocess_projection(model, path, attrs.clone())?,
        ),
        Projection::Aggregate(items) => {
            BoundShape::Aggregate(preprocess_projection(model, path, items.clone())?)
        }
    })
}

/// Materialize the AST into an entity path, consulting the model for
/// table lookups and link inference.
pub fn build_entity_path(model: &Model, ast: &DataPathAst) -> Result<EntityPath, RestError> {
    let mut elements = ast.elements.iter();
    let Some(PathElementAst::Step { name, alias }) = elements.next() else {
        return Err(RestError::BadSyntax(
            "data path must begin with a table name".to_string(),
        ));
    };
    let base = name.resolve_table(model)?;
    let mut path = EntityPath::new(base, alias.clone())?;

    for element in elements {
        match element {
            PathElementAst::Step { name, alias } => {
                let (fkey, direction) = name.resolve_link(model, &path)?;
                path.add_link(model, fkey, direction, alias.clone(), None)?;
            }
            PathElementAst::Link { name, alias } => {
                let (fkey, direction, source_alias) = name.resolve_link_column(model, &path)?;
                path.add_link(model, fkey, direction, alias.clone(), source_alias.as_deref())?;
            }
            PathElementAst::Filter(tree) => {
                path.add_filter(model, tree)?;
            }
            PathElementAst::Context(alias) => {
                let alias = Name::Unqualified(alias.clone()).resolve_context(&path)?;
                path.set_context(&alias)?;
            }
        }
    }
    Ok(path)
}

/// Attach sort and page keys; legal on a frozen path.
fn apply_modifiers(path: &mut EntityPath, ast: &DataPathAst) -> Result<(), RestError> {
    if !ast.sort.is_empty() {
        path.add_sort(ast.sort.clone());
    }
    if let Some(values) = &ast.after {
        path.set_after(values.clone())?;
    }
    if let Some(values) = &ast.before {
        path.set_before(values.clone())?;
    }
    Ok(())
}
