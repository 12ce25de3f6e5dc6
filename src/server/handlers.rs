//! Endpoint dispatchers
//!
//! Each API endpoint — Entity, Attribute, AttributeGroup, Aggregate,
//! TextFacet — is a thin dispatcher: parse the raw sub-resource, negotiate
//! representations, hand a single verb to the transaction envelope, and
//! stream the outcome. Handlers read the raw (undecoded) path from the
//! request URI; axum's decoded path parameters are only used for the
//! catalog id.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::percent_decode_str;

use crate::datapath::{FilterOp, FilterTree, Name, RawProjection};
use crate::errors::RestError;
use crate::url_parser::{
    parse_data_path, parse_group_projection, parse_projection_list, DataPathAst, PathElementAst,
};

use super::envelope::{perform, Outcome, Projection, Verb};
use super::models::{ContentType, QueryOpts};
use super::session::Session;
use super::streaming::{self, RowSet};
use super::AppState;

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "ermgate",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The raw, undecoded sub-resource after `/catalog/{id}/{verb}/`.
fn raw_subresource(uri: &Uri) -> Result<&str, RestError> {
    uri.path()
        .splitn(5, '/')
        .nth(4)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RestError::BadSyntax("data path is empty".to_string()))
}

fn negotiated_output(headers: &HeaderMap, default: ContentType) -> ContentType {
    ContentType::negotiate(
        headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()),
        default,
    )
}

fn input_content_type(headers: &HeaderMap) -> ContentType {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ContentType::from_mime)
        .unwrap_or(ContentType::Json)
}

/// Split a projected sub-resource into its path (with modifiers re-attached)
/// and the projection segment.
fn split_projection(raw: &str) -> Result<(String, &str), RestError> {
    let (core, modifiers) = match raw.find('@') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };
    let Some((path_part, projection)) = core.rsplit_once('/') else {
        return Err(RestError::BadSyntax(
            "this endpoint requires a projection as the final path segment".to_string(),
        ));
    };
    if projection.is_empty() {
        return Err(RestError::BadSyntax("projection segment is empty".to_string()));
    }
    Ok((format!("{}{}", path_part, modifiers), projection))
}

fn read_response(
    etag: &str,
    vary: &str,
    content_type: ContentType,
    rowset: RowSet,
) -> Result<Response, RestError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.mime())
        .header(header::ETAG, etag);
    if !vary.is_empty() {
        builder = builder.header(header::VARY, vary);
    }
    builder
        .body(streaming::response_body(rowset, content_type))
        .map_err(|e| RestError::ServiceUnavailable(format!("cannot build response: {}", e)))
}

/// Shared GET flow for the read endpoints.
async fn read_endpoint(
    state: &AppState,
    catalog: u64,
    uri: &Uri,
    headers: &HeaderMap,
    ast: DataPathAst,
    projection: Projection,
) -> Result<Response, RestError> {
    let opts = QueryOpts::parse(uri.query());
    let limit = opts.negotiated_limit(&state.config)?;
    let content_type = negotiated_output(headers, ContentType::Json);

    let session = Session::new(&state.config, headers);
    log::debug!(
        "request {}: read catalog {} path {}",
        session.correlation_id,
        catalog,
        uri.path()
    );

    let verb = Verb::Read {
        ast: &ast,
        projection: &projection,
        limit,
    };
    match perform(state, catalog, &session, headers, &verb).await? {
        Outcome::Rows { etag, rowset } => {
            read_response(&etag, &session.vary_header(), content_type, rowset)
        }
        _ => unreachable!("read verb always yields rows"),
    }
}

// ============================================================================
// Entity endpoint
// ============================================================================

pub async fn entity_get(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let ast = parse_data_path(raw_subresource(&uri)?)?;
    read_endpoint(&state, catalog, &uri, &headers, ast, Projection::Entity).await
}

/// Writes land on a bare base-table path; joins, filters, and context
/// shifts do not apply to input row sets.
fn require_bare_path(ast: &DataPathAst) -> Result<(), RestError> {
    if ast.elements.len() != 1 {
        return Err(RestError::BadSyntax(
            "entity writes require a bare table path".to_string(),
        ));
    }
    Ok(())
}

async fn entity_write(
    state: &AppState,
    catalog: u64,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
    allow_existing: bool,
) -> Result<Response, RestError> {
    let opts = QueryOpts::parse(uri.query());
    let ast = parse_data_path(raw_subresource(uri)?)?;
    require_bare_path(&ast)?;

    let in_type = input_content_type(headers);
    // The response echoes in the input representation unless Accept
    // negotiates the other one.
    let out_type = negotiated_output(headers, in_type);
    // POST may name server-supplied columns; PUT provides every value.
    let defaults = if allow_existing { Default::default() } else { opts.defaults() };
    let input = streaming::parse_input_rows(body, in_type)?;

    let session = Session::new(&state.config, headers);
    log::debug!(
        "request {}: write catalog {} rows {}",
        session.correlation_id,
        catalog,
        input.rows.len()
    );

    let verb = Verb::Write {
        ast: &ast,
        input: &input,
        defaults: &defaults,
        allow_existing,
    };
    let Outcome::WriteRows(rowset) = perform(state, catalog, &session, headers, &verb).await?
    else {
        unreachable!("write verb always yields rows");
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, out_type.mime())
        .body(streaming::response_body(rowset, out_type))
        .map_err(|e| RestError::ServiceUnavailable(format!("cannot build response: {}", e)))
}

pub async fn entity_put(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RestError> {
    entity_write(&state, catalog, &uri, &headers, &body, true).await
}

pub async fn entity_post(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RestError> {
    entity_write(&state, catalog, &uri, &headers, &body, false).await
}

pub async fn entity_delete(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let ast = parse_data_path(raw_subresource(&uri)?)?;
    let session = Session::new(&state.config, &headers);
    perform(&state, catalog, &session, &headers, &Verb::Delete { ast: &ast }).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Attribute endpoint
// ============================================================================

pub async fn attribute_get(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let (path_raw, projection_raw) = split_projection(raw_subresource(&uri)?)?;
    let ast = parse_data_path(&path_raw)?;
    let items = parse_projection_list(projection_raw)?;
    read_endpoint(
        &state,
        catalog,
        &uri,
        &headers,
        ast,
        Projection::Attributes(items),
    )
    .await
}

pub async fn attribute_delete(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let (path_raw, projection_raw) = split_projection(raw_subresource(&uri)?)?;
    let ast = parse_data_path(&path_raw)?;
    let items = parse_projection_list(projection_raw)?;
    let session = Session::new(&state.config, &headers);
    let verb = Verb::AttributeDelete {
        ast: &ast,
        items: &items,
    };
    perform(&state, catalog, &session, &headers, &verb).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// AttributeGroup / Aggregate endpoints
// ============================================================================

pub async fn attributegroup_get(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let (path_raw, projection_raw) = split_projection(raw_subresource(&uri)?)?;
    let ast = parse_data_path(&path_raw)?;
    let (keys, attrs) = parse_group_projection(projection_raw)?;
    read_endpoint(
        &state,
        catalog,
        &uri,
        &headers,
        ast,
        Projection::Group(keys, attrs),
    )
    .await
}

pub async fn aggregate_get(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let (path_raw, projection_raw) = split_projection(raw_subresource(&uri)?)?;
    let ast = parse_data_path(&path_raw)?;
    let items = parse_projection_list(projection_raw)?;
    read_endpoint(
        &state,
        catalog,
        &uri,
        &headers,
        ast,
        Projection::Aggregate(items),
    )
    .await
}

// ============================================================================
// TextFacet endpoint
// ============================================================================

/// Facet search over the catalog's value map: the path carries the search
/// fragment, optionally followed by `facetkeys;facetvals`.
pub async fn textfacet_get(
    State(state): State<Arc<AppState>>,
    Path((catalog, _rest)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let raw = raw_subresource(&uri)?;
    let (fragment_raw, projection_raw) = match raw.split_once('/') {
        Some((fragment, rest)) => (fragment, Some(rest)),
        None => (raw, None),
    };
    let fragment = percent_decode_str(fragment_raw)
        .decode_utf8()
        .map_err(|_| RestError::BadSyntax("invalid percent-encoding in facet value".to_string()))?
        .into_owned();
    if fragment.is_empty() {
        return Err(RestError::BadSyntax("text facet requires a search value".to_string()));
    }

    let (keys, attrs) = match projection_raw {
        Some(raw) => parse_group_projection(raw)?,
        None => (
            ["schema", "table", "column"]
                .iter()
                .map(|c| RawProjection {
                    name: Name::Unqualified(c.to_string()),
                    alias: None,
                    aggregate: None,
                })
                .collect(),
            vec![RawProjection {
                name: Name::Unqualified("value".to_string()),
                alias: None,
                aggregate: Some("array_d".to_string()),
            }],
        ),
    };

    // A synthetic path over the value map, filtered by freetext match.
    let ast = DataPathAst {
        elements: vec![
            PathElementAst::Step {
                name: Name::Qualified("_ermgate".to_string(), "valuemap".to_string()),
                alias: None,
            },
            PathElementAst::Filter(FilterTree::Pred {
                name: Name::Wildcard,
                op: FilterOp::Ts,
                value: Some(fragment),
            }),
        ],
        sort: Vec::new(),
        before: None,
        after: None,
    };

    read_endpoint(
        &state,
        catalog,
        &uri,
        &headers,
        ast,
        Projection::Group(keys, attrs),
    )
    .await
}

// ============================================================================
// Model endpoints
// ============================================================================

pub async fn model_get(
    State(state): State<Arc<AppState>>,
    Path(catalog): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let session = Session::new(&state.config, &headers);
    let Outcome::Model(model) =
        perform(&state, catalog, &session, &headers, &Verb::ModelGet).await?
    else {
        unreachable!("model verb always yields a model");
    };
    Ok(Json(&*model).into_response())
}

pub async fn model_refresh(
    State(state): State<Arc<AppState>>,
    Path(catalog): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, RestError> {
    let session = Session::new(&state.config, &headers);
    let Outcome::Model(model) =
        perform(&state, catalog, &session, &headers, &Verb::ModelRefresh).await?
    else {
        unreachable!("model verb always yields a model");
    };
    Ok(Json(serde_json::json!({
        "status": "refreshed",
        "schemas": model.schemas.len(),
        "tables": model.tables().len(),
        "version": model.version,
    }))
    .into_response())
}
