//! Result streaming and row codecs
//!
//! Rows are fetched inside the request transaction — forcing the first row
//! there surfaces SQL errors before any header is committed — and the
//! response body is then serialized lazily, chunk by row, after commit.
//! Input row sets arrive as JSON arrays of objects or CSV with a header
//! row; both decode into the homogeneous `WriteInput` shape.

use std::convert::Infallible;

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream;
use serde_json::{Map, Number, Value};
use tokio_postgres::types::Type;
use tokio_postgres::Row;

use crate::errors::RestError;
use crate::sql::WriteInput;

use super::models::ContentType;

/// A decoded result set: output names plus row values in output order.
#[derive(Debug, Clone)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn empty() -> RowSet {
        RowSet {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Prepare and run a SELECT/RETURNING statement, decoding all rows inside
/// the calling transaction.
pub async fn fetch_rows(
    txn: &tokio_postgres::Transaction<'_>,
    sql: &str,
) -> Result<RowSet, RestError> {
    log::debug!("executing SQL:\n{}", sql);
    let stmt = txn.prepare(sql).await?;
    let columns: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let rows = txn.query(&stmt, &[]).await?;
    let rows = rows.iter().map(decode_row).collect();
    Ok(RowSet { columns, rows })
}

/// Run a statement for its side effect, returning the affected-row count.
pub async fn execute(
    txn: &tokio_postgres::Transaction<'_>,
    sql: &str,
) -> Result<u64, RestError> {
    log::debug!("executing SQL:\n{}", sql);
    Ok(txn.execute(sql, &[]).await?)
}

fn number(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn get<'a, T>(row: &'a Row, idx: usize) -> Option<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("column {} failed to decode: {}", idx, e);
            None
        }
    }
}

fn decode_value(row: &Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_();

    if *ty == Type::BOOL {
        get::<bool>(row, idx).map(Value::Bool).unwrap_or(Value::Null)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx).map(|v| Value::from(v as i64)).unwrap_or(Value::Null)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx).map(|v| Value::from(v as i64)).unwrap_or(Value::Null)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx).map(Value::from).unwrap_or(Value::Null)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx).map(|v| number(v as f64)).unwrap_or(Value::Null)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx).map(number).unwrap_or(Value::Null)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<Value>(row, idx).unwrap_or(Value::Null)
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::DATE {
        get::<chrono::NaiveDate>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIME {
        get::<chrono::NaiveTime>(row, idx)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIMESTAMP {
        get::<chrono::NaiveDateTime>(row, idx)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::BOOL_ARRAY {
        decode_array(get::<Vec<Option<bool>>>(row, idx), Value::Bool)
    } else if *ty == Type::INT2_ARRAY {
        decode_array(get::<Vec<Option<i16>>>(row, idx), |v| Value::from(v as i64))
    } else if *ty == Type::INT4_ARRAY {
        decode_array(get::<Vec<Option<i32>>>(row, idx), |v| Value::from(v as i64))
    } else if *ty == Type::INT8_ARRAY {
        decode_array(get::<Vec<Option<i64>>>(row, idx), Value::from)
    } else if *ty == Type::FLOAT4_ARRAY {
        decode_array(get::<Vec<Option<f32>>>(row, idx), |v| number(v as f64))
    } else if *ty == Type::FLOAT8_ARRAY {
        decode_array(get::<Vec<Option<f64>>>(row, idx), number)
    } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
        decode_array(get::<Vec<Option<String>>>(row, idx), Value::String)
    } else {
        // Text and anything the select-list casts funnelled into text.
        get::<String>(row, idx).map(Value::String).unwrap_or(Value::Null)
    }
}

fn decode_array<T>(values: Option<Vec<Option<T>>>, f: impl Fn(T) -> Value) -> Value {
    match values {
        Some(items) => Value::Array(
            items
                .into_iter()
                .map(|v| v.map(&f).unwrap_or(Value::Null))
                .collect(),
        ),
        None => Value::Null,
    }
}

fn decode_row(row: &Row) -> Vec<Value> {
    (0..row.columns().len())
        .map(|idx| decode_value(row, idx))
        .collect()
}

/// Lazily serialized response body in the negotiated representation.
pub fn response_body(rowset: RowSet, content_type: ContentType) -> Body {
    match content_type {
        ContentType::Json => json_body(rowset),
        ContentType::Csv => csv_body(rowset),
    }
}

fn json_body(rowset: RowSet) -> Body {
    let RowSet { columns, rows } = rowset;
    let chunks = std::iter::once(Bytes::from_static(b"["))
        .chain(rows.into_iter().enumerate().map(move |(i, row)| {
            let mut object = Map::with_capacity(columns.len());
            for (name, value) in columns.iter().zip(row) {
                object.insert(name.clone(), value);
            }
            let mut chunk = if i == 0 {
                String::new()
            } else {
                ",\n".to_string()
            };
            chunk.push_str(
                &serde_json::to_string(&Value::Object(object)).unwrap_or_else(|_| "null".into()),
            );
            Bytes::from(chunk)
        }))
        .chain(std::iter::once(Bytes::from_static(b"]\n")));
    Body::from_stream(stream::iter(chunks.map(Ok::<_, Infallible>)))
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_record(fields: &[String]) -> Bytes {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // A record write into a Vec can only fail on allocation.
    let _ = writer.write_record(fields);
    let _ = writer.flush();
    Bytes::from(writer.into_inner().unwrap_or_default())
}

fn csv_body(rowset: RowSet) -> Body {
    let RowSet { columns, rows } = rowset;
    let header = csv_record(&columns);
    let chunks = std::iter::once(header).chain(rows.into_iter().map(|row| {
        let fields: Vec<String> = row.iter().map(csv_field).collect();
        csv_record(&fields)
    }));
    Body::from_stream(stream::iter(chunks.map(Ok::<_, Infallible>)))
}

/// Decode an input row set in the declared content type. Rows must be
/// homogeneous: every row carries exactly the columns of the first.
pub fn parse_input_rows(body: &[u8], content_type: ContentType) -> Result<WriteInput, RestError> {
    match content_type {
        ContentType::Json => {
            let rows: Vec<Map<String, Value>> = serde_json::from_slice(body).map_err(|e| {
                RestError::BadSyntax(format!("input is not a JSON array of row objects: {}", e))
            })?;
            let Some(first) = rows.first() else {
                return Ok(WriteInput {
                    columns: Vec::new(),
                    rows: Vec::new(),
                });
            };
            let columns: Vec<String> = first.keys().cloned().collect();
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                if row.len() != columns.len() {
                    return Err(RestError::BadData(
                        "input rows are not homogeneous: differing column sets".to_string(),
                    ));
                }
                let mut values = Vec::with_capacity(columns.len());
                for column in &columns {
                    match row.get(column) {
                        Some(v) => values.push(v.clone()),
                        None => {
                            return Err(RestError::BadData(format!(
                                "input rows are not homogeneous: missing column {}",
                                column
                            )))
                        }
                    }
                }
                out.push(values);
            }
            Ok(WriteInput { columns, rows: out })
        }
        ContentType::Csv => {
            let mut reader = csv::Reader::from_reader(body);
            let columns: Vec<String> = reader
                .headers()
                .map_err(|e| RestError::BadSyntax(format!("invalid CSV input: {}", e)))?
                .iter()
                .map(|h| h.to_string())
                .collect();
            let mut rows = Vec::new();
            for record in reader.records() {
                let record =
                    record.map_err(|e| RestError::BadSyntax(format!("invalid CSV input: {}", e)))?;
                rows.push(
                    record
                        .iter()
                        .map(|f| Value::String(f.to_string()))
                        .collect(),
                );
            }
            Ok(WriteInput { columns, rows })
        }
    }
}
