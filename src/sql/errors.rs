use thiserror::Error;

use crate::errors::RestError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlError {
    #[error("Sort key {key} is not in the output projection.")]
    SortKeyNotInOutput { key: String },
    #[error("Projection {name} requires an aggregate function on this endpoint.")]
    AggregateRequired { name: String },
    #[error("Aggregate function not allowed in projection {name} on this endpoint.")]
    AggregateNotAllowed { name: String },
    #[error("Column {column} does not exist in table {table}.")]
    UnknownInputColumn { column: String, table: String },
    #[error("Default column {column} does not exist in table {table}.")]
    UnknownDefaultColumn { column: String, table: String },
    #[error("Input rows do not cover any unique key of table {table}.")]
    NoInputKey { table: String },
    #[error("Attribute deletion requires columns of the addressed entity, got {column}.")]
    AttributeDeleteNotTail { column: String },
    #[error("Attribute deletion cannot target key column {column}.")]
    AttributeDeleteKeyColumn { column: String },
}

impl From<SqlError> for RestError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::SortKeyNotInOutput { .. } => RestError::BadData(err.to_string()),
            SqlError::AggregateRequired { .. } | SqlError::AggregateNotAllowed { .. } => {
                RestError::BadSyntax(err.to_string())
            }
            SqlError::UnknownInputColumn { .. }
            | SqlError::UnknownDefaultColumn { .. }
            | SqlError::NoInputKey { .. }
            | SqlError::AttributeDeleteNotTail { .. }
            | SqlError::AttributeDeleteKeyColumn { .. } => RestError::ConflictModel(err.to_string()),
        }
    }
}
