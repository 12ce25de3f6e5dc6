use thiserror::Error;

use crate::errors::RestError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Schema {schema} does not exist.")]
    SchemaNotFound { schema: String },
    #[error("Table {table} does not exist.")]
    TableNotFound { table: String },
    #[error("Table name {table} is ambiguous across schemas.")]
    AmbiguousTable { table: String },
    #[error("Column {column} does not exist in table {table}.")]
    ColumnNotFound { column: String, table: String },
    #[error("No link found between tables {left} and {right}")]
    NoLink { left: String, right: String },
    #[error("Ambiguous links found between tables {left} and {right}")]
    AmbiguousLink { left: String, right: String },
    #[error("Ambiguous self-link for table {table}")]
    SelfLink { table: String },
    #[error("Column {column} is not a foreign-key endpoint usable as a link")]
    NotALinkColumn { column: String },
    #[error("Invalid model definition: {0}")]
    InvalidModel(String),
}

impl From<ModelError> for RestError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::SchemaNotFound { .. } | ModelError::TableNotFound { .. } => {
                RestError::ConflictModel(err.to_string())
            }
            other => RestError::ConflictModel(other.to_string()),
        }
    }
}
