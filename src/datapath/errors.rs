use thiserror::Error;

use crate::catalog::ModelError;
use crate::errors::RestError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Column {column} does not exist in table {table}.")]
    ColumnNotFound { column: String, table: String },
    #[error("Column {column} does not exist in table {table} (alias {alias}).")]
    ColumnNotFoundInAlias {
        column: String,
        table: String,
        alias: String,
    },
    #[error("Name {name} is not a valid syntax for a table name.")]
    InvalidTableName { name: String },
    #[error("Name {name} is not a valid syntax for a link column.")]
    InvalidLinkName { name: String },
    #[error("Context name {name} is not a valid syntax for an entity alias.")]
    InvalidContextName { name: String },
    #[error("Context name {name} is not a bound alias in entity path.")]
    UnboundContextAlias { name: String },
    #[error("Alias {alias} is already bound in entity path.")]
    DuplicateAlias { alias: String },
    #[error("Alias {alias} is not bound in entity path.")]
    UnboundAlias { alias: String },
    #[error("Referenced column {column} is not bound in entity path.")]
    ColumnNotBound { column: String },
    #[error("Entity path is frozen and cannot absorb further elements.")]
    Frozen,
    #[error("The \"{which}\" page key of length {got} does not match the \"sort\" key of length {want}.")]
    PageArity {
        which: &'static str,
        got: usize,
        want: usize,
    },
    #[error("Page keys require a sort specification.")]
    PageWithoutSort,
    #[error("Filter operator {op} does not accept a value.")]
    OperatorValue { op: String },
    #[error("Filter operator {op} requires a value.")]
    OperatorMissingValue { op: String },
    #[error("Unknown filter operator {op}.")]
    UnknownOperator { op: String },
    #[error("Wildcard column {name} cannot be given an alias.")]
    WildcardAlias { name: String },
    #[error("Column name {name}, qualified by schema and table names, not allowed as attribute.")]
    QualifiedAttribute { name: String },
    #[error("Alias {alias}, qualifying column name {name}, not bound in path.")]
    UnboundProjectionAlias { alias: String, name: String },
    #[error("Unknown aggregate function {name}.")]
    UnknownAggregate { name: String },
}

impl From<PathError> for RestError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Model(m) => m.into(),
            PathError::UnboundContextAlias { .. } | PathError::UnboundAlias { .. } => {
                RestError::BadData(err.to_string())
            }
            PathError::InvalidTableName { .. }
            | PathError::InvalidLinkName { .. }
            | PathError::InvalidContextName { .. }
            | PathError::DuplicateAlias { .. }
            | PathError::Frozen
            | PathError::PageArity { .. }
            | PathError::PageWithoutSort
            | PathError::OperatorValue { .. }
            | PathError::OperatorMissingValue { .. }
            | PathError::UnknownOperator { .. }
            | PathError::WildcardAlias { .. }
            | PathError::QualifiedAttribute { .. }
            | PathError::UnboundProjectionAlias { .. }
            | PathError::UnknownAggregate { .. } => RestError::BadSyntax(err.to_string()),
            PathError::ColumnNotFound { .. }
            | PathError::ColumnNotFoundInAlias { .. }
            | PathError::ColumnNotBound { .. } => RestError::ConflictModel(err.to_string()),
        }
    }
}
