//! Filter predicate trees
//!
//! The URL parser produces unbound [`FilterTree`]s whose column references
//! are plain names. `EntityPath::add_filter` resolves them against the path
//! at attachment time, producing [`BoundFilter`]s that pin every column to a
//! path position. SQL generation never resolves names.

use super::errors::PathError;
use super::name::{ColumnRef, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Leq,
    Gt,
    Geq,
    Like,
    Regexp,
    Ciregexp,
    /// Freetext containment match.
    Ts,
    Null,
}

impl FilterOp {
    pub fn from_url(op: &str) -> Option<FilterOp> {
        match op {
            "eq" => Some(FilterOp::Eq),
            "lt" => Some(FilterOp::Lt),
            "leq" => Some(FilterOp::Leq),
            "gt" => Some(FilterOp::Gt),
            "geq" => Some(FilterOp::Geq),
            "like" => Some(FilterOp::Like),
            "regexp" => Some(FilterOp::Regexp),
            "ciregexp" => Some(FilterOp::Ciregexp),
            "ts" => Some(FilterOp::Ts),
            "null" => Some(FilterOp::Null),
            _ => None,
        }
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, FilterOp::Null)
    }
}

/// Unbound predicate tree as parsed from the URL.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTree {
    Pred {
        name: Name,
        op: FilterOp,
        value: Option<String>,
    },
    Neg(Box<FilterTree>),
    Conj(Vec<FilterTree>),
    Disj(Vec<FilterTree>),
}

impl FilterTree {
    /// Check the operator/value shape before binding.
    pub fn validate(&self) -> Result<(), PathError> {
        match self {
            FilterTree::Pred { op, value, .. } => match (op.takes_value(), value) {
                (false, Some(v)) if !v.is_empty() => Err(PathError::OperatorValue {
                    op: "null".to_string(),
                }),
                (true, None) => Err(PathError::OperatorMissingValue {
                    op: format!("{:?}", op).to_lowercase(),
                }),
                _ => Ok(()),
            },
            FilterTree::Neg(inner) => inner.validate(),
            FilterTree::Conj(parts) | FilterTree::Disj(parts) => {
                parts.iter().try_for_each(|p| p.validate())
            }
        }
    }
}

/// Predicate tree with every column pinned to a path position.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundFilter {
    Pred {
        column: ColumnRef,
        /// Path position whose derived-table alias qualifies the column.
        pos: usize,
        op: FilterOp,
        value: Option<String>,
    },
    Neg(Box<BoundFilter>),
    Conj(Vec<BoundFilter>),
    Disj(Vec<BoundFilter>),
}
