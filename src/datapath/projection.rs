//! Projection and aggregate planning
//!
//! Raw projection items come out of the URL parser as names with optional
//! output aliases and aggregate function spellings. Preprocessing resolves
//! every name against the entity path, expands `*` wildcards into explicit
//! per-column projections, and tags aggregate items with their function.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::catalog::Model;

use super::errors::PathError;
use super::name::{ColumnRef, Name, ResolvedBase};
use super::path::EntityPath;

/// Aggregate functions, keyed by their URL spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Cnt,
    CntD,
    Min,
    Max,
    Sum,
    Avg,
    Array,
    ArrayD,
}

lazy_static! {
    static ref AGGREGATE_FUNCTIONS: HashMap<&'static str, AggregateFn> = {
        let mut m = HashMap::new();
        m.insert("cnt", AggregateFn::Cnt);
        m.insert("cnt_d", AggregateFn::CntD);
        m.insert("min", AggregateFn::Min);
        m.insert("max", AggregateFn::Max);
        m.insert("sum", AggregateFn::Sum);
        m.insert("avg", AggregateFn::Avg);
        m.insert("array", AggregateFn::Array);
        m.insert("array_d", AggregateFn::ArrayD);
        m
    };
}

impl AggregateFn {
    pub fn from_url(name: &str) -> Option<AggregateFn> {
        AGGREGATE_FUNCTIONS.get(name).copied()
    }

    /// Render the aggregate over an already-rendered operand expression.
    /// `Cnt` over the wildcard renders as a row count.
    pub fn render(self, operand: &str) -> String {
        match self {
            AggregateFn::Cnt => format!("count({})", operand),
            AggregateFn::CntD => format!("count(DISTINCT {})", operand),
            AggregateFn::Min => format!("min({})", operand),
            AggregateFn::Max => format!("max({})", operand),
            AggregateFn::Sum => format!("sum({})", operand),
            AggregateFn::Avg => format!("avg({})", operand),
            AggregateFn::Array => format!("array_agg({})", operand),
            AggregateFn::ArrayD => format!("array_agg(DISTINCT {})", operand),
        }
    }

    pub fn render_row_count() -> String {
        "count(*)".to_string()
    }
}

/// A projection item as parsed from the URL, before binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProjection {
    pub name: Name,
    pub alias: Option<String>,
    /// Aggregate function spelling, validated during preprocessing.
    pub aggregate: Option<String>,
}

/// A fully bound projection item.
#[derive(Debug, Clone)]
pub struct ProjectionItem {
    pub name: Name,
    pub alias: Option<String>,
    pub aggregate: Option<AggregateFn>,
    pub column: ColumnRef,
    pub base: ResolvedBase,
    /// Path position whose derived-table alias qualifies the column.
    pub pos: usize,
}

impl ProjectionItem {
    /// The output column name: the explicit alias when given, else the
    /// source name's spelling.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(a) => a.clone(),
            None => self.name.to_string(),
        }
    }

    pub fn is_row_count(&self) -> bool {
        self.aggregate.is_some() && self.column.is_freetext()
    }
}

/// Expand wildcards and bind every projection item to a column and a path
/// position. Projections may reference only the tail table or bound
/// aliases; schema-qualified names are not attributes.
pub fn preprocess_projection(
    model: &Model,
    path: &EntityPath,
    items: Vec<RawProjection>,
) -> Result<Vec<ProjectionItem>, PathError> {
    let mut results = Vec::with_capacity(items.len());
    let tail = path.tail_position();

    for item in items {
        match &item.name {
            Name::FullyQualified(..) => {
                return Err(PathError::QualifiedAttribute {
                    name: item.name.to_string(),
                })
            }
            Name::Qualified(n0, _) | Name::AliasWildcard(n0) => {
                if path.alias_position(n0).is_none() {
                    return Err(PathError::UnboundProjectionAlias {
                        alias: n0.clone(),
                        name: item.name.to_string(),
                    });
                }
            }
            _ => {}
        }

        let aggregate = match &item.aggregate {
            Some(fn_name) => Some(AggregateFn::from_url(fn_name).ok_or_else(|| {
                PathError::UnknownAggregate {
                    name: fn_name.clone(),
                }
            })?),
            None => None,
        };

        let (column, base) = item.name.resolve_column(model, path, None)?;

        if column.is_freetext() && aggregate.is_none() {
            // Expand the '*' wildcard sugar as if the client had referenced
            // each column of the denoted table.
            if item.alias.is_some() {
                return Err(PathError::WildcardAlias {
                    name: item.name.to_string(),
                });
            }
            match &base {
                ResolvedBase::PathTail => {
                    for col in model.table(path.tail_table()).columns_in_order() {
                        results.push(ProjectionItem {
                            name: Name::Unqualified(col.name.clone()),
                            alias: None,
                            aggregate: None,
                            column: ColumnRef {
                                table: path.tail_table(),
                                column: col.name.clone(),
                            },
                            base: ResolvedBase::PathTail,
                            pos: tail,
                        });
                    }
                }
                ResolvedBase::Alias(alias) => {
                    let pos = path.alias_position(alias).expect("alias resolved above");
                    let atable = path.table_at(pos);
                    for col in model.table(atable).columns_in_order() {
                        results.push(ProjectionItem {
                            name: Name::Qualified(alias.clone(), col.name.clone()),
                            alias: Some(format!("{}:{}", alias, col.name)),
                            aggregate: None,
                            column: ColumnRef {
                                table: atable,
                                column: col.name.clone(),
                            },
                            base: ResolvedBase::Alias(alias.clone()),
                            pos,
                        });
                    }
                }
                ResolvedBase::Model => unreachable!("unresolvable * column survived resolution"),
            }
        } else {
            let pos = match &base {
                ResolvedBase::PathTail => tail,
                ResolvedBase::Alias(a) => path.alias_position(a).expect("alias resolved above"),
                ResolvedBase::Model => {
                    return Err(PathError::ColumnNotBound {
                        column: item.name.to_string(),
                    })
                }
            };
            results.push(ProjectionItem {
                name: item.name,
                alias: item.alias,
                aggregate,
                column,
                base,
                pos,
            });
        }
    }

    Ok(results)
}
