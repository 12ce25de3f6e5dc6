//! Qualified and unqualified names
//!
//! A name in URL space has one to three parts, or is one of the two
//! wildcard forms. Resolution turns a name plus a model and an in-progress
//! entity path into an unambiguous catalog reference. All resolutions are
//! pure functions of the model and the immutable prefix of the path at the
//! call site.

use std::fmt;

use crate::catalog::{ForeignKeyId, LinkDirection, Model, TableId};

use super::errors::PathError;
use super::path::EntityPath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Name {
    Unqualified(String),
    Qualified(String, String),
    FullyQualified(String, String, String),
    Wildcard,
    AliasWildcard(String),
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Unqualified(a) => write!(f, "{}", a),
            Name::Qualified(a, b) => write!(f, "{}:{}", a, b),
            Name::FullyQualified(a, b, c) => write!(f, "{}:{}:{}", a, b, c),
            Name::Wildcard => write!(f, "*"),
            Name::AliasWildcard(a) => write!(f, "{}:*", a),
        }
    }
}

/// What a resolved column is relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBase {
    /// The path itself (current tail, or the override table the caller
    /// supplied).
    PathTail,
    /// A bound alias of an interior path element.
    Alias(String),
    /// The model directly; not bound to any path element.
    Model,
}

/// Stable handle to a column: table identity plus column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: TableId,
    pub column: String,
}

impl ColumnRef {
    pub fn is_freetext(&self) -> bool {
        self.column == "*"
    }
}

impl Name {
    /// Resolve to a column reference and base.
    ///
    /// Rules, in order: a 1-part name is a column of `table` (defaulting to
    /// the path tail), with `*` denoting the freetext column; a 2-part name
    /// prefers a bound alias and otherwise falls back to an unqualified
    /// model table; a 3-part name is always schema:table:column from the
    /// model.
    pub fn resolve_column(
        &self,
        model: &Model,
        path: &EntityPath,
        table: Option<TableId>,
    ) -> Result<(ColumnRef, ResolvedBase), PathError> {
        let table = table.unwrap_or_else(|| path.tail_table());

        match self {
            Name::Unqualified(n0) => {
                if model.table(table).has_column(n0) {
                    Ok((
                        ColumnRef {
                            table,
                            column: n0.clone(),
                        },
                        ResolvedBase::PathTail,
                    ))
                } else {
                    Err(PathError::ColumnNotFound {
                        column: n0.clone(),
                        table: model.table(table).to_string(),
                    })
                }
            }
            Name::Wildcard => Ok((
                ColumnRef {
                    table,
                    column: "*".to_string(),
                },
                ResolvedBase::PathTail,
            )),
            Name::Qualified(n0, n1) => {
                if let Some(pos) = path.alias_position(n0) {
                    let atable = path.table_at(pos);
                    if model.table(atable).has_column(n1) {
                        Ok((
                            ColumnRef {
                                table: atable,
                                column: n1.clone(),
                            },
                            ResolvedBase::Alias(n0.clone()),
                        ))
                    } else {
                        Err(PathError::ColumnNotFoundInAlias {
                            column: n1.clone(),
                            table: model.table(atable).to_string(),
                            alias: n0.clone(),
                        })
                    }
                } else {
                    let t = model.lookup_table(None, n0)?;
                    if model.table(t).has_column(n1) {
                        Ok((
                            ColumnRef {
                                table: t,
                                column: n1.clone(),
                            },
                            ResolvedBase::Model,
                        ))
                    } else {
                        Err(PathError::ColumnNotFound {
                            column: n1.clone(),
                            table: model.table(t).to_string(),
                        })
                    }
                }
            }
            Name::AliasWildcard(n0) => {
                if let Some(pos) = path.alias_position(n0) {
                    Ok((
                        ColumnRef {
                            table: path.table_at(pos),
                            column: "*".to_string(),
                        },
                        ResolvedBase::Alias(n0.clone()),
                    ))
                } else {
                    let t = model.lookup_table(None, n0)?;
                    Err(PathError::ColumnNotFound {
                        column: "*".to_string(),
                        table: model.table(t).to_string(),
                    })
                }
            }
            Name::FullyQualified(n0, n1, n2) => {
                let t = model.lookup_table(Some(n0), n1)?;
                if model.table(t).has_column(n2) {
                    Ok((
                        ColumnRef {
                            table: t,
                            column: n2.clone(),
                        },
                        ResolvedBase::Model,
                    ))
                } else {
                    Err(PathError::ColumnNotFound {
                        column: n2.clone(),
                        table: model.table(t).to_string(),
                    })
                }
            }
        }
    }

    /// Resolve as a context shift target: must be a 1-part name naming a
    /// bound alias.
    pub fn resolve_context(&self, path: &EntityPath) -> Result<String, PathError> {
        match self {
            Name::Unqualified(n0) => {
                if path.alias_position(n0).is_some() {
                    Ok(n0.clone())
                } else {
                    Err(PathError::UnboundContextAlias {
                        name: self.to_string(),
                    })
                }
            }
            _ => Err(PathError::InvalidContextName {
                name: self.to_string(),
            }),
        }
    }

    /// Resolve as a table name: `table` if unambiguous across schemas, or
    /// `schema:table` exactly.
    pub fn resolve_table(&self, model: &Model) -> Result<TableId, PathError> {
        match self {
            Name::Unqualified(n0) => Ok(model.lookup_table(None, n0)?),
            Name::Qualified(n0, n1) => Ok(model.lookup_table(Some(n0), n1)?),
            _ => Err(PathError::InvalidTableName {
                name: self.to_string(),
            }),
        }
    }

    /// Resolve a table-name step into an inferred link from the path's
    /// current context.
    pub fn resolve_link(
        &self,
        model: &Model,
        path: &EntityPath,
    ) -> Result<(ForeignKeyId, LinkDirection), PathError> {
        let table = self.resolve_table(model)?;
        Ok(model.default_link(path.context_table(), table)?)
    }

    /// Resolve an explicitly named link column into a key reference plus
    /// the optional source alias the link departs from.
    pub fn resolve_link_column(
        &self,
        model: &Model,
        path: &EntityPath,
    ) -> Result<(ForeignKeyId, LinkDirection, Option<String>), PathError> {
        let (colref, base) = self.resolve_column(model, path, Some(path.context_table()))?;
        if colref.is_freetext() {
            return Err(PathError::InvalidLinkName {
                name: self.to_string(),
            });
        }
        let lalias = match &base {
            ResolvedBase::Alias(a) => Some(a.clone()),
            _ => None,
        };
        let source_table = match &lalias {
            Some(a) => path.table_at(path.alias_position(a).expect("alias resolved above")),
            None => path.context_table(),
        };
        let (fk, dir) = model.explicit_link(source_table, colref.table, &colref.column)?;
        Ok((fk, dir, lalias))
    }
}
