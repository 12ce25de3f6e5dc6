//! Parsed URL data-path AST, consumed by the endpoint dispatchers.

use crate::datapath::{FilterTree, Name, SortKey};

#[derive(Debug, Clone, PartialEq)]
pub enum PathElementAst {
    /// A table-name step: base entity or inferred join.
    Step { name: Name, alias: Option<String> },
    /// An explicit link step, `(column)`.
    Link { name: Name, alias: Option<String> },
    Filter(FilterTree),
    /// A context shift, `$alias`.
    Context(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPathAst {
    pub elements: Vec<PathElementAst>,
    pub sort: Vec<SortKey>,
    pub before: Option<Vec<String>>,
    pub after: Option<Vec<String>>,
}
