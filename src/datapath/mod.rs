//! The data path: names, entity paths, filters, and projections.
//!
//! This layer turns the parsed URL AST into a bound relational algebra
//! over a catalog model. It owns no I/O; SQL text generation lives in
//! `crate::sql` and execution in `crate::server`.

pub mod errors;
pub mod filter;
pub mod name;
pub mod path;
pub mod projection;

pub use errors::PathError;
pub use filter::{BoundFilter, FilterOp, FilterTree};
pub use name::{ColumnRef, Name, ResolvedBase};
pub use path::{EntityPath, Link, PathElement, SortKey};
pub use projection::{preprocess_projection, AggregateFn, ProjectionItem, RawProjection};
