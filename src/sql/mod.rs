//! SQL text generation for the data path.

pub mod errors;
pub mod literal;
pub mod select;
pub mod write;

pub use errors::SqlError;
pub use select::{render_query, QueryShape};
pub use write::{render_attribute_delete, render_delete, render_insert, WriteInput};
