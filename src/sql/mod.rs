//! SQL utilities
//!
//! Fragment helpers shared by every engine (ORDER BY specs, collation
//! policy) and pretty-printing of generated statements.

pub mod formatter;
pub mod order;

pub use formatter::format_sql;
pub use order::{Collation, Direction, OrderSpec};
