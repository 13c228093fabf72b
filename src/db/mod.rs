//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over connection handling,
//! so schema and domain code never depend on a specific engine.

pub mod cursor;
pub mod provider;
pub mod sqlite;
pub mod types;

// Re-export main types
pub use cursor::{Cursor, FieldValue};
pub use provider::{Database, TableLock};
pub use sqlite::SqliteHandler;
pub use types::{CellValue, ColumnDef, QueryResults, Row};
