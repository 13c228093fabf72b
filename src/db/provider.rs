//! Database provider trait
//!
//! Defines the interface that every connection handler implements.
//! This abstraction allows for:
//! - Multiple database engines behind one API
//! - Engine-specific quoting, ordering and locking rules in one place
//! - Consistent error handling
//!
//! All calls are synchronous and block until the engine answers. A handler
//! is not meant to be shared between threads; each worker opens its own.

use crate::db::types::{CellValue, QueryResults};
use crate::error::DbResult;
use crate::sql::OrderSpec;

/// Main database provider trait
pub trait Database {
    /// Short engine name (e.g. `sqlite`)
    fn driver(&self) -> &'static str;

    /// Engine version string
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if the engine cannot be asked
    fn version(&self) -> DbResult<String>;

    /// Execute a statement that returns no rows
    ///
    /// # Arguments
    /// * `sql` - The SQL statement to execute
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if execution fails
    fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Run a query and fully materialize its rows
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if the query fails
    fn select(&self, sql: &str) -> DbResult<QueryResults>;

    /// Rows affected by the most recent statement
    fn changes(&self) -> u64;

    /// Row id generated by the most recent insert
    fn last_insert_id(&self) -> i64;

    /// Start a transaction (not reentrant)
    fn begin(&self) -> DbResult<()>;

    /// Commit the current transaction; no-op when none is active
    fn commit(&self) -> DbResult<()>;

    /// Roll back the current transaction; no-op when none is active
    fn rollback(&self) -> DbResult<()>;

    /// Whether a transaction is currently open
    fn in_transaction(&self) -> bool;

    /// Escape a value for inclusion inside a quoted string literal
    fn escape_string(&self, value: &str) -> String;

    /// Quote an identifier (table, column, index, trigger)
    fn escape_identifier(&self, value: &str) -> String;

    /// Render a full quoted literal for a cell value
    fn literal(&self, value: &CellValue) -> String {
        match value {
            CellValue::Null => "NULL".to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            CellValue::Text(s) | CellValue::DateTime(s) => {
                format!("'{}'", self.escape_string(s))
            }
            CellValue::Binary(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
        }
    }

    /// ` ORDER BY ...` fragment honoring the handler's collation policy
    fn order_by(&self, specs: &[OrderSpec]) -> String;

    /// Comma-separated fields wrapped for lexical ordering/grouping
    fn lexical_fields(&self, fields: &[&str]) -> String;

    /// String concatenation expression
    fn concat(&self, parts: &[&str]) -> String;

    /// ` LIMIT ...` fragment
    fn limit(&self, offset: Option<u64>, count: u64) -> String;

    /// ` IN (...)` fragment; an empty list renders `IN (NULL)` and matches nothing
    fn in_list(&self, values: &[CellValue]) -> String {
        if values.is_empty() {
            return " IN (NULL) ".to_string();
        }
        let items: Vec<String> = values.iter().map(|v| self.literal(v)).collect();
        format!(" IN ({}) ", items.join(", "))
    }

    /// Date formatting expression using strftime-style `pattern`
    fn date_format(&self, field: &str, pattern: &str) -> String;

    /// Take the engine's write lock on `table`
    fn write_lock(&self, table: &str) -> DbResult<()>;

    /// Release the write lock; no-op when nothing is locked
    fn unlock(&self) -> DbResult<()>;

    /// Ask for storage reclaim when the connection is closed.
    ///
    /// `None` targets the whole database. Engines that only reclaim whole
    /// databases treat a table name as a hint.
    fn vacuum(&self, table: Option<&str>);

    /// Scoped write lock released when the guard goes out of scope
    fn lock(&self, table: &str) -> DbResult<TableLock<'_, Self>>
    where
        Self: Sized,
    {
        self.write_lock(table)?;
        Ok(TableLock {
            db: self,
            table: table.to_string(),
            released: false,
        })
    }
}

/// Guard returned by [`Database::lock`]
///
/// Dropping the guard unlocks; a failure at that point can only be logged.
/// Call [`TableLock::release`] to observe it instead.
pub struct TableLock<'a, D: Database> {
    db: &'a D,
    table: String,
    released: bool,
}

impl<D: Database> TableLock<'_, D> {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Unlock now and report the outcome
    pub fn release(mut self) -> DbResult<()> {
        self.released = true;
        self.db.unlock()
    }
}

impl<D: Database> Drop for TableLock<'_, D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.db.unlock() {
            tracing::warn!(table = %self.table, error = %e, "failed to release table lock");
        }
    }
}
