//! SQLite database provider
//!
//! Concrete implementation using rusqlite. Queries are materialized in full
//! before `select` returns; no statement or cursor outlives the call.

use crate::config::ConnectionConfig;
use crate::db::Database;
use crate::db::types::{CellValue, ColumnDef, QueryResults, Row};
use crate::error::{DbError, DbResult};
use crate::schema::descriptors::{DefaultValue, UniversalType};
use crate::schema::sqlite::SqliteSchema;
use crate::schema::translator::{SqliteTranslator, TypeTranslator, split_declared_type};
use crate::sql::{Collation, OrderSpec, order};
use feruca::{Collator, Tailoring};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use std::cell::Cell;
use std::cmp::Ordering;
use std::panic::UnwindSafe;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// SQLite database provider
pub struct SqliteHandler {
    /// The rusqlite connection
    conn: Connection,
    /// Database file (or `:memory:`)
    database: String,
    /// Attach SQL text to query errors
    verbose_errors: bool,
    /// Registered collation, if any
    collation: Option<Collation>,
    /// Run VACUUM when the connection is closed
    vacuum_requested: Cell<bool>,
    translator: SqliteTranslator,
}

impl SqliteHandler {
    /// Open a SQLite database.
    ///
    /// Registers a `now()` SQL function and, when the profile asks for
    /// one, the profile's collation.
    pub fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        let conn = if config.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.database)
        }
        .map_err(|e| DbError::ConnectFailed(format!("{}: {}", config.database, e)))?;

        if config.persistent {
            tracing::debug!("persistent connections are not applicable to sqlite");
        }

        conn.create_scalar_function("now", 0, FunctionFlags::SQLITE_UTF8, |_ctx| {
            Ok(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
        })
        .map_err(|e| DbError::ConnectFailed(format!("cannot register now(): {}", e)))?;

        if let Some(collation) = config.collation {
            conn.create_collation(collation.name(), unicode_ci_collator())
                .map_err(|e| {
                    DbError::ConnectFailed(format!(
                        "cannot register collation {}: {}",
                        collation.name(),
                        e
                    ))
                })?;
        }

        tracing::info!(database = %config.database, "opened sqlite connection");

        Ok(Self {
            conn,
            database: config.database.clone(),
            verbose_errors: config.verbose_errors,
            collation: config.collation,
            vacuum_requested: Cell::new(false),
            translator: SqliteTranslator::new(),
        })
    }

    /// Close the connection, reclaiming storage first if a vacuum was requested.
    pub fn close(self) -> DbResult<()> {
        if self.vacuum_requested.get() {
            if !self.conn.is_autocommit() {
                self.rollback()?;
            }
            self.execute("VACUUM")?;
        }
        let database = self.database;
        self.conn
            .close()
            .map_err(|(_, e)| DbError::query(e.to_string(), "", false))?;
        tracing::info!(database = %database, "closed sqlite connection");
        Ok(())
    }

    /// Schema engine bound to this connection
    pub fn schema(&self) -> SqliteSchema<'_> {
        SqliteSchema::new(self)
    }

    pub fn translator(&self) -> &SqliteTranslator {
        &self.translator
    }

    fn query_error(&self, e: rusqlite::Error, sql: &str) -> DbError {
        DbError::query(error_message(e), sql, self.verbose_errors)
    }

    fn column_type(&self, declared: Option<&str>, sample: Option<&CellValue>) -> UniversalType {
        match declared {
            Some(decl) => {
                let (base, length) = split_declared_type(decl);
                self.translator
                    .to_universal(&base, length, DefaultValue::None)
                    .0
            }
            None => match sample {
                Some(CellValue::Integer(_)) => UniversalType::Integer,
                Some(CellValue::Float(_)) => UniversalType::Real,
                Some(CellValue::Binary(_)) => UniversalType::Other("blob".to_string()),
                _ => UniversalType::Text,
            },
        }
    }
}

impl Database for SqliteHandler {
    fn driver(&self) -> &'static str {
        "sqlite"
    }

    fn version(&self) -> DbResult<String> {
        let results = self.select("SELECT sqlite_version() AS version")?;
        Ok(results
            .get(0, "version")
            .and_then(CellValue::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn execute(&self, sql: &str) -> DbResult<usize> {
        tracing::debug!(sql, "execute");
        self.conn
            .execute(sql, ())
            .map_err(|e| self.query_error(e, sql))
    }

    fn select(&self, sql: &str) -> DbResult<QueryResults> {
        tracing::debug!(sql, "select");
        let start = Instant::now();

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| self.query_error(e, sql))?;

        let declared: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
            .collect();

        let mut rows = Vec::new();
        {
            let mut cursor = stmt.query(()).map_err(|e| self.query_error(e, sql))?;
            while let Some(row) = cursor.next().map_err(|e| self.query_error(e, sql))? {
                let mut values = Vec::with_capacity(declared.len());
                for i in 0..declared.len() {
                    let value = row.get_ref(i).map_err(|e| self.query_error(e, sql))?;
                    values.push(cell_from_ref(value));
                }
                rows.push(Row { values });
            }
        }

        let columns: Vec<ColumnDef> = declared
            .iter()
            .enumerate()
            .map(|(i, (name, decl))| {
                let sample = rows.first().and_then(|r| r.values.get(i));
                ColumnDef {
                    name: name.clone(),
                    data_type: self.column_type(decl.as_deref(), sample),
                    nullable: true,
                }
            })
            .collect();

        // Temporal columns carry their text as date/time values
        for row in &mut rows {
            for (value, col) in row.values.iter_mut().zip(&columns) {
                if col.data_type.is_temporal() {
                    if let CellValue::Text(s) = value {
                        *value = CellValue::DateTime(std::mem::take(s));
                    }
                }
            }
        }

        let row_count = rows.len();
        Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
    }

    fn changes(&self) -> u64 {
        self.conn.changes() as u64
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn begin(&self) -> DbResult<()> {
        self.execute("BEGIN").map(|_| ())
    }

    fn commit(&self) -> DbResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.execute("COMMIT").map(|_| ())
    }

    fn rollback(&self) -> DbResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.execute("ROLLBACK").map(|_| ())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn escape_identifier(&self, value: &str) -> String {
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    fn order_by(&self, specs: &[OrderSpec]) -> String {
        order::order_by_clause(specs, self.collation)
    }

    fn lexical_fields(&self, fields: &[&str]) -> String {
        order::lexical_fields(fields, self.collation)
    }

    fn concat(&self, parts: &[&str]) -> String {
        parts.join(" || ")
    }

    fn limit(&self, offset: Option<u64>, count: u64) -> String {
        match offset {
            Some(offset) => format!(" LIMIT {} OFFSET {} ", count, offset),
            None => format!(" LIMIT {} ", count),
        }
    }

    fn date_format(&self, field: &str, pattern: &str) -> String {
        format!("strftime('{}', {})", self.escape_string(pattern), field)
    }

    fn write_lock(&self, table: &str) -> DbResult<()> {
        // SQLite only locks whole databases
        tracing::debug!(table, "taking exclusive database lock");
        self.execute("BEGIN EXCLUSIVE TRANSACTION").map(|_| ())
    }

    fn unlock(&self) -> DbResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.execute("END").map(|_| ())
    }

    fn vacuum(&self, table: Option<&str>) {
        tracing::debug!(table = table.unwrap_or("*"), "vacuum requested for close");
        self.vacuum_requested.set(true);
    }
}

/// Convert a borrowed SQLite value into an owned cell
fn cell_from_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::Binary(b.to_vec()),
    }
}

/// Error text without the statement.
///
/// rusqlite renders parse errors as `<msg> in <sql> at offset <n>`; the
/// statement is only ever attached through `DbError::query`.
fn error_message(e: rusqlite::Error) -> String {
    match e {
        rusqlite::Error::SqlInputError { msg, offset, .. } => {
            format!("{} at offset {}", msg, offset)
        }
        other => other.to_string(),
    }
}

/// Unicode Collation Algorithm comparison (CLDR root order) over
/// case-folded input, so strings differing only in case are equal and
/// accented letters sort beside their base letter.
fn unicode_ci_collator() -> impl Fn(&str, &str) -> Ordering + Send + UnwindSafe + 'static {
    let collator = Mutex::new(Collator::new(Tailoring::default(), true, false));
    move |a: &str, b: &str| {
        let mut collator = collator.lock().unwrap_or_else(PoisonError::into_inner);
        collator.collate(a.to_lowercase().as_str(), b.to_lowercase().as_str())
    }
}
