//! Row writer for a single table
//!
//! A `Cursor` collects `field = value` assignments and turns them into an
//! `INSERT` or an `UPDATE ... WHERE` through the handler's own escaping.
//!
//! ```no_run
//! use dblayer::config::ConnectionConfig;
//! use dblayer::db::{Cursor, SqliteHandler};
//!
//! # fn example() -> dblayer::error::DbResult<()> {
//! let db = SqliteHandler::connect(&ConnectionConfig::memory())?;
//! let mut cur = Cursor::new(&db, "post");
//! cur.set("title", "Hello").set_expression("created", "now()");
//! cur.insert()?;
//! cur.update("id = 1")?;
//! # Ok(())
//! # }
//! ```

use crate::db::Database;
use crate::db::types::CellValue;
use crate::error::{DbError, DbResult};

/// Value assigned to a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal, escaped on rendering
    Value(CellValue),
    /// Raw SQL expression, rendered verbatim
    Expression(String),
}

pub struct Cursor<'a, D: Database + ?Sized> {
    db: &'a D,
    table: String,
    fields: Vec<(String, FieldValue)>,
}

impl<'a, D: Database + ?Sized> Cursor<'a, D> {
    pub fn new(db: &'a D, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Assign a literal value, replacing any previous assignment
    pub fn set(&mut self, field: &str, value: impl Into<CellValue>) -> &mut Self {
        self.assign(field, FieldValue::Value(value.into()))
    }

    /// Assign a raw SQL expression such as `now()` or `count + 1`
    pub fn set_expression(&mut self, field: &str, expression: impl Into<String>) -> &mut Self {
        self.assign(field, FieldValue::Expression(expression.into()))
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn unset(&mut self, field: &str) -> &mut Self {
        self.fields.retain(|(name, _)| name != field);
        self
    }

    /// Forget every assignment
    pub fn clean(&mut self) {
        self.fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn insert_sql(&self) -> DbResult<String> {
        self.ensure_fields("insert")?;
        let names: Vec<String> = self
            .fields
            .iter()
            .map(|(name, _)| self.db.escape_identifier(name))
            .collect();
        let values: Vec<String> = self
            .fields
            .iter()
            .map(|(_, value)| self.render(value))
            .collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.db.escape_identifier(&self.table),
            names.join(", "),
            values.join(", ")
        ))
    }

    /// `UPDATE` statement; `WHERE` is prepended to `where_clause` when missing.
    pub fn update_sql(&self, where_clause: &str) -> DbResult<String> {
        self.ensure_fields("update")?;
        let assignments: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| {
                format!("{} = {}", self.db.escape_identifier(name), self.render(value))
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.db.escape_identifier(&self.table),
            assignments.join(", ")
        );
        let condition = where_clause.trim();
        if !condition.is_empty() {
            let has_keyword = condition
                .get(..6)
                .is_some_and(|head| head.eq_ignore_ascii_case("where "));
            sql.push(' ');
            if !has_keyword {
                sql.push_str("WHERE ");
            }
            sql.push_str(condition);
        }
        Ok(sql)
    }

    /// Run the insert; returns the affected row count
    pub fn insert(&self) -> DbResult<usize> {
        let sql = self.insert_sql()?;
        self.db.execute(&sql)
    }

    /// Run the update; returns the affected row count
    pub fn update(&self, where_clause: &str) -> DbResult<usize> {
        let sql = self.update_sql(where_clause)?;
        self.db.execute(&sql)
    }

    fn assign(&mut self, field: &str, value: FieldValue) -> &mut Self {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
        self
    }

    fn render(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Value(v) => self.db.literal(v),
            FieldValue::Expression(e) => e.clone(),
        }
    }

    fn ensure_fields(&self, op: &str) -> DbResult<()> {
        if self.fields.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "no fields to {} on {}",
                op, self.table
            )));
        }
        Ok(())
    }
}
