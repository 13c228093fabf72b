//! SQLite schema engine
//!
//! SQLite cannot add constraints to an existing table, so primary and
//! unique keys only exist inside a buffered `CREATE TABLE`. Foreign keys
//! are emulated with triggers (see [`references`](crate::schema::references)).
//! Introspection reads `sqlite_master` and the `table_info`/`index_list`
//! pragmas.

use crate::db::Database;
use crate::db::sqlite::SqliteHandler;
use crate::db::types::{CellValue, QueryResults};
use crate::error::{DbError, DbResult};
use crate::schema::SchemaEngine;
use crate::schema::descriptors::{
    ColumnDescriptor, DefaultValue, IndexDescriptor, KeyDescriptor, ReferenceDescriptor,
    TableDescriptor, validate_identifier,
};
use crate::schema::references::{self, CATALOG_TABLE};
use crate::schema::stack::{ExecutionStack, PendingSchemaOp};
use crate::schema::translator::{TypeTranslator, render_type, split_declared_type};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Native types whose columns SQLite can "alter" without a rebuild
const ALTERABLE_TYPES: [&str; 3] = ["integer", "text", "timestamp"];

static KEY_CONSTRAINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?mi)^\s*CONSTRAINT\s+"?(\w+)"?\s+(PRIMARY\s+KEY|UNIQUE)\s*\(([^)]+)\)"#)
        .expect("Invalid key constraint regex")
});

/// Schema engine bound to one SQLite connection
pub struct SqliteSchema<'a> {
    db: &'a SqliteHandler,
    stack: ExecutionStack,
    /// Columns declared or added since the last flush
    declared: HashMap<String, TableDescriptor>,
    /// Catalog DDL already queued in this batch
    catalog_queued: bool,
}

impl<'a> SqliteSchema<'a> {
    pub fn new(db: &'a SqliteHandler) -> Self {
        Self {
            db,
            stack: ExecutionStack::new(),
            declared: HashMap::new(),
            catalog_queued: false,
        }
    }

    fn quote(&self, ident: &str) -> String {
        self.db.escape_identifier(ident)
    }

    fn quote_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn column_sql(&self, name: &str, column: &ColumnDescriptor) -> String {
        let (native, length, default) =
            self.db
                .translator()
                .to_native(&column.ty, column.length, column.default.clone());
        let mut sql = format!(
            "{} {} {}",
            self.quote(name),
            render_type(&native, length),
            if column.nullable { "NULL" } else { "NOT NULL" }
        );
        if let Some(value) = default.to_sql() {
            sql.push_str(" DEFAULT ");
            sql.push_str(&value);
        }
        sql
    }

    fn key_sql(&self, key: &KeyDescriptor) -> String {
        format!(
            "CONSTRAINT {} {} ({})",
            self.quote(&key.name),
            if key.primary { "PRIMARY KEY" } else { "UNIQUE" },
            self.quote_list(&key.columns)
        )
    }

    fn index_sql(&self, table: &str, index: &IndexDescriptor) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote(&index.name),
            self.quote(table),
            self.quote_list(&index.columns)
        )
    }

    fn add_key(&mut self, table: &str, key: &KeyDescriptor) -> DbResult<()> {
        if !self.stack.has_table(table) {
            return Err(DbError::UnsupportedAlteration(format!(
                "cannot add key {} to existing table {}",
                key.name, table
            )));
        }
        if let Some(columns) = self.declared.get(table) {
            if let Some(missing) = key.columns.iter().find(|c| !columns.contains(c)) {
                return Err(DbError::InvalidDescriptor(format!(
                    "key {} uses unknown column {}.{}",
                    key.name, table, missing
                )));
            }
        }
        let fragment = self.key_sql(key);
        self.stack.push(PendingSchemaOp::constraint(table, fragment));
        Ok(())
    }

    /// Nullability of a child column, from this batch or the catalog
    fn column_nullable(&self, table: &str, column: &str) -> DbResult<bool> {
        let catalog;
        let columns = match self.declared.get(table) {
            Some(columns) if columns.contains(column) || self.stack.has_table(table) => columns,
            _ => {
                catalog = self.list_columns(table)?;
                if catalog.is_empty() && !self.declared.contains_key(table) {
                    return Err(DbError::UnknownTable(table.to_string()));
                }
                &catalog
            }
        };
        columns.get(column).map(|c| c.nullable).ok_or_else(|| {
            DbError::InvalidDescriptor(format!("table {} has no column {}", table, column))
        })
    }

    /// Trigger statements for a reference, validated before anything is queued
    fn reference_triggers(
        &self,
        table: &str,
        reference: &ReferenceDescriptor,
    ) -> DbResult<Vec<String>> {
        if !reference.is_single_column() {
            return Err(DbError::UnsupportedMultiColumnReference(format!(
                "{} on {}",
                reference.name, table
            )));
        }
        let nullable = self.column_nullable(table, &reference.child_columns[0])?;
        references::build_triggers(self.db, table, reference, nullable)
    }

    fn queue_catalog(&mut self) {
        if !self.catalog_queued {
            self.stack
                .push(PendingSchemaOp::statement(references::catalog_ddl(self.db)));
            self.catalog_queued = true;
        }
    }

    fn queue_reference(&mut self, table: &str, reference: &ReferenceDescriptor, triggers: Vec<String>) {
        for trigger in triggers {
            self.stack.push(PendingSchemaOp::statement(trigger));
        }
        self.queue_catalog();
        self.stack.push(PendingSchemaOp::statement(references::catalog_insert(
            self.db, table, reference,
        )));
    }

    fn queue_reference_drop(&mut self, name: &str) {
        for statement in references::drop_triggers(self.db, name) {
            self.stack.push(PendingSchemaOp::statement(statement));
        }
        self.queue_catalog();
        self.stack
            .push(PendingSchemaOp::statement(references::catalog_delete(self.db, name)));
    }

    fn catalog_select(&self, sql: &str) -> DbResult<QueryResults> {
        tracing::debug!(sql, "catalog query");
        self.db.select(sql)
    }

    fn table_sql(&self, table: &str) -> DbResult<Option<String>> {
        let results = self.catalog_select(&format!(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            self.db.escape_string(table)
        ))?;
        Ok(text(&results, 0, "sql").map(str::to_string))
    }

    fn trigger_sql(&self, name: &str) -> DbResult<Option<String>> {
        let results = self.catalog_select(&format!(
            "SELECT sql FROM sqlite_master WHERE type = 'trigger' AND name = '{}'",
            self.db.escape_string(name)
        ))?;
        Ok(text(&results, 0, "sql").map(str::to_string))
    }

    /// References recorded in the catalog table, keyed by name
    fn catalog_references(&self, table: &str) -> DbResult<HashMap<String, ReferenceDescriptor>> {
        let mut found = HashMap::new();
        if self.table_sql(CATALOG_TABLE)?.is_none() {
            return Ok(found);
        }
        let results = self.catalog_select(&format!(
            "SELECT name, child_column, parent_table, parent_column, on_update, on_delete \
             FROM {} WHERE child_table = '{}'",
            self.quote(CATALOG_TABLE),
            self.db.escape_string(table)
        ))?;
        for row in 0..results.row_count {
            let field = |column: &str| text(&results, row, column).unwrap_or_default();
            let reference = ReferenceDescriptor::new(
                field("name"),
                [field("child_column")],
                field("parent_table"),
                [field("parent_column")],
            )?
            .on_update(field("on_update").parse()?)
            .on_delete(field("on_delete").parse()?);
            found.insert(reference.name.clone(), reference);
        }
        Ok(found)
    }
}

fn text<'r>(results: &'r QueryResults, row: usize, column: &str) -> Option<&'r str> {
    results.get(row, column).and_then(CellValue::as_str)
}

fn render_table(db: &SqliteHandler, name: &str, fragments: &[String]) -> String {
    format!(
        "CREATE TABLE {} (\n  {}\n)",
        db.escape_identifier(name),
        fragments.join(",\n  ")
    )
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl SchemaEngine for SqliteSchema<'_> {
    fn translator(&self) -> &dyn TypeTranslator {
        self.db.translator()
    }

    fn list_tables(&self) -> DbResult<Vec<String>> {
        let results = self.catalog_select(&format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' AND name <> '{}' ORDER BY name",
            CATALOG_TABLE
        ))?;
        Ok((0..results.row_count)
            .filter_map(|row| text(&results, row, "name").map(str::to_string))
            .collect())
    }

    fn list_columns(&self, table: &str) -> DbResult<TableDescriptor> {
        let results =
            self.catalog_select(&format!("PRAGMA table_info({})", self.quote(table)))?;
        let mut columns = TableDescriptor::new();
        for row in 0..results.row_count {
            let name = text(&results, row, "name").unwrap_or_default();
            let declared = text(&results, row, "type").unwrap_or_default();
            let not_null = results
                .get(row, "notnull")
                .and_then(CellValue::as_i64)
                .unwrap_or(0)
                != 0;
            let default = DefaultValue::from_sql(text(&results, row, "dflt_value"));

            let (base, length) = split_declared_type(declared);
            let (ty, length, default) = self.translator().to_universal(&base, length, default);
            columns.add(
                name,
                ColumnDescriptor {
                    ty,
                    length,
                    nullable: !not_null,
                    default,
                },
            )?;
        }
        Ok(columns)
    }

    fn list_keys(&self, table: &str) -> DbResult<Vec<KeyDescriptor>> {
        let Some(sql) = self.table_sql(table)? else {
            return Ok(Vec::new());
        };
        KEY_CONSTRAINT
            .captures_iter(&sql)
            .map(|caps| {
                let columns = split_columns(&caps[3]);
                if caps[2].to_ascii_uppercase().starts_with("PRIMARY") {
                    KeyDescriptor::primary(&caps[1], columns)
                } else {
                    KeyDescriptor::unique(&caps[1], columns)
                }
            })
            .collect()
    }

    fn list_indexes(&self, table: &str) -> DbResult<Vec<IndexDescriptor>> {
        let list = self.catalog_select(&format!("PRAGMA index_list({})", self.quote(table)))?;
        let mut indexes = Vec::new();
        for row in 0..list.row_count {
            // 'pk' and 'u' indexes back key constraints
            if text(&list, row, "origin") != Some("c") {
                continue;
            }
            let Some(name) = text(&list, row, "name") else {
                continue;
            };
            let info = self.catalog_select(&format!("PRAGMA index_info({})", self.quote(name)))?;
            let mut columns: Vec<(i64, String)> = (0..info.row_count)
                .filter_map(|r| {
                    let seq = info.get(r, "seqno").and_then(CellValue::as_i64)?;
                    Some((seq, text(&info, r, "name")?.to_string()))
                })
                .collect();
            columns.sort_by_key(|(seq, _)| *seq);
            indexes.push(IndexDescriptor::new(
                name,
                columns.into_iter().map(|(_, c)| c),
            )?);
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    fn list_references(&self, table: &str) -> DbResult<Vec<ReferenceDescriptor>> {
        let mut recorded = self.catalog_references(table)?;
        let guards = self.catalog_select(&format!(
            "SELECT name, sql FROM sqlite_master WHERE type = 'trigger' AND tbl_name = '{}' \
             AND name LIKE 'bir\\_%' ESCAPE '\\' ORDER BY name",
            self.db.escape_string(table)
        ))?;

        let mut found = Vec::new();
        for row in 0..guards.row_count {
            let Some(name) = text(&guards, row, "name").and_then(references::reference_name_from_guard)
            else {
                continue;
            };
            if let Some(reference) = recorded.remove(name) {
                found.push(reference);
                continue;
            }

            let Some(guard) = text(&guards, row, "sql").and_then(references::parse_guard) else {
                tracing::debug!(trigger = name, "guard trigger body not recognised");
                continue;
            };
            let on_update = references::classify_update(
                self.trigger_sql(&references::parent_update_name(name))?
                    .as_deref(),
                table,
                &guard.child_column,
            );
            let on_delete = references::classify_delete(
                self.trigger_sql(&references::parent_delete_name(name))?
                    .as_deref(),
                table,
                &guard.child_column,
            );
            found.push(
                ReferenceDescriptor::new(
                    name,
                    [guard.child_column],
                    &guard.parent_table,
                    [guard.parent_column],
                )?
                .on_update(on_update)
                .on_delete(on_delete),
            );
        }
        Ok(found)
    }

    fn create_table(&mut self, name: &str, columns: &TableDescriptor) -> DbResult<()> {
        validate_identifier("table", name)?;
        if columns.is_empty() {
            return Err(DbError::InvalidDescriptor(format!(
                "table {} has no columns",
                name
            )));
        }
        if self.stack.has_table(name) {
            return Err(DbError::InvalidDescriptor(format!(
                "table {} is already declared",
                name
            )));
        }
        for (column, descriptor) in columns.iter() {
            let fragment = self.column_sql(column, descriptor);
            self.stack.push(PendingSchemaOp::column(name, fragment));
        }
        self.declared.insert(name.to_string(), columns.clone());
        Ok(())
    }

    fn create_field(
        &mut self,
        table: &str,
        name: &str,
        column: &ColumnDescriptor,
    ) -> DbResult<()> {
        let pending = self.stack.has_table(table);
        if !pending && !column.nullable && column.default.to_sql().is_none() {
            return Err(DbError::UnsupportedAlteration(format!(
                "cannot add NOT NULL column {}.{} without a default",
                table, name
            )));
        }
        self.declared
            .entry(table.to_string())
            .or_default()
            .add(name, column.clone())?;

        let fragment = self.column_sql(name, column);
        if pending {
            self.stack.push(PendingSchemaOp::column(table, fragment));
        } else {
            self.stack.push(PendingSchemaOp::statement(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote(table),
                fragment
            )));
        }
        Ok(())
    }

    fn create_primary(&mut self, table: &str, key: &KeyDescriptor) -> DbResult<()> {
        self.add_key(table, key)
    }

    fn create_unique(&mut self, table: &str, key: &KeyDescriptor) -> DbResult<()> {
        self.add_key(table, key)
    }

    fn create_index(&mut self, table: &str, index: &IndexDescriptor) -> DbResult<()> {
        let sql = self.index_sql(table, index);
        self.stack.push(PendingSchemaOp::statement(sql));
        Ok(())
    }

    fn create_reference(
        &mut self,
        table: &str,
        reference: &ReferenceDescriptor,
    ) -> DbResult<()> {
        let triggers = self.reference_triggers(table, reference)?;
        self.queue_reference(table, reference, triggers);
        Ok(())
    }

    fn alter_field(
        &mut self,
        table: &str,
        name: &str,
        column: &ColumnDescriptor,
    ) -> DbResult<()> {
        let (native, _, _) =
            self.db
                .translator()
                .to_native(&column.ty, column.length, column.default.clone());
        if ALTERABLE_TYPES.contains(&native.as_str()) {
            // Column affinity is advisory in SQLite; existing data keeps working
            tracing::warn!(table, column = name, ty = %native, "column alteration accepted as no-op");
            Ok(())
        } else {
            Err(DbError::UnsupportedAlteration(format!(
                "cannot change column {}.{} to {}",
                table, name, native
            )))
        }
    }

    fn alter_primary(&mut self, table: &str, name: &str, _key: &KeyDescriptor) -> DbResult<()> {
        Err(DbError::UnsupportedAlteration(format!(
            "cannot alter primary key {} on {}",
            name, table
        )))
    }

    fn alter_unique(&mut self, table: &str, name: &str, _key: &KeyDescriptor) -> DbResult<()> {
        Err(DbError::UnsupportedAlteration(format!(
            "cannot alter unique key {} on {}",
            name, table
        )))
    }

    fn alter_index(&mut self, table: &str, name: &str, index: &IndexDescriptor) -> DbResult<()> {
        self.drop_index(table, name)?;
        self.create_index(table, index)
    }

    fn alter_reference(
        &mut self,
        table: &str,
        name: &str,
        reference: &ReferenceDescriptor,
    ) -> DbResult<()> {
        let triggers = self.reference_triggers(table, reference)?;
        self.queue_reference_drop(name);
        self.queue_reference(table, reference, triggers);
        Ok(())
    }

    fn drop_unique(&mut self, table: &str, name: &str) -> DbResult<()> {
        Err(DbError::UnsupportedDrop(format!(
            "cannot drop unique key {} on {}",
            name, table
        )))
    }

    fn drop_index(&mut self, _table: &str, name: &str) -> DbResult<()> {
        let sql = format!("DROP INDEX IF EXISTS {}", self.quote(name));
        self.stack.push(PendingSchemaOp::statement(sql));
        Ok(())
    }

    fn drop_reference(&mut self, _table: &str, name: &str) -> DbResult<()> {
        self.queue_reference_drop(name);
        Ok(())
    }

    fn pending_sql(&self) -> Vec<String> {
        self.stack
            .preview(|name, fragments| render_table(self.db, name, fragments))
    }

    fn flush(&mut self) -> DbResult<usize> {
        if self.stack.is_empty() {
            return Ok(0);
        }
        let db = self.db;
        let statements = self
            .stack
            .drain(|name, fragments| render_table(db, name, fragments));
        self.declared.clear();
        self.catalog_queued = false;

        let owns_transaction = !db.in_transaction();
        if owns_transaction {
            db.begin()?;
        }
        for sql in &statements {
            if let Err(e) = db.execute(sql) {
                if owns_transaction {
                    if let Err(rollback) = db.rollback() {
                        tracing::warn!(error = %rollback, "rollback after failed flush failed");
                    }
                }
                return Err(e);
            }
        }
        if owns_transaction {
            db.commit()?;
        }

        tracing::info!(statements = statements.len(), "flushed schema changes");
        Ok(statements.len())
    }
}
