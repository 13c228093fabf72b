//! Desired-schema model and synchronization
//!
//! A [`Structure`] lists the tables an application expects. It is built in
//! code or loaded from a TOML manifest:
//!
//! ```toml
//! [[table]]
//! name = "category"
//! columns = [
//!     { name = "id", type = "integer", nullable = false },
//!     { name = "title", type = "varchar", length = 255 },
//! ]
//! primary = { name = "pk_category", columns = ["id"] }
//! indexes = [{ name = "idx_category_title", columns = ["title"] }]
//!
//! [[table]]
//! name = "post"
//! columns = [
//!     { name = "id", type = "integer", nullable = false },
//!     { name = "cat_id", type = "integer" },
//!     { name = "created", type = "timestamp", nullable = false, default_expr = "now()" },
//! ]
//! references = [
//!     { name = "fk_post_category", columns = ["cat_id"], parent = "category", parent_columns = ["id"], on_delete = "set null" },
//! ]
//! ```
//!
//! [`Structure::plan`] compares it with what the engine reports and queues
//! the missing or changed pieces; [`Structure::synchronize`] also flushes.
//! Columns are compared after translation to native types, so aliases that
//! collapse on the engine (`bigint`/`integer` on SQLite) are not changes.

use crate::error::{ConfigError, DbError, DbResult, Result};
use crate::schema::SchemaEngine;
use crate::schema::descriptors::{
    ColumnDescriptor, DefaultValue, IndexDescriptor, KeyDescriptor, ReferenceDescriptor,
    TableDescriptor, UniversalType, validate_identifier,
};
use crate::schema::translator::{TypeTranslator, render_type};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Desired shape of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    name: String,
    columns: TableDescriptor,
    primary: Option<KeyDescriptor>,
    uniques: Vec<KeyDescriptor>,
    indexes: Vec<IndexDescriptor>,
    references: Vec<ReferenceDescriptor>,
}

impl TableSpec {
    pub fn new(name: &str) -> DbResult<Self> {
        validate_identifier("table", name)?;
        Ok(Self {
            name: name.to_string(),
            columns: TableDescriptor::new(),
            primary: None,
            uniques: Vec::new(),
            indexes: Vec::new(),
            references: Vec::new(),
        })
    }

    pub fn field(mut self, name: &str, column: ColumnDescriptor) -> DbResult<Self> {
        self.columns.add(name, column)?;
        Ok(self)
    }

    pub fn primary<I, S>(mut self, name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(existing) = &self.primary {
            return Err(DbError::InvalidDescriptor(format!(
                "table {} already has primary key {}",
                self.name, existing.name
            )));
        }
        let key = KeyDescriptor::primary(name, columns)?;
        self.check_name(&key.name)?;
        self.check_columns(&key.name, &key.columns)?;
        self.primary = Some(key);
        Ok(self)
    }

    pub fn unique<I, S>(mut self, name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = KeyDescriptor::unique(name, columns)?;
        self.check_name(&key.name)?;
        self.check_columns(&key.name, &key.columns)?;
        self.uniques.push(key);
        Ok(self)
    }

    pub fn index<I, S>(mut self, name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = IndexDescriptor::new(name, columns)?;
        self.check_name(&index.name)?;
        self.check_columns(&index.name, &index.columns)?;
        self.indexes.push(index);
        Ok(self)
    }

    /// Add a reference whose child columns belong to this table
    pub fn reference(mut self, reference: ReferenceDescriptor) -> DbResult<Self> {
        self.check_name(&reference.name)?;
        self.check_columns(&reference.name, &reference.child_columns)?;
        self.references.push(reference);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &TableDescriptor {
        &self.columns
    }

    pub fn primary_key(&self) -> Option<&KeyDescriptor> {
        self.primary.as_ref()
    }

    pub fn unique_keys(&self) -> &[KeyDescriptor] {
        &self.uniques
    }

    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub fn references(&self) -> &[ReferenceDescriptor] {
        &self.references
    }

    fn keys(&self) -> impl Iterator<Item = &KeyDescriptor> {
        self.primary.iter().chain(&self.uniques)
    }

    fn check_name(&self, name: &str) -> DbResult<()> {
        let taken = self.keys().any(|k| k.name == name)
            || self.indexes.iter().any(|i| i.name == name)
            || self.references.iter().any(|r| r.name == name);
        if taken {
            return Err(DbError::InvalidDescriptor(format!(
                "duplicate name {} on table {}",
                name, self.name
            )));
        }
        Ok(())
    }

    fn check_columns(&self, owner: &str, columns: &[String]) -> DbResult<()> {
        match columns.iter().find(|c| !self.columns.contains(c)) {
            Some(missing) => Err(DbError::InvalidDescriptor(format!(
                "{} uses unknown column {}.{}",
                owner, self.name, missing
            ))),
            None => Ok(()),
        }
    }
}

/// Changes queued (and, after [`Structure::synchronize`], run) by a sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub tables_created: usize,
    pub fields_created: usize,
    pub fields_altered: usize,
    pub keys_created: usize,
    pub keys_altered: usize,
    pub indexes_created: usize,
    pub indexes_altered: usize,
    pub references_created: usize,
    pub references_altered: usize,
    /// Statements executed by the flush; zero for a plan
    pub statements: usize,
}

impl SyncReport {
    /// Total number of schema changes
    pub fn changes(&self) -> usize {
        self.tables_created
            + self.fields_created
            + self.fields_altered
            + self.keys_created
            + self.keys_altered
            + self.indexes_created
            + self.indexes_altered
            + self.references_created
            + self.references_altered
    }

    pub fn is_empty(&self) -> bool {
        self.changes() == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tables created, {} fields created, {} fields altered, \
             {} keys created, {} keys altered, {} indexes created, {} indexes altered, \
             {} references created, {} references altered",
            self.tables_created,
            self.fields_created,
            self.fields_altered,
            self.keys_created,
            self.keys_altered,
            self.indexes_created,
            self.indexes_altered,
            self.references_created,
            self.references_altered
        )
    }
}

/// Ordered set of desired tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    tables: Vec<TableSpec>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Structure::add`]
    pub fn table(mut self, spec: TableSpec) -> DbResult<Self> {
        self.add(spec)?;
        Ok(self)
    }

    pub fn add(&mut self, spec: TableSpec) -> DbResult<()> {
        if self.get(spec.name()).is_some() {
            return Err(DbError::InvalidDescriptor(format!(
                "duplicate table {}",
                spec.name()
            )));
        }
        self.tables.push(spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Parse a TOML manifest
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content).map_err(ConfigError::from)?;
        let mut structure = Structure::new();
        for table in manifest.tables {
            structure.add(table.into_spec()?)?;
        }
        Ok(structure)
    }

    /// Load a TOML manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Queue every change needed to reach this structure, without flushing.
    ///
    /// # Errors
    /// Capability errors from the engine (`UnsupportedAlteration`, ...)
    /// are returned as they are; changes queued before the failure stay queued.
    pub fn plan(&self, engine: &mut dyn SchemaEngine) -> DbResult<SyncReport> {
        let existing: HashSet<String> = engine.list_tables()?.into_iter().collect();
        let mut report = SyncReport::default();

        for spec in &self.tables {
            if existing.contains(&spec.name) {
                update_table(engine, spec, &mut report)?;
            } else {
                create_table(engine, spec, &mut report)?;
            }
        }

        tracing::debug!(changes = report.changes(), "planned schema synchronization");
        Ok(report)
    }

    /// [`Structure::plan`] followed by a flush
    pub fn synchronize(&self, engine: &mut dyn SchemaEngine) -> DbResult<SyncReport> {
        let mut report = self.plan(engine)?;
        report.statements = engine.flush()?;
        Ok(report)
    }
}

fn create_table(
    engine: &mut dyn SchemaEngine,
    spec: &TableSpec,
    report: &mut SyncReport,
) -> DbResult<()> {
    engine.create_table(&spec.name, &spec.columns)?;
    report.tables_created += 1;
    if let Some(key) = &spec.primary {
        engine.create_primary(&spec.name, key)?;
        report.keys_created += 1;
    }
    for key in &spec.uniques {
        engine.create_unique(&spec.name, key)?;
        report.keys_created += 1;
    }
    for index in &spec.indexes {
        engine.create_index(&spec.name, index)?;
        report.indexes_created += 1;
    }
    for reference in &spec.references {
        engine.create_reference(&spec.name, reference)?;
        report.references_created += 1;
    }
    Ok(())
}

fn update_table(
    engine: &mut dyn SchemaEngine,
    spec: &TableSpec,
    report: &mut SyncReport,
) -> DbResult<()> {
    let table = spec.name.as_str();

    let columns = engine.list_columns(table)?;
    for (name, wanted) in spec.columns.iter() {
        match columns.get(name) {
            None => {
                engine.create_field(table, name, wanted)?;
                report.fields_created += 1;
            }
            Some(current) if column_differs(engine.translator(), current, wanted) => {
                engine.alter_field(table, name, wanted)?;
                report.fields_altered += 1;
            }
            Some(_) => {}
        }
    }

    let keys = engine.list_keys(table)?;
    for key in spec.keys() {
        match keys.iter().find(|k| k.name == key.name) {
            None if key.primary => {
                engine.create_primary(table, key)?;
                report.keys_created += 1;
            }
            None => {
                engine.create_unique(table, key)?;
                report.keys_created += 1;
            }
            Some(current) if current != key => {
                if key.primary {
                    engine.alter_primary(table, &key.name, key)?;
                } else {
                    engine.alter_unique(table, &key.name, key)?;
                }
                report.keys_altered += 1;
            }
            Some(_) => {}
        }
    }

    let indexes = engine.list_indexes(table)?;
    for index in &spec.indexes {
        match indexes.iter().find(|i| i.name == index.name) {
            None => {
                engine.create_index(table, index)?;
                report.indexes_created += 1;
            }
            Some(current) if current.columns != index.columns => {
                engine.alter_index(table, &index.name, index)?;
                report.indexes_altered += 1;
            }
            Some(_) => {}
        }
    }

    let references = engine.list_references(table)?;
    for reference in &spec.references {
        match references.iter().find(|r| r.name == reference.name) {
            None => {
                engine.create_reference(table, reference)?;
                report.references_created += 1;
            }
            Some(current) if current != reference => {
                engine.alter_reference(table, &reference.name, reference)?;
                report.references_altered += 1;
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Compare two columns as the engine would store them
fn column_differs(
    translator: &dyn TypeTranslator,
    current: &ColumnDescriptor,
    wanted: &ColumnDescriptor,
) -> bool {
    let native = |c: &ColumnDescriptor| {
        let (ty, length, default) = translator.to_native(&c.ty, c.length, c.default.clone());
        (render_type(&ty, length), default.to_sql(), c.nullable)
    };
    native(current) != native(wanted)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default, rename = "table")]
    tables: Vec<ManifestTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestTable {
    name: String,
    columns: Vec<ManifestColumn>,
    #[serde(default)]
    primary: Option<ManifestKey>,
    #[serde(default)]
    unique: Vec<ManifestKey>,
    #[serde(default)]
    indexes: Vec<ManifestKey>,
    #[serde(default)]
    references: Vec<ManifestReference>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestColumn {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    length: Option<u32>,
    #[serde(default = "default_nullable")]
    nullable: bool,
    /// Literal default (string, number or boolean)
    #[serde(default)]
    default: Option<ManifestDefault>,
    /// SQL default expression; `now()` is the portable current time
    #[serde(default)]
    default_expr: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDefault {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestKey {
    name: String,
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestReference {
    name: String,
    columns: Vec<String>,
    parent: String,
    parent_columns: Vec<String>,
    #[serde(default)]
    on_update: Option<String>,
    #[serde(default)]
    on_delete: Option<String>,
}

impl ManifestTable {
    fn into_spec(self) -> DbResult<TableSpec> {
        let mut spec = TableSpec::new(&self.name)?;
        for column in self.columns {
            let name = column.name.clone();
            spec = spec.field(&name, column.into_descriptor()?)?;
        }
        if let Some(key) = self.primary {
            spec = spec.primary(&key.name, key.columns)?;
        }
        for key in self.unique {
            spec = spec.unique(&key.name, key.columns)?;
        }
        for index in self.indexes {
            spec = spec.index(&index.name, index.columns)?;
        }
        for r in self.references {
            let mut reference =
                ReferenceDescriptor::new(&r.name, r.columns, &r.parent, r.parent_columns)?;
            if let Some(action) = r.on_update {
                reference = reference.on_update(action.parse()?);
            }
            if let Some(action) = r.on_delete {
                reference = reference.on_delete(action.parse()?);
            }
            spec = spec.reference(reference)?;
        }
        Ok(spec)
    }
}

impl ManifestColumn {
    fn into_descriptor(self) -> DbResult<ColumnDescriptor> {
        let default = match (self.default, self.default_expr) {
            (Some(_), Some(_)) => {
                return Err(DbError::InvalidDescriptor(format!(
                    "column {} sets both default and default_expr",
                    self.name
                )));
            }
            (Some(ManifestDefault::Boolean(b)), None) => DefaultValue::Boolean(b),
            (Some(ManifestDefault::Integer(i)), None) => DefaultValue::Integer(i),
            (Some(ManifestDefault::Real(f)), None) => DefaultValue::Real(f),
            (Some(ManifestDefault::Text(s)), None) => DefaultValue::Text(s),
            (None, Some(expr)) => DefaultValue::from_sql(Some(&expr)),
            (None, None) => DefaultValue::None,
        };
        let mut column = ColumnDescriptor::new(UniversalType::from_name(&self.ty))
            .nullable(self.nullable)
            .default_value(default);
        column.length = self.length;
        Ok(column)
    }
}
