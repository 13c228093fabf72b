//! Typed schema descriptors
//!
//! The universal column/key/index/reference model that domain code hands to
//! a schema engine. Everything is validated when it is built, so engines can
//! assume well-formed identifiers and non-empty column lists.

use crate::error::{DbError, DbResult};
use std::fmt;
use std::str::FromStr;

/// Engine-independent column type vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniversalType {
    Smallint,
    Integer,
    Bigint,
    Real,
    Float,
    Numeric,
    Date,
    Time,
    Timestamp,
    Char,
    Varchar,
    Text,
    Boolean,
    /// Anything the vocabulary does not know; passed through untouched
    Other(String),
}

impl UniversalType {
    pub fn name(&self) -> &str {
        match self {
            UniversalType::Smallint => "smallint",
            UniversalType::Integer => "integer",
            UniversalType::Bigint => "bigint",
            UniversalType::Real => "real",
            UniversalType::Float => "float",
            UniversalType::Numeric => "numeric",
            UniversalType::Date => "date",
            UniversalType::Time => "time",
            UniversalType::Timestamp => "timestamp",
            UniversalType::Char => "char",
            UniversalType::Varchar => "varchar",
            UniversalType::Text => "text",
            UniversalType::Boolean => "boolean",
            UniversalType::Other(s) => s,
        }
    }

    /// Parse a universal type name. Unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "smallint" => UniversalType::Smallint,
            "integer" => UniversalType::Integer,
            "bigint" => UniversalType::Bigint,
            "real" => UniversalType::Real,
            "float" => UniversalType::Float,
            "numeric" => UniversalType::Numeric,
            "date" => UniversalType::Date,
            "time" => UniversalType::Time,
            "timestamp" => UniversalType::Timestamp,
            "char" => UniversalType::Char,
            "varchar" => UniversalType::Varchar,
            "text" => UniversalType::Text,
            "boolean" => UniversalType::Boolean,
            other => UniversalType::Other(other.to_string()),
        }
    }

    /// Date/time family
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            UniversalType::Date | UniversalType::Time | UniversalType::Timestamp
        )
    }
}

impl fmt::Display for UniversalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column default value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultValue {
    /// No DEFAULT clause at all
    #[default]
    None,
    /// `DEFAULT NULL`
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    /// Dynamic "current time" default; engines that cannot evaluate it get a literal
    Now,
    /// Engine-specific expression, rendered verbatim
    Expression(String),
}

impl DefaultValue {
    /// Render the value part of a `DEFAULT` clause; `None` for no clause.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            DefaultValue::None => None,
            DefaultValue::Null => Some("NULL".to_string()),
            DefaultValue::Integer(i) => Some(i.to_string()),
            DefaultValue::Real(f) => Some(f.to_string()),
            DefaultValue::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            DefaultValue::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            DefaultValue::Now => Some("now()".to_string()),
            DefaultValue::Expression(e) => Some(e.clone()),
        }
    }

    /// Parse a default as reported by a catalog (`'abc'`, `0`, `NULL`, `CURRENT_TIMESTAMP`).
    pub fn from_sql(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return DefaultValue::None;
        };
        if raw.eq_ignore_ascii_case("null") {
            return DefaultValue::Null;
        }
        if raw.eq_ignore_ascii_case("now()") {
            return DefaultValue::Now;
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return DefaultValue::Text(raw[1..raw.len() - 1].replace("''", "'"));
        }
        if let Ok(i) = raw.parse::<i64>() {
            return DefaultValue::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return DefaultValue::Real(f);
        }
        DefaultValue::Expression(raw.to_string())
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub ty: UniversalType,
    pub length: Option<u32>,
    pub nullable: bool,
    pub default: DefaultValue,
}

impl ColumnDescriptor {
    /// Nullable column without default
    pub fn new(ty: UniversalType) -> Self {
        Self {
            ty,
            length: None,
            nullable: true,
            default: DefaultValue::None,
        }
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }

    fn validate(&self, name: &str) -> DbResult<()> {
        if self.length == Some(0) {
            return Err(DbError::InvalidDescriptor(format!(
                "column {} has a zero length",
                name
            )));
        }
        if !self.nullable && self.default == DefaultValue::Null {
            return Err(DbError::InvalidDescriptor(format!(
                "column {} is NOT NULL but defaults to NULL",
                name
            )));
        }
        Ok(())
    }
}

/// Ordered column set of a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDescriptor {
    columns: Vec<(String, ColumnDescriptor)>,
}

impl TableDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TableDescriptor::add`]
    pub fn column(mut self, name: &str, column: ColumnDescriptor) -> DbResult<Self> {
        self.add(name, column)?;
        Ok(self)
    }

    /// Append a column, rejecting bad identifiers and duplicates.
    pub fn add(&mut self, name: &str, column: ColumnDescriptor) -> DbResult<()> {
        validate_identifier("column", name)?;
        column.validate(name)?;
        if self.contains(name) {
            return Err(DbError::InvalidDescriptor(format!(
                "duplicate column {}",
                name
            )));
        }
        self.columns.push((name.to_string(), column));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDescriptor)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Primary or unique key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub name: String,
    pub primary: bool,
    pub unique: bool,
    pub columns: Vec<String>,
}

impl KeyDescriptor {
    pub fn primary<I, S>(name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(name, true, false, columns)
    }

    pub fn unique<I, S>(name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(name, false, true, columns)
    }

    fn build<I, S>(name: &str, primary: bool, unique: bool, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_identifier("key", name)?;
        let columns = collect_columns("key", name, columns)?;
        Ok(Self {
            name: name.to_string(),
            primary,
            unique,
            columns,
        })
    }
}

/// Index access method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    #[default]
    Btree,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Btree => "btree",
        }
    }
}

impl FromStr for IndexKind {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btree" | "" => Ok(IndexKind::Btree),
            other => Err(DbError::InvalidDescriptor(format!(
                "unknown index type {}",
                other
            ))),
        }
    }
}

/// Secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

impl IndexDescriptor {
    pub fn new<I, S>(name: &str, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_identifier("index", name)?;
        let columns = collect_columns("index", name, columns)?;
        Ok(Self {
            name: name.to_string(),
            kind: IndexKind::Btree,
            columns,
        })
    }
}

/// Referential action applied to dependent rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
}

impl RefAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefAction::Restrict => "restrict",
            RefAction::Cascade => "cascade",
            RefAction::SetNull => "set null",
        }
    }
}

impl fmt::Display for RefAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefAction {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "restrict" | "no action" | "" => Ok(RefAction::Restrict),
            "cascade" => Ok(RefAction::Cascade),
            "set null" => Ok(RefAction::SetNull),
            other => Err(DbError::InvalidDescriptor(format!(
                "unknown referential action {}",
                other
            ))),
        }
    }
}

/// Foreign key from a child table to a parent table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    pub name: String,
    pub child_columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
    pub on_update: RefAction,
    pub on_delete: RefAction,
}

impl ReferenceDescriptor {
    /// Reference with `restrict` on both update and delete
    pub fn new<I, J, S, T>(
        name: &str,
        child_columns: I,
        parent_table: &str,
        parent_columns: J,
    ) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        validate_identifier("reference", name)?;
        validate_identifier("table", parent_table)?;
        let child_columns = collect_columns("reference", name, child_columns)?;
        let parent_columns = collect_columns("reference", name, parent_columns)?;
        if child_columns.len() != parent_columns.len() {
            return Err(DbError::InvalidDescriptor(format!(
                "reference {} maps {} child columns onto {} parent columns",
                name,
                child_columns.len(),
                parent_columns.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            child_columns,
            parent_table: parent_table.to_string(),
            parent_columns,
            on_update: RefAction::Restrict,
            on_delete: RefAction::Restrict,
        })
    }

    pub fn on_update(mut self, action: RefAction) -> Self {
        self.on_update = action;
        self
    }

    pub fn on_delete(mut self, action: RefAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn is_single_column(&self) -> bool {
        self.child_columns.len() == 1 && self.parent_columns.len() == 1
    }
}

/// Identifiers are restricted to `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(kind: &str, name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidDescriptor(format!(
            "invalid {} name '{}'",
            kind, name
        )))
    }
}

fn collect_columns<I, S>(kind: &str, name: &str, columns: I) -> DbResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    if columns.is_empty() {
        return Err(DbError::InvalidDescriptor(format!(
            "{} {} has no columns",
            kind, name
        )));
    }
    for column in &columns {
        validate_identifier("column", column)?;
    }
    Ok(columns)
}
