//! Deferred DDL buffer
//!
//! Table bodies are accumulated per table and standalone statements
//! (indexes, triggers, catalog writes) in a separate queue. A table body
//! always renders its columns first, then its in-body constraints, whatever
//! order they were pushed in. Draining yields every `CREATE TABLE` in
//! first-declared order, followed by the standalone statements in
//! declaration order, so statements may refer to any table declared in
//! the same batch.
//!
//! Not thread-safe; meant for installer/upgrade code paths.

/// A queued DDL fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingSchemaOp {
    /// Column definition inside a `CREATE TABLE` body
    Column { table: String, fragment: String },
    /// Table constraint (primary or unique key) inside a `CREATE TABLE` body
    Constraint { table: String, fragment: String },
    /// Complete statement run after every table exists
    Statement(String),
}

impl PendingSchemaOp {
    pub fn column(table: &str, fragment: impl Into<String>) -> Self {
        Self::Column {
            table: table.to_string(),
            fragment: fragment.into(),
        }
    }

    pub fn constraint(table: &str, fragment: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.to_string(),
            fragment: fragment.into(),
        }
    }

    pub fn statement(sql: impl Into<String>) -> Self {
        Self::Statement(sql.into())
    }
}

#[derive(Debug)]
struct PendingTable {
    name: String,
    columns: Vec<String>,
    constraints: Vec<String>,
}

impl PendingTable {
    fn body(&self) -> Vec<String> {
        self.columns
            .iter()
            .chain(&self.constraints)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ExecutionStack {
    tables: Vec<PendingTable>,
    statements: Vec<String>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an operation. Body fragments declare their table on first use.
    pub fn push(&mut self, op: PendingSchemaOp) {
        match op {
            PendingSchemaOp::Column { table, fragment } => {
                self.table_mut(table).columns.push(fragment)
            }
            PendingSchemaOp::Constraint { table, fragment } => {
                self.table_mut(table).constraints.push(fragment)
            }
            PendingSchemaOp::Statement(statement) => self.statements.push(statement),
        }
    }

    fn table_mut(&mut self, table: String) -> &mut PendingTable {
        let index = match self.tables.iter().position(|t| t.name == table) {
            Some(index) => index,
            None => {
                self.tables.push(PendingTable {
                    name: table,
                    columns: Vec::new(),
                    constraints: Vec::new(),
                });
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    /// Whether `table` still has a buffered `CREATE TABLE`
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.statements.is_empty()
    }

    /// Statements the next drain would produce, without consuming them.
    ///
    /// `render_table` turns a table name and its body fragments into a
    /// `CREATE TABLE`.
    pub fn preview<F>(&self, render_table: F) -> Vec<String>
    where
        F: Fn(&str, &[String]) -> String,
    {
        self.tables
            .iter()
            .map(|table| render_table(&table.name, &table.body()))
            .chain(self.statements.iter().cloned())
            .collect()
    }

    /// Empty the stack, returning statements in execution order.
    ///
    /// A second drain on an empty stack yields nothing.
    pub fn drain<F>(&mut self, render_table: F) -> Vec<String>
    where
        F: Fn(&str, &[String]) -> String,
    {
        let statements = self.preview(render_table);
        self.tables.clear();
        self.statements.clear();
        statements
    }
}
