//! Schema engine
//!
//! The DDL front end. Domain code describes tables with the typed
//! descriptors in [`descriptors`]; an engine turns them into native DDL
//! through its [`TypeTranslator`](translator::TypeTranslator), buffers the
//! statements in an [`ExecutionStack`](stack::ExecutionStack) and runs them
//! on [`SchemaEngine::flush`].
//!
//! `list_*` methods always read the engine catalog. Nothing pending in the
//! stack is visible to them until it has been flushed.

pub mod descriptors;
pub mod references;
pub mod sqlite;
pub mod stack;
pub mod structure;
pub mod translator;

use crate::error::DbResult;
use descriptors::{
    ColumnDescriptor, IndexDescriptor, KeyDescriptor, ReferenceDescriptor, TableDescriptor,
};
use translator::TypeTranslator;

pub use descriptors::{DefaultValue, RefAction, UniversalType};
pub use sqlite::SqliteSchema;
pub use structure::{Structure, SyncReport, TableSpec};

/// DDL operations shared by every engine
///
/// Capability gaps are reported as `UnsupportedAlteration`,
/// `UnsupportedDrop` or `UnsupportedMultiColumnReference`. A refused
/// operation queues nothing.
pub trait SchemaEngine {
    /// Translator used for every type string this engine emits or reads
    fn translator(&self) -> &dyn TypeTranslator;

    /// User tables, sorted by name
    fn list_tables(&self) -> DbResult<Vec<String>>;

    /// Columns of `table` in declaration order; empty when the table does not exist
    fn list_columns(&self, table: &str) -> DbResult<TableDescriptor>;

    /// Primary and unique keys of `table`
    fn list_keys(&self, table: &str) -> DbResult<Vec<KeyDescriptor>>;

    /// Secondary indexes of `table` (key-backing indexes excluded)
    fn list_indexes(&self, table: &str) -> DbResult<Vec<IndexDescriptor>>;

    /// References whose child side is `table`
    fn list_references(&self, table: &str) -> DbResult<Vec<ReferenceDescriptor>>;

    /// Buffer a new table with its columns
    fn create_table(&mut self, name: &str, columns: &TableDescriptor) -> DbResult<()>;

    /// Add a column to a buffered or existing table
    fn create_field(&mut self, table: &str, name: &str, column: &ColumnDescriptor)
    -> DbResult<()>;

    /// Add a primary key to a table that is still buffered
    fn create_primary(&mut self, table: &str, key: &KeyDescriptor) -> DbResult<()>;

    /// Add a unique key to a table that is still buffered
    fn create_unique(&mut self, table: &str, key: &KeyDescriptor) -> DbResult<()>;

    /// Queue an index; runs after every buffered table exists
    fn create_index(&mut self, table: &str, index: &IndexDescriptor) -> DbResult<()>;

    /// Queue a reference from `table` to `reference.parent_table`
    fn create_reference(&mut self, table: &str, reference: &ReferenceDescriptor)
    -> DbResult<()>;

    /// Change an existing column
    fn alter_field(&mut self, table: &str, name: &str, column: &ColumnDescriptor) -> DbResult<()>;

    /// Replace primary key `name` with `key`
    fn alter_primary(&mut self, table: &str, name: &str, key: &KeyDescriptor) -> DbResult<()>;

    /// Replace unique key `name` with `key`
    fn alter_unique(&mut self, table: &str, name: &str, key: &KeyDescriptor) -> DbResult<()>;

    /// Replace index `name` with `index`
    fn alter_index(&mut self, table: &str, name: &str, index: &IndexDescriptor) -> DbResult<()>;

    /// Replace reference `name` with `reference`
    fn alter_reference(
        &mut self,
        table: &str,
        name: &str,
        reference: &ReferenceDescriptor,
    ) -> DbResult<()>;

    fn drop_unique(&mut self, table: &str, name: &str) -> DbResult<()>;

    fn drop_index(&mut self, table: &str, name: &str) -> DbResult<()>;

    fn drop_reference(&mut self, table: &str, name: &str) -> DbResult<()>;

    /// Statements the next flush would run
    fn pending_sql(&self) -> Vec<String>;

    /// Run every buffered statement; returns how many ran.
    ///
    /// # Errors
    /// The first failing statement aborts the batch and is returned as
    /// `DbError::QueryFailed`. Statements already run are rolled back unless
    /// the caller had opened the surrounding transaction.
    fn flush(&mut self) -> DbResult<usize>;
}
