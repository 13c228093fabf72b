//! dblayer - driver-agnostic relational schema and query layer
//!
//! dblayer sits between domain code and a relational engine. Domain code
//! describes tables with typed descriptors and runs queries through a
//! connection handler; it never writes engine-specific DDL.
//!
//! # Features
//!
//! - **Type translation**: a universal column type vocabulary mapped onto native types
//! - **Connection handling**: materialized query results, escaping, transactions, locks
//! - **Deferred DDL**: tables, indexes and references declared in any order, run on flush
//! - **Trigger-emulated foreign keys**: restrict / cascade / set null on SQLite
//! - **Schema synchronization**: diff a desired structure (code or TOML) against a database
//!
//! # Architecture
//!
//! - [`config`]: Connection profiles and settings
//! - [`db`]: Connection handler trait, SQLite handler, results and cursor
//! - [`schema`]: Descriptors, type translator, execution stack, schema engine
//! - [`sql`]: ORDER BY / collation helpers and SQL pretty-printing
//! - [`export`]: CSV / JSON / text table output
//! - [`error`]: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use dblayer::config::ConnectionConfig;
//! use dblayer::db::{Database, SqliteHandler};
//! use dblayer::schema::descriptors::{
//!     ColumnDescriptor, KeyDescriptor, RefAction, ReferenceDescriptor, TableDescriptor,
//!     UniversalType,
//! };
//! use dblayer::schema::SchemaEngine;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = SqliteHandler::connect(&ConnectionConfig::sqlite("blog.db"))?;
//! let mut schema = db.schema();
//!
//! // The child table may be declared before its parent
//! schema.create_table(
//!     "post",
//!     &TableDescriptor::new()
//!         .column("id", ColumnDescriptor::new(UniversalType::Integer).not_null())?
//!         .column("cat_id", ColumnDescriptor::new(UniversalType::Integer))?,
//! )?;
//! schema.create_reference(
//!     "post",
//!     &ReferenceDescriptor::new("fk_post_cat", ["cat_id"], "category", ["id"])?
//!         .on_delete(RefAction::SetNull),
//! )?;
//! schema.create_table(
//!     "category",
//!     &TableDescriptor::new()
//!         .column("id", ColumnDescriptor::new(UniversalType::Integer).not_null())?,
//! )?;
//! schema.create_primary("category", &KeyDescriptor::primary("pk_category", ["id"])?)?;
//! schema.flush()?;
//!
//! let results = db.select("SELECT * FROM post")?;
//! println!("Got {} rows", results.row_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod schema;
pub mod sql;

pub use error::{ConfigError, DbError, DbLayerError, Result};
