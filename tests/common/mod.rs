//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: in-memory connections and a
//! small blog schema (`category` ← `post`).

use dblayer::config::ConnectionConfig;
use dblayer::db::{CellValue, Database, SqliteHandler};
use dblayer::schema::SchemaEngine;
use dblayer::schema::descriptors::{
    ColumnDescriptor, KeyDescriptor, RefAction, ReferenceDescriptor, TableDescriptor,
    UniversalType,
};

/// Fresh in-memory database
pub fn memory() -> SqliteHandler {
    SqliteHandler::connect(&ConnectionConfig::memory()).expect("in-memory sqlite")
}

/// Same, with failing SQL attached to errors
pub fn verbose_memory() -> SqliteHandler {
    SqliteHandler::connect(&ConnectionConfig::memory().with_verbose_errors(true))
        .expect("in-memory sqlite")
}

/// `category(id integer not null, title text)`
pub fn category_table() -> TableDescriptor {
    TableDescriptor::new()
        .column("id", ColumnDescriptor::new(UniversalType::Integer).not_null())
        .unwrap()
        .column("title", ColumnDescriptor::new(UniversalType::Text))
        .unwrap()
}

/// `post(id integer not null, cat_id integer [not] null, title text)`
pub fn post_table(cat_id_nullable: bool) -> TableDescriptor {
    TableDescriptor::new()
        .column("id", ColumnDescriptor::new(UniversalType::Integer).not_null())
        .unwrap()
        .column(
            "cat_id",
            ColumnDescriptor::new(UniversalType::Integer).nullable(cat_id_nullable),
        )
        .unwrap()
        .column("title", ColumnDescriptor::new(UniversalType::Text))
        .unwrap()
}

/// `post.cat_id -> category.id`
pub fn post_reference(on_update: RefAction, on_delete: RefAction) -> ReferenceDescriptor {
    ReferenceDescriptor::new("fk_post_category", ["cat_id"], "category", ["id"])
        .unwrap()
        .on_update(on_update)
        .on_delete(on_delete)
}

/// Options for [`create_blog`]
#[derive(Debug, Clone, Copy)]
pub struct Blog {
    pub on_update: RefAction,
    pub on_delete: RefAction,
    pub cat_id_nullable: bool,
    pub child_first: bool,
}

impl Default for Blog {
    fn default() -> Self {
        Self {
            on_update: RefAction::Restrict,
            on_delete: RefAction::Restrict,
            cat_id_nullable: true,
            child_first: false,
        }
    }
}

/// Declare and flush the blog schema
pub fn create_blog(db: &SqliteHandler, blog: Blog) {
    let mut schema = db.schema();
    if !blog.child_first {
        declare_category(&mut schema);
    }
    schema
        .create_table("post", &post_table(blog.cat_id_nullable))
        .unwrap();
    schema
        .create_primary("post", &KeyDescriptor::primary("pk_post", ["id"]).unwrap())
        .unwrap();
    schema
        .create_reference("post", &post_reference(blog.on_update, blog.on_delete))
        .unwrap();
    if blog.child_first {
        declare_category(&mut schema);
    }
    schema.flush().unwrap();
}

fn declare_category(schema: &mut dyn SchemaEngine) {
    schema.create_table("category", &category_table()).unwrap();
    schema
        .create_primary(
            "category",
            &KeyDescriptor::primary("pk_category", ["id"]).unwrap(),
        )
        .unwrap();
}

/// Single integer from a `SELECT ... AS n` query
pub fn scalar(db: &SqliteHandler, sql: &str) -> Option<i64> {
    db.select(sql)
        .unwrap()
        .get(0, "n")
        .and_then(CellValue::as_i64)
}

/// Whether a cell is NULL
pub fn is_null(db: &SqliteHandler, sql: &str) -> bool {
    db.select(sql)
        .unwrap()
        .get(0, "n")
        .is_some_and(CellValue::is_null)
}
