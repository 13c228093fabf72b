//! Manifest-driven schema synchronization

use crate::common;
use dblayer::db::Database;
use dblayer::schema::descriptors::{ColumnDescriptor, RefAction, ReferenceDescriptor, UniversalType};
use dblayer::schema::{SchemaEngine, Structure, TableSpec};
use dblayer::sql::formatter::format_script;
use tempfile::TempDir;

/// Child table first: references resolve regardless of order
const BLOG: &str = r#"
[[table]]
name = "post"
columns = [
    { name = "id", type = "integer", nullable = false },
    { name = "cat_id", type = "integer" },
    { name = "title", type = "text" },
]
primary = { name = "pk_post", columns = ["id"] }
references = [
    { name = "fk_post_category", columns = ["cat_id"], parent = "category", parent_columns = ["id"], on_delete = "cascade" },
]

[[table]]
name = "category"
columns = [
    { name = "id", type = "integer", nullable = false },
    { name = "title", type = "varchar", length = 100, nullable = false, default = "untitled" },
]
primary = { name = "pk_category", columns = ["id"] }
unique = [{ name = "uk_category_title", columns = ["title"] }]
"#;

#[test]
fn test_apply_manifest_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(&path, BLOG).unwrap();

    let db = common::memory();
    let structure = Structure::load(&path).unwrap();
    let mut schema = db.schema();
    let report = structure.synchronize(&mut schema).unwrap();
    assert_eq!(report.tables_created, 2);
    assert_eq!(report.references_created, 1);

    db.execute("INSERT INTO category (id) VALUES (1)").unwrap();
    db.execute("INSERT INTO post (id, cat_id) VALUES (1, 1)").unwrap();
    db.execute("DELETE FROM category").unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(0)
    );

    assert!(structure.plan(&mut schema).unwrap().is_empty());
}

#[test]
fn test_dry_run_queues_without_running() {
    let db = common::memory();
    let structure = Structure::from_toml(BLOG).unwrap();
    let mut schema = db.schema();
    let report = structure.plan(&mut schema).unwrap();
    assert_eq!(report.statements, 0);

    let pending = schema.pending_sql();
    assert!(pending[0].starts_with("CREATE TABLE \"post\""));
    assert!(pending[1].starts_with("CREATE TABLE \"category\""));
    assert!(pending.iter().any(|s| s.contains("bdr_fk_post_category")));
    assert!(schema.list_tables().unwrap().is_empty());

    let script = format_script(&pending);
    assert!(script.contains("CREATE TABLE"));
}

#[test]
fn test_structure_built_in_code() {
    let db = common::memory();
    let structure = Structure::new()
        .table(
            TableSpec::new("category")
                .unwrap()
                .field("id", ColumnDescriptor::new(UniversalType::Integer).not_null())
                .unwrap()
                .primary("pk_category", ["id"])
                .unwrap(),
        )
        .unwrap()
        .table(
            TableSpec::new("post")
                .unwrap()
                .field("id", ColumnDescriptor::new(UniversalType::Integer).not_null())
                .unwrap()
                .field("cat_id", ColumnDescriptor::new(UniversalType::Integer))
                .unwrap()
                .index("idx_post_cat", ["cat_id"])
                .unwrap()
                .reference(
                    ReferenceDescriptor::new("fk_post_category", ["cat_id"], "category", ["id"])
                        .unwrap()
                        .on_update(RefAction::Cascade),
                )
                .unwrap(),
        )
        .unwrap();

    let mut schema = db.schema();
    structure.synchronize(&mut schema).unwrap();
    assert_eq!(schema.list_indexes("post").unwrap().len(), 1);
    assert_eq!(
        schema.list_references("post").unwrap()[0].on_update,
        RefAction::Cascade
    );
}

#[test]
fn test_changed_unique_key_reports_capability_gap() {
    let db = common::memory();
    let mut schema = db.schema();
    Structure::from_toml(BLOG)
        .unwrap()
        .synchronize(&mut schema)
        .unwrap();

    let changed = BLOG.replace(
        "columns = [\"title\"] }]",
        "columns = [\"title\", \"id\"] }]",
    );
    let err = Structure::from_toml(&changed)
        .unwrap()
        .synchronize(&mut schema)
        .unwrap_err();
    assert!(err.is_unsupported());
}
