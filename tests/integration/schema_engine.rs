//! Schema engine behavior against a live SQLite connection

use crate::common::{self, Blog};
use dblayer::db::{CellValue, Database};
use dblayer::error::DbError;
use dblayer::schema::SchemaEngine;
use dblayer::schema::descriptors::{
    ColumnDescriptor, DefaultValue, IndexDescriptor, KeyDescriptor, TableDescriptor,
    UniversalType,
};
use dblayer::schema::translator::{EPOCH_LITERAL, SqliteTranslator, TypeTranslator};

#[test]
fn test_translation_round_trip() {
    let translator = SqliteTranslator::new();
    let types = [
        UniversalType::Smallint,
        UniversalType::Integer,
        UniversalType::Bigint,
        UniversalType::Real,
        UniversalType::Float,
        UniversalType::Numeric,
        UniversalType::Date,
        UniversalType::Time,
        UniversalType::Timestamp,
        UniversalType::Char,
        UniversalType::Varchar,
        UniversalType::Text,
        UniversalType::Boolean,
        UniversalType::Other("blob".to_string()),
    ];
    let defaults = [
        DefaultValue::None,
        DefaultValue::Null,
        DefaultValue::Integer(3),
        DefaultValue::Text("x".to_string()),
        DefaultValue::Now,
    ];
    for ty in &types {
        for default in &defaults {
            let native = translator.to_native(ty, Some(10), default.clone());
            let (universal, length, back) =
                translator.to_universal(&native.0, native.1, native.2.clone());
            let again = translator.to_native(&universal, length, back);
            assert_eq!(again, native, "{} with {:?}", ty, default);
        }
    }
}

#[test]
fn test_columns_survive_a_flush() {
    let db = common::memory();
    let mut schema = db.schema();
    let table = TableDescriptor::new()
        .column("id", ColumnDescriptor::new(UniversalType::Bigint).not_null())
        .unwrap()
        .column("name", ColumnDescriptor::new(UniversalType::Varchar).length(64))
        .unwrap()
        .column(
            "score",
            ColumnDescriptor::new(UniversalType::Float).default_value(DefaultValue::Real(1.5)),
        )
        .unwrap()
        .column(
            "label",
            ColumnDescriptor::new(UniversalType::Text)
                .not_null()
                .default_value(DefaultValue::Text("it's".to_string())),
        )
        .unwrap()
        .column(
            "created",
            ColumnDescriptor::new(UniversalType::Timestamp)
                .not_null()
                .default_value(DefaultValue::Now),
        )
        .unwrap();
    schema.create_table("item", &table).unwrap();
    schema.flush().unwrap();

    let columns = schema.list_columns("item").unwrap();
    assert_eq!(columns.names(), vec!["id", "name", "score", "label", "created"]);
    assert_eq!(columns.get("id").unwrap().ty, UniversalType::Integer);
    assert!(!columns.get("id").unwrap().nullable);
    assert_eq!(columns.get("name").unwrap().length, Some(64));
    assert_eq!(columns.get("score").unwrap().ty, UniversalType::Real);
    assert_eq!(columns.get("score").unwrap().default, DefaultValue::Real(1.5));
    assert_eq!(
        columns.get("label").unwrap().default,
        DefaultValue::Text("it's".to_string())
    );
    assert_eq!(columns.get("created").unwrap().default, DefaultValue::Now);

    db.execute("INSERT INTO item (id) VALUES (1)").unwrap();
    let row = db.select("SELECT label, created FROM item").unwrap();
    assert_eq!(row.get(0, "label"), Some(&CellValue::Text("it's".into())));
    assert_eq!(
        row.get(0, "created"),
        Some(&CellValue::DateTime(EPOCH_LITERAL.into()))
    );
}

#[test]
fn test_pending_changes_are_invisible_until_flush() {
    let db = common::memory();
    let mut schema = db.schema();
    schema
        .create_table("category", &common::category_table())
        .unwrap();
    assert!(schema.list_tables().unwrap().is_empty());
    assert!(schema.list_columns("category").unwrap().is_empty());
    assert_eq!(schema.pending_sql().len(), 1);

    assert_eq!(schema.flush().unwrap(), 1);
    assert_eq!(schema.list_tables().unwrap(), vec!["category"]);
    assert_eq!(schema.flush().unwrap(), 0);
}

#[test]
fn test_alter_primary_never_mutates() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    let before = db
        .select("SELECT sql FROM sqlite_master ORDER BY name")
        .unwrap();

    let mut schema = db.schema();
    let key = KeyDescriptor::primary("pk_category", ["id", "title"]).unwrap();
    for _ in 0..2 {
        let err = schema.alter_primary("category", "pk_category", &key).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedAlteration(_)));
    }
    assert!(schema.pending_sql().is_empty());
    assert_eq!(schema.flush().unwrap(), 0);

    let after = db
        .select("SELECT sql FROM sqlite_master ORDER BY name")
        .unwrap();
    assert_eq!(before.rows, after.rows);
    assert_eq!(
        schema.list_keys("category").unwrap(),
        vec![KeyDescriptor::primary("pk_category", ["id"]).unwrap()]
    );
}

#[test]
fn test_index_lifecycle() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    let mut schema = db.schema();

    schema
        .create_index("post", &IndexDescriptor::new("idx_post_title", ["title"]).unwrap())
        .unwrap();
    schema.flush().unwrap();
    assert_eq!(schema.list_indexes("post").unwrap()[0].columns, vec!["title"]);

    schema
        .alter_index(
            "post",
            "idx_post_title",
            &IndexDescriptor::new("idx_post_title", ["cat_id", "title"]).unwrap(),
        )
        .unwrap();
    schema.flush().unwrap();
    assert_eq!(
        schema.list_indexes("post").unwrap()[0].columns,
        vec!["cat_id", "title"]
    );

    schema.drop_index("post", "idx_post_title").unwrap();
    schema.flush().unwrap();
    assert!(schema.list_indexes("post").unwrap().is_empty());
}

#[test]
fn test_unique_keys_are_create_only() {
    let db = common::memory();
    let mut schema = db.schema();
    schema
        .create_table("category", &common::category_table())
        .unwrap();
    schema
        .create_unique(
            "category",
            &KeyDescriptor::unique("uk_category_title", ["title"]).unwrap(),
        )
        .unwrap();
    schema.flush().unwrap();

    db.execute("INSERT INTO category (id, title) VALUES (1, 'a')")
        .unwrap();
    assert!(
        db.execute("INSERT INTO category (id, title) VALUES (2, 'a')")
            .is_err()
    );

    assert!(schema.drop_unique("category", "uk_category_title").unwrap_err().is_unsupported());
    assert!(
        schema
            .create_unique(
                "category",
                &KeyDescriptor::unique("uk_other", ["id"]).unwrap()
            )
            .unwrap_err()
            .is_unsupported()
    );
    assert_eq!(schema.list_keys("category").unwrap().len(), 1);
}

#[test]
fn test_field_added_to_existing_table_can_be_referenced() {
    let db = common::memory();
    let mut schema = db.schema();
    schema
        .create_table("category", &common::category_table())
        .unwrap();
    schema
        .create_table(
            "note",
            &TableDescriptor::new()
                .column("id", ColumnDescriptor::new(UniversalType::Integer))
                .unwrap(),
        )
        .unwrap();
    schema.flush().unwrap();

    schema
        .create_field("note", "cat_id", &ColumnDescriptor::new(UniversalType::Integer))
        .unwrap();
    let reference = dblayer::schema::descriptors::ReferenceDescriptor::new(
        "fk_note_category",
        ["cat_id"],
        "category",
        ["id"],
    )
    .unwrap();
    schema.create_reference("note", &reference).unwrap();
    schema.flush().unwrap();

    assert!(db.execute("INSERT INTO note (id, cat_id) VALUES (1, 3)").is_err());
    db.execute("INSERT INTO note (id) VALUES (2)").unwrap();
}

#[test]
fn test_flush_inside_caller_transaction() {
    let db = common::memory();
    db.begin().unwrap();
    let mut schema = db.schema();
    schema
        .create_table("category", &common::category_table())
        .unwrap();
    schema.flush().unwrap();
    assert!(db.in_transaction());
    db.rollback().unwrap();
    assert!(schema.list_tables().unwrap().is_empty());
}

#[test]
fn test_field_added_after_key_on_buffered_table() {
    let db = common::memory();
    let mut schema = db.schema();
    schema
        .create_table(
            "category",
            &TableDescriptor::new()
                .column("id", ColumnDescriptor::new(UniversalType::Integer).not_null())
                .unwrap(),
        )
        .unwrap();
    schema
        .create_primary("category", &KeyDescriptor::primary("pk_category", ["id"]).unwrap())
        .unwrap();
    schema
        .create_field("category", "title", &ColumnDescriptor::new(UniversalType::Text))
        .unwrap();
    schema
        .create_unique(
            "category",
            &KeyDescriptor::unique("uk_category_title", ["title"]).unwrap(),
        )
        .unwrap();

    let pending = schema.pending_sql();
    let body = &pending[0];
    let title = body.find("\"title\" text").unwrap();
    assert!(title < body.find("CONSTRAINT").unwrap(), "{}", body);

    assert_eq!(schema.flush().unwrap(), 1);
    assert_eq!(schema.list_columns("category").unwrap().names(), vec!["id", "title"]);
    assert_eq!(schema.list_keys("category").unwrap().len(), 2);

    db.execute("INSERT INTO category (id, title) VALUES (1, 'a')")
        .unwrap();
    assert!(db.execute("INSERT INTO category (id, title) VALUES (1, 'b')").is_err());
    assert!(db.execute("INSERT INTO category (id, title) VALUES (2, 'a')").is_err());
}
