//! Trigger-emulated foreign keys on SQLite

use crate::common::{self, Blog};
use dblayer::db::Database;
use dblayer::schema::SchemaEngine;
use dblayer::schema::descriptors::RefAction;

fn seed(db: &impl Database) {
    db.execute("INSERT INTO category (id, title) VALUES (1, 'news'), (2, 'misc')")
        .unwrap();
    db.execute("INSERT INTO post (id, cat_id, title) VALUES (10, 1, 'hello'), (11, 1, 'again')")
        .unwrap();
}

#[test]
fn test_deferred_order_parent_first() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    seed(&db);
    let err = db
        .execute("INSERT INTO post (id, cat_id) VALUES (12, 99)")
        .unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);
}

#[test]
fn test_deferred_order_child_first() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            child_first: true,
            ..Default::default()
        },
    );
    let tables = db.schema().list_tables().unwrap();
    assert_eq!(tables, vec!["category", "post"]);
    seed(&db);
    let err = db
        .execute("INSERT INTO post (id, cat_id) VALUES (12, 99)")
        .unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);
}

#[test]
fn test_restrict_is_the_default() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    seed(&db);

    let err = db.execute("DELETE FROM category WHERE id = 1").unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);
    let err = db
        .execute("UPDATE category SET id = 5 WHERE id = 1")
        .unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);

    // Unreferenced rows and non-key columns are free to change
    assert_eq!(db.execute("DELETE FROM category WHERE id = 2").unwrap(), 1);
    assert_eq!(
        db.execute("UPDATE category SET title = 'renamed' WHERE id = 1")
            .unwrap(),
        1
    );
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(2)
    );
}

#[test]
fn test_cascade_delete_leaves_no_orphans() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            on_delete: RefAction::Cascade,
            ..Default::default()
        },
    );
    seed(&db);
    db.execute("INSERT INTO post (id, cat_id) VALUES (12, 2)")
        .unwrap();

    db.execute("DELETE FROM category WHERE id = 1").unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post WHERE cat_id = 1"),
        Some(0)
    );
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(1)
    );
}

#[test]
fn test_cascade_update_propagates_key() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            on_update: RefAction::Cascade,
            ..Default::default()
        },
    );
    seed(&db);
    db.execute("UPDATE category SET id = 7 WHERE id = 1").unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post WHERE cat_id = 7"),
        Some(2)
    );
}

#[test]
fn test_set_null_on_update_keeps_rows() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            on_update: RefAction::SetNull,
            ..Default::default()
        },
    );
    seed(&db);
    db.execute("UPDATE category SET id = 7 WHERE id = 1").unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post WHERE cat_id IS NULL"),
        Some(2)
    );
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(2)
    );
}

#[test]
fn test_nullable_guard_exemption() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    db.execute("INSERT INTO post (id, cat_id) VALUES (1, NULL)")
        .unwrap();
    assert!(common::is_null(&db, "SELECT cat_id AS n FROM post WHERE id = 1"));
}

#[test]
fn test_not_null_child_still_guarded() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            cat_id_nullable: false,
            ..Default::default()
        },
    );
    let err = db
        .execute("INSERT INTO post (id, cat_id) VALUES (1, 42)")
        .unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);
}

#[test]
fn test_update_guard_on_child() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    seed(&db);
    let err = db
        .execute("UPDATE post SET cat_id = 99 WHERE id = 10")
        .unwrap_err();
    assert!(err.is_integrity_violation(), "{}", err);
    db.execute("UPDATE post SET cat_id = 2 WHERE id = 10").unwrap();
    db.execute("UPDATE post SET title = 'edited' WHERE id = 11")
        .unwrap();
}

#[test]
fn test_introspection_symmetry() {
    let actions = [RefAction::Restrict, RefAction::Cascade, RefAction::SetNull];
    for on_update in actions {
        for on_delete in actions {
            let db = common::memory();
            common::create_blog(
                &db,
                Blog {
                    on_update,
                    on_delete,
                    ..Default::default()
                },
            );
            let references = db.schema().list_references("post").unwrap();
            assert_eq!(
                references,
                vec![common::post_reference(on_update, on_delete)],
                "on_update={} on_delete={}",
                on_update,
                on_delete
            );
            assert!(db.schema().list_references("category").unwrap().is_empty());
        }
    }
}

#[test]
fn test_introspection_from_trigger_bodies() {
    let actions = [RefAction::Restrict, RefAction::Cascade, RefAction::SetNull];
    for on_update in actions {
        for on_delete in actions {
            let db = common::memory();
            common::create_blog(
                &db,
                Blog {
                    on_update,
                    on_delete,
                    ..Default::default()
                },
            );
            db.execute("DROP TABLE _dblayer_references").unwrap();
            let references = db.schema().list_references("post").unwrap();
            assert_eq!(references, vec![common::post_reference(on_update, on_delete)]);
        }
    }
}

#[test]
fn test_alter_reference_switches_behavior() {
    let db = common::memory();
    common::create_blog(&db, Blog::default());
    seed(&db);

    let mut schema = db.schema();
    schema
        .alter_reference(
            "post",
            "fk_post_category",
            &common::post_reference(RefAction::Restrict, RefAction::Cascade),
        )
        .unwrap();
    schema.flush().unwrap();

    db.execute("DELETE FROM category WHERE id = 1").unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(0)
    );
    assert_eq!(
        schema.list_references("post").unwrap()[0].on_delete,
        RefAction::Cascade
    );
}

#[test]
fn test_violation_carries_sql_when_verbose() {
    let db = common::verbose_memory();
    common::create_blog(&db, Blog::default());
    let err = db
        .execute("INSERT INTO post (id, cat_id) VALUES (1, 5)")
        .unwrap_err();
    assert!(err.is_integrity_violation());
    let message = err.to_string();
    assert!(message.contains("fk_post_category"), "{}", message);
    assert!(message.contains("INSERT INTO post"), "{}", message);
}

#[test]
fn test_end_to_end_set_null_on_delete() {
    let db = common::memory();
    common::create_blog(
        &db,
        Blog {
            on_delete: RefAction::SetNull,
            ..Default::default()
        },
    );

    db.execute("INSERT INTO category (id, title) VALUES (1, 'news')")
        .unwrap();
    db.execute("INSERT INTO post (id, cat_id, title) VALUES (1, 1, 'first')")
        .unwrap();
    db.execute("DELETE FROM category WHERE id = 1").unwrap();

    assert!(common::is_null(&db, "SELECT cat_id AS n FROM post WHERE id = 1"));
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM post"),
        Some(1)
    );
}
