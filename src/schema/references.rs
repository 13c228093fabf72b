//! Foreign keys emulated with triggers
//!
//! Each single-column reference `child.c -> parent.p` becomes four triggers:
//!
//! | trigger          | fires                          | effect                          |
//! |------------------|--------------------------------|---------------------------------|
//! | `bir_<name>`     | BEFORE INSERT on child         | abort when the parent is absent |
//! | `bur_<name>`     | BEFORE UPDATE OF c on child    | same check for the new value    |
//! | `aur_<name>`     | AFTER UPDATE OF p on parent    | cascade or set-null             |
//! | `burp_<name>`    | BEFORE UPDATE OF p on parent   | restrict (instead of `aur_`)    |
//! | `bdr_<name>`     | BEFORE DELETE on parent        | cascade, set-null or restrict   |
//!
//! The read path goes the other way: the guard body of `bir_<name>` yields
//! the column mapping and the parent-side bodies are matched against the
//! templates above to recover the actions. A body that matches no template
//! reads back as `restrict`. References are also recorded in
//! [`CATALOG_TABLE`], which introspection consults before parsing.

use crate::db::Database;
use crate::schema::descriptors::{RefAction, ReferenceDescriptor};
use crate::error::{DbError, DbResult};
use regex::Regex;
use std::sync::LazyLock;

/// Side table recording references created through this layer
pub const CATALOG_TABLE: &str = "_dblayer_references";

const INSERT_GUARD: &str = "bir_";
const UPDATE_GUARD: &str = "bur_";
const PARENT_UPDATE: &str = "aur_";
const PARENT_RESTRICT: &str = "burp_";
const PARENT_DELETE: &str = "bdr_";

static GUARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)\(\s*SELECT\s+"?(\w+)"?\s+FROM\s+"?(\w+)"?\s+WHERE\s+"?\w+"?\s*=\s*NEW\."?(\w+)"?\s*\)\s+IS\s+NULL"#,
    )
    .expect("Invalid guard regex")
});

/// Child/parent mapping recovered from an insert guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardInfo {
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

pub fn insert_guard_name(reference: &str) -> String {
    format!("{}{}", INSERT_GUARD, reference)
}

fn update_guard_name(reference: &str) -> String {
    format!("{}{}", UPDATE_GUARD, reference)
}

fn parent_restrict_name(reference: &str) -> String {
    format!("{}{}", PARENT_RESTRICT, reference)
}

pub fn parent_update_name(reference: &str) -> String {
    format!("{}{}", PARENT_UPDATE, reference)
}

pub fn parent_delete_name(reference: &str) -> String {
    format!("{}{}", PARENT_DELETE, reference)
}

/// Reference name encoded in an insert guard trigger name
pub fn reference_name_from_guard(trigger: &str) -> Option<&str> {
    trigger.strip_prefix(INSERT_GUARD)
}

/// Every trigger name a reference may own
pub fn trigger_names(reference: &str) -> Vec<String> {
    vec![
        insert_guard_name(reference),
        update_guard_name(reference),
        parent_update_name(reference),
        parent_restrict_name(reference),
        parent_delete_name(reference),
    ]
}

/// Build the CREATE TRIGGER statements for a reference.
///
/// # Errors
/// `UnsupportedMultiColumnReference` when the reference spans more than one
/// column; nothing is generated in that case.
pub fn build_triggers(
    db: &dyn Database,
    child_table: &str,
    reference: &ReferenceDescriptor,
    child_nullable: bool,
) -> DbResult<Vec<String>> {
    if !reference.is_single_column() {
        return Err(DbError::UnsupportedMultiColumnReference(format!(
            "{} on {} ({} columns)",
            reference.name,
            child_table,
            reference.child_columns.len()
        )));
    }

    let q = |s: &str| db.escape_identifier(s);
    let name = &reference.name;
    let child = q(child_table);
    let parent = q(&reference.parent_table);
    let c_col = q(&reference.child_columns[0]);
    let p_col = q(&reference.parent_columns[0]);

    let violation = |op: &str, table: &str| {
        db.escape_string(&format!(
            "{} on table \"{}\" violates foreign key constraint \"{}\"",
            op, table, name
        ))
    };

    let null_exemption = if child_nullable {
        format!("NEW.{} IS NOT NULL\n  AND ", c_col)
    } else {
        String::new()
    };

    let mut triggers = Vec::with_capacity(4);

    for (trigger, event, op) in [
        (insert_guard_name(name), "INSERT".to_string(), "insert"),
        (update_guard_name(name), format!("UPDATE OF {}", c_col), "update"),
    ] {
        triggers.push(format!(
            "CREATE TRIGGER {trigger}\n\
             BEFORE {event} ON {child}\n\
             FOR EACH ROW BEGIN\n  \
             SELECT RAISE(ABORT, '{message}')\n  \
             WHERE {null_exemption}(SELECT {p_col} FROM {parent} WHERE {p_col} = NEW.{c_col}) IS NULL;\n\
             END",
            trigger = q(&trigger),
            message = violation(op, child_table),
        ));
    }

    let changed = format!("OLD.{p} IS NOT NEW.{p}", p = p_col);

    triggers.push(match reference.on_update {
        RefAction::Cascade => format!(
            "CREATE TRIGGER {trigger}\n\
             AFTER UPDATE OF {p_col} ON {parent}\n\
             FOR EACH ROW WHEN {changed} BEGIN\n  \
             UPDATE {child} SET {c_col} = NEW.{p_col} WHERE {c_col} = OLD.{p_col};\n\
             END",
            trigger = q(&parent_update_name(name)),
        ),
        RefAction::SetNull => format!(
            "CREATE TRIGGER {trigger}\n\
             AFTER UPDATE OF {p_col} ON {parent}\n\
             FOR EACH ROW WHEN {changed} BEGIN\n  \
             UPDATE {child} SET {c_col} = NULL WHERE {c_col} = OLD.{p_col};\n\
             END",
            trigger = q(&parent_update_name(name)),
        ),
        RefAction::Restrict => format!(
            "CREATE TRIGGER {trigger}\n\
             BEFORE UPDATE OF {p_col} ON {parent}\n\
             FOR EACH ROW WHEN {changed} BEGIN\n  \
             SELECT RAISE(ABORT, '{message}')\n  \
             WHERE (SELECT {c_col} FROM {child} WHERE {c_col} = OLD.{p_col}) IS NOT NULL;\n\
             END",
            trigger = q(&parent_restrict_name(name)),
            message = violation("update", &reference.parent_table),
        ),
    });

    let delete_body = match reference.on_delete {
        RefAction::Cascade => format!("DELETE FROM {} WHERE {} = OLD.{};", child, c_col, p_col),
        RefAction::SetNull => format!(
            "UPDATE {} SET {} = NULL WHERE {} = OLD.{};",
            child, c_col, c_col, p_col
        ),
        RefAction::Restrict => format!(
            "SELECT RAISE(ABORT, '{}')\n  WHERE (SELECT {} FROM {} WHERE {} = OLD.{}) IS NOT NULL;",
            violation("delete", &reference.parent_table),
            c_col,
            child,
            c_col,
            p_col
        ),
    };
    triggers.push(format!(
        "CREATE TRIGGER {}\nBEFORE DELETE ON {}\nFOR EACH ROW BEGIN\n  {}\nEND",
        q(&parent_delete_name(name)),
        parent,
        delete_body
    ));

    Ok(triggers)
}

/// DROP statements for every trigger a reference may own
pub fn drop_triggers(db: &dyn Database, reference: &str) -> Vec<String> {
    trigger_names(reference)
        .iter()
        .map(|t| format!("DROP TRIGGER IF EXISTS {}", db.escape_identifier(t)))
        .collect()
}

/// Recover the column mapping from an insert guard body.
pub fn parse_guard(sql: &str) -> Option<GuardInfo> {
    let caps = GUARD_PATTERN.captures(sql)?;
    Some(GuardInfo {
        parent_column: caps[1].to_string(),
        parent_table: caps[2].to_string(),
        child_column: caps[3].to_string(),
    })
}

/// Classify a parent-update trigger body; `None` or an unknown body is `restrict`.
pub fn classify_update(sql: Option<&str>, child_table: &str, child_column: &str) -> RefAction {
    let Some(sql) = sql else {
        return RefAction::Restrict;
    };
    if body_matches(set_to(child_table, child_column, r#"NEW\."#), sql) {
        RefAction::Cascade
    } else if body_matches(set_to(child_table, child_column, "NULL"), sql) {
        RefAction::SetNull
    } else {
        RefAction::Restrict
    }
}

/// Classify a parent-delete trigger body; `None` or an unknown body is `restrict`.
pub fn classify_delete(sql: Option<&str>, child_table: &str, child_column: &str) -> RefAction {
    let Some(sql) = sql else {
        return RefAction::Restrict;
    };
    let delete = Regex::new(&format!(
        r#"(?is)DELETE\s+FROM\s+"?{}"?"#,
        regex::escape(child_table)
    ))
    .ok();
    if body_matches(delete, sql) {
        RefAction::Cascade
    } else if body_matches(set_to(child_table, child_column, "NULL"), sql) {
        RefAction::SetNull
    } else {
        RefAction::Restrict
    }
}

fn set_to(child_table: &str, child_column: &str, value: &str) -> Option<Regex> {
    Regex::new(&format!(
        r#"(?is)UPDATE\s+"?{}"?\s+SET\s+"?{}"?\s*=\s*{}"#,
        regex::escape(child_table),
        regex::escape(child_column),
        value
    ))
    .ok()
}

fn body_matches(pattern: Option<Regex>, sql: &str) -> bool {
    pattern.is_some_and(|re| re.is_match(sql))
}

/// DDL for the reference catalog table
pub fn catalog_ddl(db: &dyn Database) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  \
         name text NOT NULL PRIMARY KEY,\n  \
         child_table text NOT NULL,\n  \
         child_column text NOT NULL,\n  \
         parent_table text NOT NULL,\n  \
         parent_column text NOT NULL,\n  \
         on_update text NOT NULL,\n  \
         on_delete text NOT NULL\n)",
        db.escape_identifier(CATALOG_TABLE)
    )
}

/// Record (or replace) a reference in the catalog
pub fn catalog_insert(db: &dyn Database, child_table: &str, reference: &ReferenceDescriptor) -> String {
    let s = |v: &str| format!("'{}'", db.escape_string(v));
    format!(
        "INSERT OR REPLACE INTO {} (name, child_table, child_column, parent_table, parent_column, on_update, on_delete) \
         VALUES ({}, {}, {}, {}, {}, {}, {})",
        db.escape_identifier(CATALOG_TABLE),
        s(&reference.name),
        s(child_table),
        s(&reference.child_columns[0]),
        s(&reference.parent_table),
        s(&reference.parent_columns[0]),
        s(reference.on_update.as_str()),
        s(reference.on_delete.as_str()),
    )
}

/// Forget a reference in the catalog
pub fn catalog_delete(db: &dyn Database, reference: &str) -> String {
    format!(
        "DELETE FROM {} WHERE name = '{}'",
        db.escape_identifier(CATALOG_TABLE),
        db.escape_string(reference)
    )
}
