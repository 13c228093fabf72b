//! ORDER BY and lexical-ordering fragments
//!
//! Engines differ in how they sort text "as a human would": some ship a
//! locale-aware collation, others only offer byte order. The handler is
//! told at construction time whether a collation is available; without one
//! the fragments fall back to case-folding with `LOWER(field)`, which loses
//! accent awareness but keeps the ordering case-insensitive.

use serde::{Deserialize, Serialize};

/// Collation policy handed to a connection handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    /// Unicode case-insensitive ordering, registered as `utf8_unicode_ci`
    UnicodeCi,
}

impl Collation {
    /// Name under which the collation is registered with the engine
    pub fn name(&self) -> &'static str {
        match self {
            Collation::UnicodeCi => "utf8_unicode_ci",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: String,
    pub direction: Direction,
    /// Request locale-aware ordering for this term
    pub collate: bool,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
            collate: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
            collate: false,
        }
    }

    pub fn collated(mut self) -> Self {
        self.collate = true;
        self
    }
}

/// Wrap `field` so it sorts lexically under `collation`, or case-folded without one.
pub fn lexical(field: &str, collation: Option<Collation>) -> String {
    match collation {
        Some(c) => format!("{} COLLATE {}", field, c.name()),
        None => format!("LOWER({})", field),
    }
}

/// Render a full ` ORDER BY ...` fragment; empty when `specs` is empty.
pub fn order_by_clause(specs: &[OrderSpec], collation: Option<Collation>) -> String {
    let terms: Vec<String> = specs
        .iter()
        .filter(|s| !s.field.trim().is_empty())
        .map(|s| {
            let expr = if s.collate {
                lexical(&s.field, collation)
            } else {
                s.field.clone()
            };
            match s.direction {
                Direction::Asc => expr,
                Direction::Desc => format!("{} DESC", expr),
            }
        })
        .collect();

    if terms.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {} ", terms.join(", "))
    }
}

/// Render a comma-separated list of lexically sortable fields.
pub fn lexical_fields(fields: &[&str], collation: Option<Collation>) -> String {
    fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| lexical(f, collation))
        .collect::<Vec<_>>()
        .join(", ")
}
