//! Type translation between the universal vocabulary and native type names
//!
//! Translation works on `(type, length, default)` triples in both
//! directions and never touches a connection. Every engine gets a
//! `TypeTranslator`; shared aliases (`int4`, `character varying`, ...) are
//! resolved by [`canonical_alias`] before the engine applies its own quirks.
//!
//! ```text
//! native  --to_universal-->  UniversalType  --to_native-->  native
//! ```

use crate::schema::descriptors::{DefaultValue, UniversalType};

/// Literal stored in place of a dynamic "now" default on engines that cannot evaluate it.
pub const EPOCH_LITERAL: &str = "1970-01-01 00:00:00";

/// Universal side of a translation
pub type UniversalTriple = (UniversalType, Option<u32>, DefaultValue);

/// Native side of a translation
pub type NativeTriple = (String, Option<u32>, DefaultValue);

/// Bidirectional type mapping for one engine
pub trait TypeTranslator {
    /// Native type name (as declared in the engine catalog) → universal type
    fn to_universal(&self, native: &str, length: Option<u32>, default: DefaultValue)
    -> UniversalTriple;

    /// Universal type → native type name
    fn to_native(&self, ty: &UniversalType, length: Option<u32>, default: DefaultValue)
    -> NativeTriple;
}

/// Aliases shared by most engines, resolved before engine-specific rules.
pub fn canonical_alias(native: &str) -> &str {
    match native {
        "bool" => "boolean",
        "int2" => "smallint",
        "int" | "int4" => "integer",
        "int8" => "bigint",
        "float4" => "real",
        "double precision" | "float8" => "float",
        "decimal" => "numeric",
        "character varying" => "varchar",
        "character" => "char",
        other => other,
    }
}

/// Split a declared type such as `varchar(255)` or `numeric(10, 2)` into name and length.
pub fn split_declared_type(declared: &str) -> (String, Option<u32>) {
    let declared = declared.trim();
    match declared.find('(') {
        Some(open) => {
            let base = declared[..open].trim().to_ascii_lowercase();
            let params = declared[open + 1..].trim_end_matches(')');
            let length = params
                .split(',')
                .next()
                .and_then(|p| p.trim().parse::<u32>().ok());
            (base, length)
        }
        None => (declared.to_ascii_lowercase(), None),
    }
}

/// Render a native type with its optional length: `varchar(255)`.
pub fn render_type(native: &str, length: Option<u32>) -> String {
    match length {
        Some(len) if len > 0 => format!("{}({})", native, len),
        _ => native.to_string(),
    }
}

/// SQLite type rules
///
/// SQLite stores declared type names verbatim and only derives an affinity
/// from them, so the universal vocabulary collapses onto a handful of
/// names. It cannot evaluate `now()` as a column default either; such
/// defaults become [`EPOCH_LITERAL`] on the way in and are restored to
/// `Now` on the way out for timestamp columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTranslator;

impl SqliteTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl TypeTranslator for SqliteTranslator {
    fn to_universal(
        &self,
        native: &str,
        length: Option<u32>,
        default: DefaultValue,
    ) -> UniversalTriple {
        let lowered = native.trim().to_ascii_lowercase();
        let ty = match canonical_alias(&lowered) {
            "float" => UniversalType::Real,
            "double" => UniversalType::Float,
            "integer" | "mediumint" | "bigint" | "tinyint" | "smallint" => UniversalType::Integer,
            "tinytext" | "mediumtext" | "longtext" | "clob" => UniversalType::Text,
            "datetime" => UniversalType::Timestamp,
            other => UniversalType::from_name(other),
        };

        let default = match (&ty, default) {
            (UniversalType::Timestamp, DefaultValue::Text(t)) if t == EPOCH_LITERAL => {
                DefaultValue::Now
            }
            (_, d) => d,
        };

        (ty, length, default)
    }

    fn to_native(
        &self,
        ty: &UniversalType,
        length: Option<u32>,
        default: DefaultValue,
    ) -> NativeTriple {
        let native = match ty {
            UniversalType::Smallint | UniversalType::Integer | UniversalType::Bigint => "integer",
            UniversalType::Real | UniversalType::Float => "real",
            UniversalType::Date | UniversalType::Time | UniversalType::Timestamp => "timestamp",
            UniversalType::Numeric => "numeric",
            UniversalType::Char => "char",
            UniversalType::Varchar => "varchar",
            UniversalType::Text => "text",
            UniversalType::Boolean => "boolean",
            UniversalType::Other(name) => name.as_str(),
        };

        let default = match default {
            DefaultValue::Now => DefaultValue::Text(EPOCH_LITERAL.to_string()),
            d => d,
        };

        (native.to_string(), length, default)
    }
}
