//! SQL formatting
//!
//! Formats SQL statements using the sqlformat crate. Used to print the
//! pending DDL of a dry-run schema synchronization.

use sqlformat::{FormatOptions, Indent, QueryParams, format};

/// Format a SQL statement string
///
/// # Examples
/// ```ignore
/// let formatted = format_sql("create index idx_post_cat on post (cat_id)");
/// // Returns the statement with uppercase keywords and two-space indentation
/// ```
pub fn format_sql(sql: &str) -> String {
    format_sql_with_indent(sql, 2)
}

/// Format SQL with custom indentation
pub fn format_sql_with_indent(sql: &str, indent_size: u8) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(indent_size),
        uppercase: Some(true),
        lines_between_queries: 2,
        ..Default::default()
    };

    format(sql, &QueryParams::None, &options)
}

/// Format a batch of statements, one blank line apart, each terminated by `;`.
pub fn format_script<S: AsRef<str>>(statements: &[S]) -> String {
    statements
        .iter()
        .map(|s| format!("{};", format_sql(s.as_ref().trim_end_matches(';'))))
        .collect::<Vec<_>>()
        .join("\n\n")
}
