//! Identifier scrubbing and quoting.
//!
//! Every user-controlled name passes through [`scrub`] exactly once, at
//! render time, producing the canonical quoted form. The scrubber keeps
//! `[A-Za-z0-9_.\- ]` and drops everything else, which also strips both
//! dialects' own quote characters.

use crate::Dialect;

/// Remove every character that is not alphanumeric, underscore, dot, dash,
/// or space.
pub fn scrub(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ')
        })
        .collect()
}

/// Scrub and quote a single identifier for the dialect.
pub fn quote(dialect: Dialect, ident: &str) -> String {
    let (open, close) = dialect.quotes();
    format!("{open}{}{close}", scrub(ident))
}

/// Render a canonical name as a table reference.
///
/// A `schema__entity` compound splits on the first `__` into a
/// schema-qualified identifier; anything else is a single identifier.
pub fn qualify_name(dialect: Dialect, name: &str) -> String {
    match name.split_once("__") {
        Some((schema, entity)) if !schema.is_empty() => {
            format!(
                "{}.{}",
                quote(dialect, schema),
                quote(dialect, entity)
            )
        }
        _ => quote(dialect, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_strips_quote_characters() {
        assert_eq!(scrub("`DROP Database"), "DROP Database");
        assert_eq!(scrub("[x]"), "x");
    }

    #[test]
    fn scrub_keeps_dots_dashes_and_spaces() {
        assert_eq!(scrub("x.y"), "x.y");
        assert_eq!(scrub("a-b c_d"), "a-b c_d");
    }

    #[test]
    fn scrub_drops_injection_attempts() {
        assert_eq!(scrub("id; DROP TABLE t--"), "id DROP TABLE t--");
        assert_eq!(scrub("a'b\"c"), "abc");
    }

    #[test]
    fn quote_wraps_per_dialect() {
        assert_eq!(quote(Dialect::MariaDb, "`DROP Database"), "`DROP Database`");
        assert_eq!(quote(Dialect::Mssql, "Test.Products"), "[Test.Products]");
    }

    #[test]
    fn qualify_splits_schema_compounds() {
        assert_eq!(
            qualify_name(Dialect::Mssql, "sales__Orders"),
            "[sales].[Orders]"
        );
        assert_eq!(
            qualify_name(Dialect::MariaDb, "sales__Orders"),
            "`sales`.`Orders`"
        );
        assert_eq!(
            qualify_name(Dialect::MariaDb, "Test.Products"),
            "`Test.Products`"
        );
    }
}
