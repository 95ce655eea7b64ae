//! Logical-to-physical type mapping per dialect.

use crate::Dialect;

/// Map a logical wire type to the dialect's column type. Unknown logical
/// types surface as the string column type.
pub fn to_sql_type(dialect: Dialect, logical: &str) -> &'static str {
    match dialect {
        Dialect::MariaDb => match logical {
            "date" => "DATETIME",
            "integer" => "INT(10)",
            "float" | "number" => "FLOAT",
            "bool" => "BIT",
            _ => "VARCHAR(1000)",
        },
        Dialect::Mssql => match logical {
            "date" => "SMALLDATETIME",
            "integer" => "INT",
            "float" | "number" => "DECIMAL(18,4)",
            "bool" => "BIT",
            _ => "NVARCHAR(512)",
        },
    }
}

/// Map a physical column type (as reported by destination introspection)
/// back to a logical wire type. Size suffixes like `int(10)` are ignored.
pub fn from_sql_type(physical: &str) -> &'static str {
    let base = physical
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match base.as_str() {
        "datetime" | "date" | "time" | "smalldatetime" => "date",
        "bigint" | "int" | "smallint" | "tinyint" => "integer",
        "decimal" | "float" | "money" | "smallmoney" => "float",
        "bit" => "bool",
        _ => "string",
    }
}
