use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("setting `{0}` is required")]
    Missing(&'static str),

    #[error("setting `{key}` is invalid: {details}")]
    Invalid {
        key: &'static str,
        details: String,
    },
}

/// Typed accessors over a request's settings map.
///
/// Values produced by loosely-typed upstream tooling arrive as strings,
/// numbers, or booleans interchangeably; the readers accept all reasonable
/// encodings.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    map: Map<String, Value>,
}

impl Settings {
    pub fn new(map: Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn read_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.read_str(key).ok_or(ConfigError::Missing(key))
    }

    pub fn read_bool(&self, key: &str) -> bool {
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn read_u16(&self, key: &str) -> Option<u16> {
        match self.map.get(key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|v| v.try_into().ok()),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn command_type(&self) -> CommandType {
        match self.read_str("command_type") {
            Some("stored procedure") => CommandType::StoredProcedure,
            _ => CommandType::TableUpsert,
        }
    }
}

/// How DML is rendered for a SQL destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandType {
    #[default]
    TableUpsert,
    StoredProcedure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(v: Value) -> Settings {
        Settings::new(v.as_object().unwrap().clone())
    }

    #[test]
    fn read_str_ignores_empty_values() {
        let s = settings(json!({"server": "db1", "database": ""}));
        assert_eq!(s.read_str("server"), Some("db1"));
        assert_eq!(s.read_str("database"), None);
        assert_eq!(s.read_str("missing"), None);
    }

    #[test]
    fn require_str_reports_the_missing_key() {
        let s = settings(json!({}));
        let err = s.require_str("server").unwrap_err();
        assert_eq!(err.to_string(), "setting `server` is required");
    }

    #[test]
    fn read_bool_accepts_bool_and_string() {
        let s = settings(json!({
            "a": true,
            "b": "true",
            "c": "TRUE",
            "d": "no",
            "e": 1
        }));
        assert!(s.read_bool("a"));
        assert!(s.read_bool("b"));
        assert!(s.read_bool("c"));
        assert!(!s.read_bool("d"));
        assert!(!s.read_bool("e"));
        assert!(!s.read_bool("missing"));
    }

    #[test]
    fn read_u16_accepts_number_and_string() {
        let s = settings(json!({"port": 3307, "alt": "1433", "bad": "x"}));
        assert_eq!(s.read_u16("port"), Some(3307));
        assert_eq!(s.read_u16("alt"), Some(1433));
        assert_eq!(s.read_u16("bad"), None);
    }

    #[test]
    fn command_type_defaults_to_table_upsert() {
        let s = settings(json!({}));
        assert_eq!(s.command_type(), CommandType::TableUpsert);

        let s = settings(json!({"command_type": "stored procedure"}));
        assert_eq!(s.command_type(), CommandType::StoredProcedure);
    }
}
