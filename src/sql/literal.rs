//! SQL quoting
//!
//! All generated SQL goes through these two quoting paths: identifiers are
//! double-quoted with embedded quotes doubled, and literal values are
//! single-quoted likewise. JSON values render natively for scalars and as
//! quoted JSON text for structures.

use serde_json::Value;

pub fn sql_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a JSON value as a SQL literal. Scalars keep their native form so
/// the database coerces them to the column type; strings and structures are
/// quoted.
pub fn sql_json_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => sql_literal(s),
        other => sql_literal(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(sql_identifier("name"), "\"name\"");
        assert_eq!(sql_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_literal_quoting() {
        assert_eq!(sql_literal("alice"), "'alice'");
        assert_eq!(sql_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_json_literal() {
        assert_eq!(sql_json_literal(&Value::Null), "NULL");
        assert_eq!(sql_json_literal(&serde_json::json!(7)), "7");
        assert_eq!(sql_json_literal(&serde_json::json!(true)), "true");
        assert_eq!(sql_json_literal(&serde_json::json!("a'b")), "'a''b'");
        assert_eq!(sql_json_literal(&serde_json::json!([1, 2])), "'[1,2]'");
    }
}
