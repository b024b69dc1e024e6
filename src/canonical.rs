use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Render a JSON value in canonical form: object keys sorted
/// lexicographically, no insignificant whitespace, arrays in order,
/// strings escaped the minimal JSON way. Two structurally equal values
/// always produce identical bytes, so the output is safe to hash.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file's contents.
pub fn sha256_file(path: &std::path::Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(sha256_hex(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorted_keys() {
        let val = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_json(&val), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let val = json!({"b": {"d": 1, "c": 2}, "a": [3, 2, 1]});
        assert_eq!(canonical_json(&val), r#"{"a":[3,2,1],"b":{"c":2,"d":1}}"#);
    }

    #[test]
    fn test_deterministic() {
        let val = json!({"action": "TEST_ADDED", "details": {"id": "x", "checksum": "y"}});
        assert_eq!(canonical_json(&val), canonical_json(&val));
    }

    #[test]
    fn test_string_escaping() {
        let val = json!({"msg": "line1\nline2\ttab \"quoted\""});
        let canon = canonical_json(&val);
        assert!(canon.contains("\\n"));
        assert!(canon.contains("\\t"));
        assert!(canon.contains("\\\"quoted\\\""));
    }

    #[test]
    fn test_control_chars_escaped() {
        let val = json!({"c": "\u{1}"});
        assert_eq!(canonical_json(&val), "{\"c\":\"\\u0001\"}");
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
