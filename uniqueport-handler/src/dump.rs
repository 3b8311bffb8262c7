//! Deep textual rendering of values for diagnostic logs
//!
//! Values are rendered as pretty-printed JSON with a four-space indent. Two
//! guards keep a hostile payload from blowing up the log sink: containers
//! nested past `max_depth` are elided as `[Object]` / `[Array]`, and output
//! longer than `max_len` bytes is cut with a trailing byte count.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const INDENT: &str = "    ";

/// Limits applied while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DumpLimits {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for DumpLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_len: default_max_len(),
        }
    }
}

fn default_max_depth() -> usize {
    64
}

fn default_max_len() -> usize {
    256 * 1024
}

/// Render any serializable value
pub fn render<T: Serialize + ?Sized>(value: &T, limits: &DumpLimits) -> String {
    match serde_json::to_value(value) {
        Ok(value) => render_value(&value, limits),
        Err(e) => format!("<unserializable: {}>", e),
    }
}

/// Render an already-built JSON value
pub fn render_value(value: &Value, limits: &DumpLimits) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0, limits.max_depth);
    truncate(out, limits.max_len)
}

fn write_value(out: &mut String, value: &Value, depth: usize, max_depth: usize) {
    match value {
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Array(_) if depth >= max_depth => out.push_str("[Array]"),
        Value::Object(_) if depth >= max_depth => out.push_str("[Object]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_value(out, item, depth + 1, max_depth);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                indent(out, depth + 1);
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push_str(": ");
                write_value(out, item, depth + 1, max_depth);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn truncate(mut out: String, max_len: usize) -> String {
    if out.len() <= max_len {
        return out;
    }

    let mut cut = max_len;
    while !out.is_char_boundary(cut) {
        cut -= 1;
    }
    let dropped = out.len() - cut;
    out.truncate(cut);
    out.push_str(&format!("... ({} more bytes)", dropped));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_nested() {
        let value = json!({"port": 8080, "tags": ["a", {"b": null}]});
        let rendered = render_value(&value, &DumpLimits::default());

        assert_eq!(
            rendered,
            "{\n    \"port\": 8080,\n    \"tags\": [\n        \"a\",\n        {\n            \"b\": null\n        }\n    ]\n}"
        );
    }

    #[test]
    fn test_render_scalars_and_empty() {
        let limits = DumpLimits::default();
        assert_eq!(render_value(&json!({}), &limits), "{}");
        assert_eq!(render_value(&json!([]), &limits), "[]");
        assert_eq!(render_value(&json!("x\"y"), &limits), "\"x\\\"y\"");
        assert_eq!(render_value(&json!(1.5), &limits), "1.5");
    }

    #[test]
    fn test_depth_guard() {
        let limits = DumpLimits {
            max_depth: 1,
            ..Default::default()
        };
        let value = json!({"a": {"b": 1}, "c": [1, 2], "d": []});

        assert_eq!(
            render_value(&value, &limits),
            "{\n    \"a\": [Object],\n    \"c\": [Array],\n    \"d\": []\n}"
        );
    }

    #[test]
    fn test_deep_value_within_limit_is_complete() {
        let mut value = json!("leaf");
        for _ in 0..40 {
            value = json!({ "n": value });
        }

        let rendered = render_value(&value, &DumpLimits::default());
        assert!(rendered.contains("\"leaf\""));
        assert!(!rendered.contains("[Object]"));
    }

    #[test]
    fn test_size_guard() {
        let limits = DumpLimits {
            max_len: 10,
            ..Default::default()
        };
        let rendered = render_value(&json!("0123456789abcdef"), &limits);

        assert_eq!(rendered, "\"012345678... (8 more bytes)");
    }

    #[test]
    fn test_size_guard_respects_char_boundary() {
        let limits = DumpLimits {
            max_len: 4,
            ..Default::default()
        };
        // '"' then two 2-byte 'é': byte 4 falls inside the second one
        let rendered = render_value(&json!("éé"), &limits);

        assert_eq!(rendered, "\"é... (3 more bytes)");
    }

    #[test]
    fn test_render_struct() {
        #[derive(Serialize)]
        struct Ctx {
            request_id: &'static str,
        }

        let rendered = render(&Ctx { request_id: "abc" }, &DumpLimits::default());
        assert_eq!(rendered, "{\n    \"request_id\": \"abc\"\n}");
    }

    #[test]
    fn test_render_unserializable() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON");

        assert!(render(&map, &DumpLimits::default()).starts_with("<unserializable: "));
    }
}
