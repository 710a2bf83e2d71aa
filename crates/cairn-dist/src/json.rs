//! Stable JSON output: sorted keys, four-space indentation.
//!
//! Generated manifests must be byte-identical across runs with unchanged
//! inputs, so objects are rebuilt in key order before serializing rather
//! than relying on the map type `serde_json` happens to be compiled with.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

/// Copy of `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect::<Map<String, Value>>(),
            )
        }
        other => other.clone(),
    }
}

/// Renders `value` with sorted keys and four-space indentation.
pub fn to_stable_string(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    canonicalize(value).serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Writes `value` to `path` in the stable format.
pub fn write_stable(path: &Path, value: &Value) -> io::Result<()> {
    let text = to_stable_string(value).map_err(io::Error::other)?;
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_at_every_level() {
        let value = json!({"b": {"z": 1, "a": [ {"y": true, "x": null} ]}, "a": "first"});
        let text = to_stable_string(&value).unwrap();
        assert_eq!(
            text,
            "{\n    \"a\": \"first\",\n    \"b\": {\n        \"a\": [\n            {\n                \"x\": null,\n                \"y\": true\n            }\n        ],\n        \"z\": 1\n    }\n}"
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(to_stable_string(&json!({})).unwrap(), "{}");
        assert_eq!(
            to_stable_string(&json!({"dependencies": {}})).unwrap(),
            "{\n    \"dependencies\": {}\n}"
        );
    }

    #[test]
    fn write_is_repeatable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("package.json");
        let value = json!({"name": "demo", "dependencies": {"b": "1", "a": "2"}});

        write_stable(&path, &value).unwrap();
        let first = fs::read(&path).unwrap();
        write_stable(&path, &value).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }
}
