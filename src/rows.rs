//! Row view over loaded records.
//!
//! An object record is one row. An array record contributes one row per
//! element, which is how concatenated result files ("merged data") become a
//! single table. Fields are addressed by dotted paths.

use serde_json::Value;

use crate::models::JsonRecord;

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub source_key: &'a str,
    pub value: &'a Value,
}

impl<'a> Row<'a> {
    /// Field lookup; JSON `null` counts as missing.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        lookup(self.value, path).filter(|v| !v.is_null())
    }
}

pub fn rows(records: &[JsonRecord]) -> Vec<Row<'_>> {
    let mut out = Vec::new();
    for record in records {
        match &record.content {
            Value::Array(items) => out.extend(items.iter().map(|value| Row {
                source_key: &record.source_key,
                value,
            })),
            value => out.push(Row {
                source_key: &record.source_key,
                value,
            }),
        }
    }
    out
}

/// Resolve a dotted path. A literal key containing dots wins over nested
/// traversal; numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(found) = value.as_object().and_then(|obj| obj.get(path)) {
        return Some(found);
    }

    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Human label for a JSON value used as a category.
pub fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Every leaf and intermediate field path of an object, depth-first in
/// key order. Arrays are reported as a single path, not descended into.
pub fn field_paths(value: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    if let Value::Object(obj) = value {
        for (key, child) in obj {
            collect_paths(key.clone(), child, &mut out, 1);
        }
    }
    out
}

const MAX_PATH_DEPTH: usize = 4;

fn collect_paths<'a>(path: String, value: &'a Value, out: &mut Vec<(String, &'a Value)>, depth: usize) {
    match value {
        Value::Object(obj) if depth < MAX_PATH_DEPTH && !obj.is_empty() => {
            for (key, child) in obj {
                collect_paths(format!("{}.{}", path, key), child, out, depth + 1);
            }
        }
        _ => out.push((path, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(key: &str, content: Value) -> JsonRecord {
        JsonRecord {
            source_key: key.to_string(),
            content,
        }
    }

    #[test]
    fn test_arrays_expand_to_rows() {
        let records = vec![
            record("a.json", json!([{"x": 1}, {"x": 2}])),
            record("b.json", json!({"x": 3})),
        ];
        let rows = rows(&records);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].source_key, "a.json");
        assert_eq!(rows[2].source_key, "b.json");
        assert_eq!(rows[2].get("x"), Some(&json!(3)));
    }

    #[test]
    fn test_lookup_dotted_and_literal() {
        let value = json!({"a": {"b": {"c": 5}}, "d.e": "lit", "list": [10, 20]});
        assert_eq!(lookup(&value, "a.b.c"), Some(&json!(5)));
        assert_eq!(lookup(&value, "d.e"), Some(&json!("lit")));
        assert_eq!(lookup(&value, "list.1"), Some(&json!(20)));
        assert_eq!(lookup(&value, "a.x"), None);
        assert_eq!(lookup(&value, ""), None);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let value = json!({"k": null});
        let row = Row {
            source_key: "f",
            value: &value,
        };
        assert!(row.get("k").is_none());
    }

    #[test]
    fn test_field_paths_flatten_objects() {
        let value = json!({"id": 1, "meta": {"owner": "x", "tags": ["a"]}});
        let paths: Vec<String> = field_paths(&value).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["id", "meta.owner", "meta.tags"]);
    }
}
