//! Record helpers
//!
//! A record is one row returned by the hosted data platform: an opaque,
//! insertion-ordered mapping from field name to JSON value. Nothing here
//! validates record shape; helpers only look at the fields they are told about.

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// One catalog/content/member row
pub type Record = Map<String, Value>;

/// Default identifier field on data collection items
pub const DEFAULT_ID_KEY: &str = "_id";

/// Stringify an identifier value for use as a map key
///
/// Strings are used as-is, numbers and booleans via their JSON text.
/// Null, arrays and objects are not usable identifiers.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use shelf_common::record::key_of;
///
/// assert_eq!(key_of(&json!("abc")), Some("abc".to_string()));
/// assert_eq!(key_of(&json!(42)), Some("42".to_string()));
/// assert_eq!(key_of(&json!(null)), None);
/// ```
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Identifier of `record` under `key`, if it has a usable one
pub fn record_key(record: &Record, key: &str) -> Option<String> {
    record.get(key).and_then(key_of)
}

/// Index records by the value of `key`
///
/// Later records with the same identifier replace earlier ones; the entry keeps
/// the position of the first occurrence. Records without a usable identifier
/// are skipped.
pub fn index_by<I>(items: I, key: &str) -> IndexMap<String, Record>
where
    I: IntoIterator<Item = Record>,
{
    let mut result = IndexMap::new();
    let mut skipped = 0usize;

    for item in items {
        match record_key(&item, key) {
            Some(id) => {
                result.insert(id, item);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(key, skipped, "Records without a usable identifier were not indexed");
    }

    result
}

/// Join two id-keyed maps, nesting `extra` entries under `nest_key`
///
/// Starts from `base`. For every key of `extra`: when `base` already has the key,
/// the whole `extra` record is nested under `nest_key` inside the existing
/// entry; otherwise the `extra` record is inserted as-is. Keys present only in
/// `base` are untouched, so the merge is not symmetric.
pub fn merge_with_reference_key(
    base: IndexMap<String, Record>,
    extra: IndexMap<String, Record>,
    nest_key: &str,
) -> IndexMap<String, Record> {
    let mut result = base;

    for (key, value) in extra {
        match result.get_mut(&key) {
            Some(existing) => {
                existing.insert(nest_key.to_string(), Value::Object(value));
            }
            None => {
                result.insert(key, value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_key_of_scalars() {
        assert_eq!(key_of(&json!("x")), Some("x".to_string()));
        assert_eq!(key_of(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(key_of(&json!(true)), Some("true".to_string()));
        assert_eq!(key_of(&json!([1])), None);
        assert_eq!(key_of(&json!({"a": 1})), None);
    }

    #[test]
    fn test_index_by_last_write_wins() {
        let items = vec![
            rec(json!({"_id": "a", "n": 1})),
            rec(json!({"_id": "b", "n": 2})),
            rec(json!({"_id": "a", "n": 3})),
        ];

        let indexed = index_by(items, "_id");

        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed["a"]["n"], 3);
        // First occurrence keeps its position
        assert_eq!(indexed.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_index_by_skips_missing_key() {
        let items = vec![rec(json!({"name": "orphan"})), rec(json!({"contactId": "c1"}))];

        let indexed = index_by(items, "contactId");

        assert_eq!(indexed.len(), 1);
        assert!(indexed.contains_key("c1"));
    }

    #[test]
    fn test_merge_nests_matching_and_inserts_missing() {
        let base = index_by(vec![rec(json!({"id": "1", "a": 1}))], "id");
        let extra = index_by(
            vec![rec(json!({"id": "1", "b": 2})), rec(json!({"id": "2", "c": 3}))],
            "id",
        );

        let merged = merge_with_reference_key(base, extra, "ref");

        assert_eq!(
            Value::Object(merged["1"].clone()),
            json!({"id": "1", "a": 1, "ref": {"id": "1", "b": 2}})
        );
        assert_eq!(Value::Object(merged["2"].clone()), json!({"id": "2", "c": 3}));
    }

    #[test]
    fn test_merge_scenario_shapes() {
        let mut base = IndexMap::new();
        base.insert("1".to_string(), rec(json!({"a": 1})));
        let mut extra = IndexMap::new();
        extra.insert("1".to_string(), rec(json!({"b": 2})));
        extra.insert("2".to_string(), rec(json!({"c": 3})));

        let merged = merge_with_reference_key(base, extra, "ref");

        let as_json = serde_json::to_value(&merged).unwrap();
        assert_eq!(as_json, json!({"1": {"a": 1, "ref": {"b": 2}}, "2": {"c": 3}}));
    }

    #[test]
    fn test_merge_is_not_symmetric() {
        let mut a = IndexMap::new();
        a.insert("1".to_string(), rec(json!({"a": 1})));
        let mut b = IndexMap::new();
        b.insert("1".to_string(), rec(json!({"b": 2})));

        let ab = merge_with_reference_key(a.clone(), b.clone(), "ref");
        let ba = merge_with_reference_key(b, a, "ref");

        assert_ne!(ab, ba);
    }

    #[test]
    fn test_merge_leaves_base_only_keys_untouched() {
        let mut base = IndexMap::new();
        base.insert("only".to_string(), rec(json!({"keep": true})));

        let merged = merge_with_reference_key(base, IndexMap::new(), "ref");

        assert_eq!(Value::Object(merged["only"].clone()), json!({"keep": true}));
    }
}
