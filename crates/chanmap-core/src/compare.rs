//! Structural JSON comparison
//!
//! Two documents are equal when they hold the same keys and values, ignoring
//! object key order and array element order. Integral floats compare equal
//! to integers (`1.0 == 1`).

use serde_json::{Map, Number, Value};

/// Compare two JSON documents structurally
pub fn compare_json(expected: &Value, actual: &Value) -> bool {
    canonical(expected) == canonical(actual)
}

/// Locate the first difference between two documents, as a JSON pointer.
///
/// Returns `None` when [`compare_json`] would return `true`. Arrays are
/// compared after canonical sorting, so the index in the pointer refers to
/// the sorted position.
pub fn first_difference(expected: &Value, actual: &Value) -> Option<String> {
    diff_at(&canonical(expected), &canonical(actual), String::new())
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonical).collect();
            items.sort_by_cached_key(|v| v.to_string());
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Number(n) => Value::Number(canonical_number(n)),
        other => other.clone(),
    }
}

fn canonical_number(n: &Number) -> Number {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                return Number::from(f as i64);
            }
        }
    }
    n.clone()
}

fn diff_at(expected: &Value, actual: &Value, path: String) -> Option<String> {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, ev) in e {
                let child = format!("{path}/{key}");
                match a.get(key) {
                    Some(av) => {
                        if let Some(found) = diff_at(ev, av, child) {
                            return Some(found);
                        }
                    }
                    None => return Some(child),
                }
            }
            a.keys()
                .find(|k| !e.contains_key(*k))
                .map(|k| format!("{path}/{k}"))
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Some(path);
            }
            e.iter()
                .zip(a)
                .enumerate()
                .find_map(|(i, (ev, av))| diff_at(ev, av, format!("{path}/{i}")))
        }
        (e, a) if e == a => None,
        _ => Some(if path.is_empty() { "/".to_string() } else { path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_ignored() {
        let a = json!({"a": 1, "b": {"c": [1, 2]}});
        let b = json!({"b": {"c": [1, 2]}, "a": 1});
        assert!(compare_json(&a, &b));
    }

    #[test]
    fn test_array_order_ignored() {
        let a = json!([{"label": "L"}, {"label": "R"}]);
        let b = json!([{"label": "R"}, {"label": "L"}]);
        assert!(compare_json(&a, &b));
    }

    #[test]
    fn test_array_length_matters() {
        assert!(!compare_json(&json!([1, 1]), &json!([1])));
    }

    #[test]
    fn test_integral_float_equals_int() {
        assert!(compare_json(&json!({"block_size": 2}), &json!({"block_size": 2.0})));
        assert!(!compare_json(&json!(2), &json!(2.5)));
    }

    #[test]
    fn test_null_is_not_missing() {
        assert!(!compare_json(&json!({"a": null}), &json!({})));
    }

    #[test]
    fn test_first_difference_reports_path() {
        let a = json!({"inputs": {"in1": {"caps": {"block_size": 1}}}});
        let b = json!({"inputs": {"in1": {"caps": {"block_size": 2}}}});
        assert_eq!(
            first_difference(&a, &b).as_deref(),
            Some("/inputs/in1/caps/block_size")
        );
        assert_eq!(first_difference(&a, &a), None);
    }

    #[test]
    fn test_first_difference_extra_key() {
        let a = json!({"outputs": {}});
        let b = json!({"outputs": {}, "extra": true});
        assert_eq!(first_difference(&a, &b).as_deref(), Some("/extra"));
    }
}
