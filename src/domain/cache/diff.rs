//! Top-level field differencing for differential storage

use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Fields of `updated` whose value differs from `base`.
///
/// Only top-level fields are compared; nested values are compared as a
/// whole. Fails when either side is not an object or when `updated`
/// drops a field that `base` has, since a merge could not express the
/// removal.
pub fn compute_diff(base: &Value, updated: &Value) -> Result<Map<String, Value>, DomainError> {
    let base = base
        .as_object()
        .ok_or_else(|| DomainError::cache("Base snapshot is not a JSON object"))?;
    let updated = updated
        .as_object()
        .ok_or_else(|| DomainError::cache("Updated payload is not a JSON object"))?;

    if let Some(removed) = base.keys().find(|key| !updated.contains_key(*key)) {
        return Err(DomainError::cache(format!(
            "Field '{}' was removed since the base snapshot",
            removed
        )));
    }

    Ok(updated
        .iter()
        .filter(|(key, value)| base.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect())
}

/// `base` with every field of `diff` laid over it
pub fn merge(base: &Value, diff: &Value) -> Value {
    match (base, diff) {
        (Value::Object(base), Value::Object(diff)) => {
            let mut merged = base.clone();

            for (key, value) in diff {
                merged.insert(key.clone(), value.clone());
            }

            Value::Object(merged)
        }
        (_, diff) => diff.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quote(price: f64, change_percent: f64) -> Value {
        json!({
            "ticker": "7203",
            "name": "Toyota Motor",
            "price": price,
            "changePercent": change_percent,
            "currency": "JPY",
            "details": {"market": "TSE Prime", "lot": 100}
        })
    }

    #[test]
    fn test_diff_contains_only_changed_fields() {
        let diff = compute_diff(&quote(2500.0, 1.2), &quote(2510.0, 1.2)).unwrap();

        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("price"), Some(&json!(2510.0)));
    }

    #[test]
    fn test_identical_payloads_produce_empty_diff() {
        let diff = compute_diff(&quote(2500.0, 1.2), &quote(2500.0, 1.2)).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_nested_change_replaces_whole_field() {
        let base = quote(2500.0, 1.2);
        let mut updated = base.clone();
        updated["details"]["lot"] = json!(1);

        let diff = compute_diff(&base, &updated).unwrap();

        assert_eq!(diff.len(), 1);
        assert_eq!(diff["details"], json!({"market": "TSE Prime", "lot": 1}));
    }

    #[test]
    fn test_new_field_is_part_of_diff() {
        let base = quote(2500.0, 1.2);
        let mut updated = base.clone();
        updated["volume"] = json!(1_000_000);

        let diff = compute_diff(&base, &updated).unwrap();
        assert_eq!(diff.get("volume"), Some(&json!(1_000_000)));
    }

    #[test]
    fn test_removed_field_is_rejected() {
        let base = quote(2500.0, 1.2);
        let mut updated = base.clone();
        updated.as_object_mut().unwrap().remove("name");

        assert!(compute_diff(&base, &updated).is_err());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert!(compute_diff(&json!([1, 2]), &json!([1, 3])).is_err());
        assert!(compute_diff(&json!({"a": 1}), &json!(5)).is_err());
    }

    #[test]
    fn test_merge_reconstructs_update() {
        let base = quote(2500.0, 1.2);
        let updates = [
            quote(2510.0, 1.2),
            quote(2400.0, -3.9),
            {
                let mut u = quote(2500.0, 1.2);
                u["currency"] = json!("USD");
                u["extra"] = json!({"note": "adr"});
                u
            },
        ];

        for updated in updates {
            let diff = Value::Object(compute_diff(&base, &updated).unwrap());
            assert_eq!(merge(&base, &diff), updated);
        }
    }

    #[test]
    fn test_merge_diff_overrides_base() {
        let merged = merge(&json!({"a": 1, "b": 2}), &json!({"b": 3}));
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }
}
