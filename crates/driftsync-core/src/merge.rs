//! Deep merge for layered configuration
//!
//! Combines a base configuration tree with a local override tree before
//! either reaches the reconciliation core. Semantics:
//!
//! - Scalars: override wins.
//! - Objects: recursive merge. An override value of `null` **deletes** the
//!   key from the result; this is the only deletion mechanism.
//! - Arrays: when both sides hold objects and one side consistently carries
//!   a string `id` or `name` field, elements merge by that key (base order
//!   preserved, unmatched override entries appended). Otherwise the
//!   override array replaces the base wholesale.

use serde_json::{Map, Value};

/// Keys tried, in order, for element-wise array merging
const MERGE_KEYS: [&str; 2] = ["id", "name"];

/// Deep-merge `override_value` onto `base`.
pub fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_obj), Value::Object(over_obj)) => {
            Value::Object(merge_objects(base_obj, over_obj))
        }
        (Value::Array(base_arr), Value::Array(over_arr)) => {
            match find_merge_key(base_arr, over_arr) {
                Some(key) => Value::Array(merge_keyed_arrays(base_arr, over_arr, key)),
                None => override_value.clone(),
            }
        }
        _ => override_value.clone(),
    }
}

fn merge_objects(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    for (key, over_value) in over {
        if over_value.is_null() {
            result.remove(key);
            continue;
        }
        let merged = match base.get(key) {
            Some(base_value) => deep_merge(base_value, over_value),
            None => over_value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// Pick a merge key usable for both arrays: every element on both sides is
/// an object, and at least one side has the key as a string on every
/// element.
fn find_merge_key(base: &[Value], over: &[Value]) -> Option<&'static str> {
    let all_objects = base.iter().chain(over).all(Value::is_object);
    if !all_objects || (base.is_empty() && over.is_empty()) {
        return None;
    }

    MERGE_KEYS.into_iter().find(|key| {
        let usable = |arr: &[Value]| {
            !arr.is_empty() && arr.iter().all(|v| v.get(key).is_some_and(Value::is_string))
        };
        usable(base) || usable(over)
    })
}

fn merge_keyed_arrays(base: &[Value], over: &[Value], key: &str) -> Vec<Value> {
    let key_of = |v: &Value| -> Option<String> {
        v.get(key).and_then(Value::as_str).map(str::to_string)
    };

    // Base order preserved for pre-existing keys, matched entries merged
    // in place.
    let mut result: Vec<Value> = base
        .iter()
        .map(|base_elem| {
            let matched = key_of(base_elem)
                .and_then(|k| over.iter().find(|o| key_of(o).as_deref() == Some(k.as_str())));
            match matched {
                Some(over_elem) => deep_merge(base_elem, over_elem),
                None => base_elem.clone(),
            }
        })
        .collect();

    // Unmatched override entries appended in override order.
    for over_elem in over {
        let matches_base = key_of(over_elem)
            .is_some_and(|k| base.iter().any(|b| key_of(b).as_deref() == Some(k.as_str())));
        if !matches_base {
            result.push(over_elem.clone());
        }
    }
    result
}
