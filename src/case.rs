//! Field-name conversion between the storage convention (snake_case column
//! names) and the caller convention (camelCase keys), plus canonicalization
//! of legacy `...ISO` timestamp-field spellings.

use serde_json::{Map, Value};

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "plan_id" -> "planId", "inicio_iso" -> "inicioIso"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case, acronym-aware.
/// A trailing uppercase run is one segment ("inicioISO" -> "inicio_iso");
/// an uppercase run followed by a capitalized word breaks before the last
/// capital ("videoURLList" -> "video_url_list").
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if i > 0 && (!prev_upper || next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Canonicalize a camelCase key carrying the legacy all-caps ISO suffix:
/// "inicioISO" -> "inicioIso". Any other key passes through unchanged.
pub fn canonical_iso_key(key: &str) -> String {
    if key.len() > 3 && key.ends_with("ISO") {
        let mut out = key[..key.len() - 3].to_string();
        out.push_str("Iso");
        out
    } else {
        key.to_string()
    }
}

/// Convert all keys of a JSON object from snake_case to camelCase (in place).
/// Applied to rows leaving the data layer.
pub fn object_keys_to_camel_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let camel = to_camel_case(&k);
        if camel != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(camel, v);
            }
        }
    }
}

/// Convert all keys of a JSON object from camelCase to snake_case (in place).
/// Applied to inputs before they reach column names.
pub fn object_keys_to_snake_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let snake = to_snake_case(&k);
        if snake != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(snake, v);
            }
        }
    }
}

/// Recursively apply camelCase to all object keys in a Value (objects and arrays of objects).
pub fn value_keys_to_camel_case_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            object_keys_to_camel_case(map);
            for (_, v) in map.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        _ => {}
    }
}

/// Recursively apply snake_case to all object keys in a Value.
pub fn value_keys_to_snake_case_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            object_keys_to_snake_case(map);
            for (_, v) in map.iter_mut() {
                value_keys_to_snake_case_recursive(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                value_keys_to_snake_case_recursive(v);
            }
        }
        _ => {}
    }
}

/// Recursively rewrite legacy `...ISO` keys to the canonical `...Iso`
/// spelling. Runs after camelCase conversion on every read path so session
/// and feedback rows written under either historical spelling come back
/// under one.
pub fn canonicalize_iso_keys_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for k in keys {
                let canon = canonical_iso_key(&k);
                if canon != k {
                    if let Some(v) = map.remove(&k) {
                        map.insert(canon, v);
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                canonicalize_iso_keys_recursive(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                canonicalize_iso_keys_recursive(v);
            }
        }
        _ => {}
    }
}

/// Convert a row leaving the layer: snake_case -> camelCase, then ISO
/// canonicalization.
pub fn row_to_caller(value: &mut Value) {
    value_keys_to_camel_case_recursive(value);
    canonicalize_iso_keys_recursive(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_to_camel_basics() {
        assert_eq!(to_camel_case("plan_id"), "planId");
        assert_eq!(to_camel_case("created_at"), "createdAt");
        assert_eq!(to_camel_case("plan_adaptado"), "planAdaptado");
        assert_eq!(to_camel_case("teacher_id"), "teacherId");
    }

    #[test]
    fn camel_to_snake_basics() {
        assert_eq!(to_snake_case("planId"), "plan_id");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("planAdaptado"), "plan_adaptado");
    }

    #[test]
    fn trailing_acronym_is_one_segment() {
        assert_eq!(to_snake_case("inicioISO"), "inicio_iso");
        assert_eq!(to_snake_case("finISO"), "fin_iso");
        assert_eq!(to_snake_case("semanaISO"), "semana_iso");
    }

    #[test]
    fn internal_acronym_splits_before_next_word() {
        assert_eq!(to_snake_case("videoURLList"), "video_url_list");
        assert_eq!(to_snake_case("patternBPMValue"), "pattern_bpm_value");
    }

    #[test]
    fn conversions_are_idempotent() {
        assert_eq!(to_snake_case("plan_id"), "plan_id");
        assert_eq!(to_camel_case("planId"), "planId");
        assert_eq!(to_snake_case("inicio_iso"), "inicio_iso");
    }

    #[test]
    fn round_trip_holds_for_canonical_names() {
        for name in ["plan_id", "inicio_iso", "video_url_list", "teacher_id", "activo"] {
            assert_eq!(to_snake_case(&to_camel_case(name)), name);
        }
        for name in ["planId", "inicioIso", "videoUrlList", "displayName"] {
            assert_eq!(to_camel_case(&to_snake_case(name)), name);
        }
    }

    #[test]
    fn iso_key_canonicalization() {
        assert_eq!(canonical_iso_key("inicioISO"), "inicioIso");
        assert_eq!(canonical_iso_key("inicioIso"), "inicioIso");
        // Not a suffix beyond the acronym itself: untouched.
        assert_eq!(canonical_iso_key("ISO"), "ISO");
        assert_eq!(canonical_iso_key("plan"), "plan");
    }

    #[test]
    fn recursive_conversion_covers_nested_rows() {
        let mut v = json!({
            "plan_adaptado": { "created_at": "x", "bloques": [{ "block_id": 1 }] },
            "logs": [{ "inicio_iso": "2024-01-01" }]
        });
        value_keys_to_camel_case_recursive(&mut v);
        assert!(v["planAdaptado"]["bloques"][0].get("blockId").is_some());
        assert!(v["logs"][0].get("inicioIso").is_some());
    }

    #[test]
    fn read_path_normalizes_legacy_iso_spelling() {
        let mut v = json!({ "entries": [{ "inicioISO": "a", "finISO": "b" }], "inicioIso": "c" });
        row_to_caller(&mut v);
        assert_eq!(v["entries"][0]["inicioIso"], "a");
        assert_eq!(v["entries"][0]["finIso"], "b");
        assert_eq!(v["inicioIso"], "c");
    }
}
