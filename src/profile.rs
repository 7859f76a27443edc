//! User-record normalization: display-name derivation for local reads,
//! role and teacher-reference normalization for writes.

use crate::entity::Role;
use crate::error::DataError;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Placeholder when nothing usable exists on the record.
pub const FALLBACK_DISPLAY_NAME: &str = "Alumno";

/// Email local-parts matching this are opaque identifiers, not names; the
/// raw email is kept as display name for them. The pattern is historical
/// behavior and is preserved verbatim.
const OPAQUE_LOCAL_PART: &str = r"^[A-Za-z0-9]{16,}$";

fn str_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// Derive a display name for a user record (caller-convention keys).
/// Priority: stored displayName, fullName, first+last name, humanized
/// email local-part, generic placeholder.
pub fn derive_display_name(record: &Value) -> String {
    if let Some(name) = str_field(record, "displayName") {
        return name.to_string();
    }
    if let Some(name) = str_field(record, "fullName") {
        return name.to_string();
    }
    let first = str_field(record, "firstName");
    let last = str_field(record, "lastName");
    if first.is_some() || last.is_some() {
        return [first, last].iter().flatten().cloned().collect::<Vec<_>>().join(" ");
    }
    if let Some(email) = str_field(record, "email") {
        return display_name_from_email(email);
    }
    FALLBACK_DISPLAY_NAME.to_string()
}

/// "jane.doe@example.com" -> "Jane Doe". Opaque local-parts (long
/// alphanumeric runs) keep the raw email instead.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    if local.is_empty() {
        return FALLBACK_DISPLAY_NAME.to_string();
    }
    let opaque = Regex::new(OPAQUE_LOCAL_PART).ok();
    if opaque.map(|re| re.is_match(local)).unwrap_or(false) {
        return email.to_string();
    }
    let words: Vec<String> = local
        .split(['.', '_', '-'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    if words.is_empty() {
        email.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case and validate the `role` column on a write body (snake_case
/// keys). Invalid or missing role falls back to the default role.
pub fn normalize_role(body: &mut Map<String, Value>) {
    let role = body
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .unwrap_or(Role::DEFAULT);
    body.insert("role".into(), Value::String(role.as_str().to_string()));
}

/// Profile-write path: clear a `teacher_id` that is not a valid uuid
/// instead of erroring. Mixed-origin legacy identifiers show up in
/// historical data and must not break profile saves.
pub fn sanitize_teacher_ref(body: &mut Map<String, Value>) {
    let Some(raw) = body.get("teacher_id").and_then(Value::as_str) else {
        return;
    };
    if raw.is_empty() || Uuid::parse_str(raw).is_err() {
        tracing::warn!(teacher_id = %raw, "clearing non-uuid teacher reference on profile write");
        body.insert("teacher_id".into(), Value::Null);
    }
}

/// Explicit teacher-assignment path: a malformed id is a validation error
/// naming the offending value.
pub fn validate_teacher_ref(value: &str) -> Result<Uuid, DataError> {
    Uuid::parse_str(value).map_err(|_| {
        DataError::Validation(format!("teacher id '{}' is not a valid uuid", value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_stored_display_name() {
        let rec = json!({ "displayName": "Sra. García", "email": "x@y.z" });
        assert_eq!(derive_display_name(&rec), "Sra. García");
    }

    #[test]
    fn falls_back_through_full_then_part_names() {
        let rec = json!({ "fullName": "Jane Doe" });
        assert_eq!(derive_display_name(&rec), "Jane Doe");
        let rec = json!({ "firstName": "Jane", "lastName": "Doe" });
        assert_eq!(derive_display_name(&rec), "Jane Doe");
        let rec = json!({ "lastName": "Doe" });
        assert_eq!(derive_display_name(&rec), "Doe");
    }

    #[test]
    fn humanizes_email_local_part() {
        let rec = json!({ "email": "jane.doe@example.com" });
        assert_eq!(derive_display_name(&rec), "Jane Doe");
        assert_eq!(display_name_from_email("ana_maria-lopez@x.es"), "Ana Maria Lopez");
    }

    #[test]
    fn opaque_local_part_keeps_raw_email() {
        let email = "a1b2c3d4e5f6a7b8c9d0@example.com";
        assert_eq!(display_name_from_email(email), email);
        // Short local-parts are still humanized.
        assert_eq!(display_name_from_email("bob@example.com"), "Bob");
    }

    #[test]
    fn empty_record_gets_placeholder() {
        assert_eq!(derive_display_name(&json!({})), FALLBACK_DISPLAY_NAME);
    }

    #[test]
    fn role_normalization_uppercases_and_defaults() {
        let mut body = json!({ "role": "teacher" }).as_object().unwrap().clone();
        normalize_role(&mut body);
        assert_eq!(body["role"], "TEACHER");
        let mut body = json!({ "role": "wizard" }).as_object().unwrap().clone();
        normalize_role(&mut body);
        assert_eq!(body["role"], "STUDENT");
    }

    #[test]
    fn profile_write_clears_legacy_teacher_ids_silently() {
        let mut body = json!({ "teacher_id": "legacy:42" }).as_object().unwrap().clone();
        sanitize_teacher_ref(&mut body);
        assert_eq!(body["teacher_id"], Value::Null);
        let mut body = json!({ "teacher_id": "7fe02cd5-9d99-4ab3-9bb2-0f7d4c8e3a01" })
            .as_object()
            .unwrap()
            .clone();
        sanitize_teacher_ref(&mut body);
        assert!(body["teacher_id"].is_string());
    }

    #[test]
    fn explicit_teacher_assignment_names_the_bad_value() {
        let err = validate_teacher_ref("not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("not-a-uuid"));
    }
}
