//! Assignment plan representation: a tagged union over the three
//! historically accumulated storage fields (`plan_id` reference,
//! `plan_adaptado` snapshot, legacy inline `plan`), with the flat-column
//! mapping kept at the storage boundary only.

use serde_json::{Map, Value};

pub const PLAN_ID: &str = "plan_id";
pub const PLAN_ADAPTADO: &str = "plan_adaptado";
pub const PLAN_LEGACY: &str = "plan";

/// Which plan representation an assignment carries. At most one is ever
/// stored; the DB CHECK constraint backs this up.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanSource {
    /// Foreign-key-style pointer to a reusable plan template.
    Reference(String),
    /// Fully copied, independently mutable duplicate of a plan.
    Snapshot(Value),
    /// Inline plan from before the reference/snapshot split.
    Legacy(Value),
    None,
}

fn non_empty(v: Option<&Value>) -> Option<&Value> {
    match v {
        Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
        None => None,
    }
}

impl PlanSource {
    /// Read the representation out of a stored row (snake_case keys).
    /// Snapshot wins over reference wins over legacy, matching the read
    /// resolution priority.
    pub fn from_row(row: &Value) -> PlanSource {
        if let Some(snap) = non_empty(row.get(PLAN_ADAPTADO)) {
            return PlanSource::Snapshot(snap.clone());
        }
        if let Some(id) = non_empty(row.get(PLAN_ID)).and_then(Value::as_str) {
            return PlanSource::Reference(id.to_string());
        }
        if let Some(legacy) = non_empty(row.get(PLAN_LEGACY)) {
            return PlanSource::Legacy(legacy.clone());
        }
        PlanSource::None
    }

    /// Flat-column shape for a write: (plan_id, plan_adaptado, plan).
    pub fn to_columns(&self) -> (Value, Value, Value) {
        match self {
            PlanSource::Reference(id) => (Value::String(id.clone()), Value::Null, Value::Null),
            PlanSource::Snapshot(v) => (Value::Null, v.clone(), Value::Null),
            PlanSource::Legacy(v) => (Value::Null, Value::Null, v.clone()),
            PlanSource::None => (Value::Null, Value::Null, Value::Null),
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            PlanSource::Reference(id) => Some(id),
            _ => None,
        }
    }
}

/// Create-path exclusivity: a supplied reference id forces the snapshot
/// empty; a supplied snapshot (or legacy plan) without a reference forces
/// the reference empty. Absence of all three is left for the DB constraint.
pub fn enforce_exclusive_on_create(body: &mut Map<String, Value>) {
    let has_ref = non_empty(body.get(PLAN_ID)).is_some();
    let has_snapshot = non_empty(body.get(PLAN_ADAPTADO)).is_some();
    let has_legacy = non_empty(body.get(PLAN_LEGACY)).is_some();
    if has_ref {
        body.insert(PLAN_ADAPTADO.into(), Value::Null);
        body.insert(PLAN_LEGACY.into(), Value::Null);
    } else if has_snapshot {
        body.insert(PLAN_ID.into(), Value::Null);
        body.insert(PLAN_LEGACY.into(), Value::Null);
    } else if has_legacy {
        body.insert(PLAN_ID.into(), Value::Null);
    }
}

/// Update-path exclusivity: setting one representation nulls its
/// counterpart, but only when the counterpart was not also explicitly
/// supplied in the same call. A single update can therefore switch from
/// reference to snapshot without the caller nulling fields manually, while
/// an explicit pair is forwarded as given.
pub fn enforce_exclusive_on_update(body: &mut Map<String, Value>) {
    let ref_supplied = body.contains_key(PLAN_ID);
    let snapshot_supplied = body.contains_key(PLAN_ADAPTADO);
    let legacy_supplied = body.contains_key(PLAN_LEGACY);
    let ref_set = non_empty(body.get(PLAN_ID)).is_some();
    let snapshot_set = non_empty(body.get(PLAN_ADAPTADO)).is_some();
    let legacy_set = non_empty(body.get(PLAN_LEGACY)).is_some();

    if snapshot_set && !ref_supplied {
        body.insert(PLAN_ID.into(), Value::Null);
    }
    if ref_set && !snapshot_supplied {
        body.insert(PLAN_ADAPTADO.into(), Value::Null);
    }
    if (snapshot_set || ref_set) && !legacy_supplied {
        body.insert(PLAN_LEGACY.into(), Value::Null);
    }
    if legacy_set && !ref_supplied && !snapshot_set {
        body.insert(PLAN_ID.into(), Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn from_row_prefers_snapshot_then_reference_then_legacy() {
        let row = json!({ "plan_adaptado": {"nombre": "p"}, "plan_id": "tpl-1" });
        assert!(matches!(PlanSource::from_row(&row), PlanSource::Snapshot(_)));
        let row = json!({ "plan_id": "tpl-1", "plan": {"nombre": "old"} });
        assert_eq!(
            PlanSource::from_row(&row).reference_id(),
            Some("tpl-1")
        );
        let row = json!({ "plan": {"nombre": "old"} });
        assert!(matches!(PlanSource::from_row(&row), PlanSource::Legacy(_)));
        let row = json!({ "plan_id": null, "plan_adaptado": "" });
        assert_eq!(PlanSource::from_row(&row), PlanSource::None);
    }

    #[test]
    fn create_with_reference_clears_snapshot() {
        let mut body = obj(json!({ "plan_id": "tpl-1", "plan_adaptado": {"x": 1} }));
        enforce_exclusive_on_create(&mut body);
        assert_eq!(body["plan_id"], "tpl-1");
        assert_eq!(body["plan_adaptado"], Value::Null);
        assert_eq!(body["plan"], Value::Null);
    }

    #[test]
    fn create_with_snapshot_clears_reference() {
        let mut body = obj(json!({ "plan_adaptado": {"x": 1} }));
        enforce_exclusive_on_create(&mut body);
        assert_eq!(body["plan_id"], Value::Null);
        assert!(body["plan_adaptado"].is_object());
    }

    #[test]
    fn create_with_neither_is_left_for_the_db_constraint() {
        let mut body = obj(json!({ "student_id": "s" }));
        enforce_exclusive_on_create(&mut body);
        assert!(!body.contains_key("plan_id"));
        assert!(!body.contains_key("plan_adaptado"));
    }

    #[test]
    fn update_snapshot_only_nulls_reference() {
        let mut body = obj(json!({ "plan_adaptado": {"x": 1} }));
        enforce_exclusive_on_update(&mut body);
        assert_eq!(body["plan_id"], Value::Null);
        assert_eq!(body["plan"], Value::Null);
    }

    #[test]
    fn update_reference_only_nulls_snapshot() {
        let mut body = obj(json!({ "plan_id": "tpl-2" }));
        enforce_exclusive_on_update(&mut body);
        assert_eq!(body["plan_adaptado"], Value::Null);
        assert_eq!(body["plan"], Value::Null);
    }

    #[test]
    fn update_with_both_explicit_is_forwarded_as_given() {
        let mut body = obj(json!({ "plan_id": "tpl-2", "plan_adaptado": {"x": 1} }));
        enforce_exclusive_on_update(&mut body);
        assert_eq!(body["plan_id"], "tpl-2");
        assert!(body["plan_adaptado"].is_object());
    }

    #[test]
    fn columns_round_trip_through_tagged_union() {
        let src = PlanSource::Reference("tpl-9".into());
        let (id, snap, legacy) = src.to_columns();
        let row = json!({ "plan_id": id, "plan_adaptado": snap, "plan": legacy });
        assert_eq!(PlanSource::from_row(&row), src);
    }
}
