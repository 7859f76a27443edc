//! The uniform CRUD contract both backends implement, and the shared
//! sort/filter semantics.

use crate::entity::EntityKind;
use crate::error::DataError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct DeleteResult {
    pub success: bool,
}

/// Uniform entity surface. Rows are JSON objects in the caller convention
/// (camelCase keys, canonical `...Iso` field spellings).
#[async_trait]
pub trait DataClient: Send + Sync {
    /// All rows, optionally sorted. `sort` is a field name, `-`-prefixed
    /// for descending; comparison is on the raw field value.
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Value>, DataError>;

    /// One row by id, `None` when missing. Never errors for not-found.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, DataError>;

    /// Strict-equality filters, ANDed; `limit` truncates after filtering.
    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Map<String, Value>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataError>;

    async fn create(&self, kind: EntityKind, input: Value) -> Result<Value, DataError>;

    /// Partial merge by id. A missing write path is a named error, never a
    /// silent no-op.
    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value, DataError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<DeleteResult, DataError>;

    async fn bulk_create(
        &self,
        kind: EntityKind,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, DataError>;
}

/// A parsed sort spec: field name plus direction.
#[derive(Clone, Copy, Debug)]
pub struct SortSpec<'a> {
    pub field: &'a str,
    pub descending: bool,
}

impl<'a> SortSpec<'a> {
    pub fn parse(spec: &'a str) -> SortSpec<'a> {
        match spec.strip_prefix('-') {
            Some(field) => SortSpec { field, descending: true },
            None => SortSpec { field: spec, descending: false },
        }
    }
}

/// Raw-value ordering: null < bool < number < string < everything else.
/// No locale-aware collation.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Stable in-place sort by a sort spec.
pub fn apply_sort(rows: &mut [Value], spec: Option<&str>) {
    let Some(spec) = spec else { return };
    let spec = SortSpec::parse(spec);
    rows.sort_by(|a, b| {
        let av = a.get(spec.field).unwrap_or(&Value::Null);
        let bv = b.get(spec.field).unwrap_or(&Value::Null);
        let ord = compare_values(av, bv);
        if spec.descending { ord.reverse() } else { ord }
    });
}

/// Strict equality per key, ANDed.
pub fn matches_predicate(row: &Value, predicate: &Map<String, Value>) -> bool {
    predicate
        .iter()
        .all(|(k, v)| row.get(k).map(|rv| rv == v).unwrap_or(v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_spec_parses_descending_prefix() {
        let s = SortSpec::parse("-createdAt");
        assert_eq!(s.field, "createdAt");
        assert!(s.descending);
        let s = SortSpec::parse("nombre");
        assert!(!s.descending);
    }

    #[test]
    fn apply_sort_orders_raw_values() {
        let mut rows = vec![json!({"n": 3}), json!({"n": 1}), json!({"n": 2})];
        apply_sort(&mut rows, Some("n"));
        assert_eq!(rows[0]["n"], 1);
        apply_sort(&mut rows, Some("-n"));
        assert_eq!(rows[0]["n"], 3);
    }

    #[test]
    fn missing_sort_field_behaves_as_null() {
        let mut rows = vec![json!({"n": 1}), json!({})];
        apply_sort(&mut rows, Some("n"));
        assert!(rows[0].get("n").is_none());
    }

    #[test]
    fn predicate_is_strict_equality_anded() {
        let row = json!({"a": 1, "b": "x"});
        let mut p = Map::new();
        p.insert("a".into(), json!(1));
        p.insert("b".into(), json!("x"));
        assert!(matches_predicate(&row, &p));
        p.insert("b".into(), json!("y"));
        assert!(!matches_predicate(&row, &p));
    }

    #[test]
    fn unknown_predicate_key_excludes_every_row() {
        let row = json!({"a": 1});
        let mut p = Map::new();
        p.insert("noSuchField".into(), json!("x"));
        assert!(!matches_predicate(&row, &p));
        // A null value under a missing key reads as "field is null".
        p.insert("noSuchField".into(), Value::Null);
        assert!(matches_predicate(&row, &p));
    }
}
