//! Hybrid plan resolution for assignments: inline snapshot first, then a
//! batched template lookup by reference id, then the legacy inline field.

use crate::error::DataError;
use crate::plan::{PlanSource, PLAN_LEGACY};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Source of plan-template rows (snake_case keys). The SQL layer implements
/// this; tests substitute a counting stub.
#[async_trait]
pub trait PlanProvider: Send + Sync {
    /// All templates whose id is in `ids`, in one query.
    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Value>, DataError>;
    /// One template, `None` when missing.
    async fn fetch_one(&self, id: &str) -> Result<Option<Value>, DataError>;
}

/// Distinct reference ids across rows that need a referenced (not
/// snapshotted) lookup. Bounds the lookup count to one batched query per
/// page regardless of row count.
pub fn collect_reference_ids(rows: &[Value]) -> Vec<String> {
    let mut seen = Vec::new();
    for row in rows {
        if let PlanSource::Reference(id) = PlanSource::from_row(row) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
    }
    seen
}

/// Resolve every row's effective plan in place: one batched fetch for the
/// distinct reference ids, then per-row resolution against the batch with
/// an individual fetch only as fallback. The result lands under the `plan`
/// key; a dangling reference resolves to no plan, never an error.
pub async fn resolve_plans(
    rows: &mut [Value],
    provider: &dyn PlanProvider,
) -> Result<(), DataError> {
    let ids = collect_reference_ids(rows);
    let batch: HashMap<String, Value> = if ids.is_empty() {
        HashMap::new()
    } else {
        provider
            .fetch_many(&ids)
            .await?
            .into_iter()
            .filter_map(|p| {
                let id = p.get("id").and_then(Value::as_str)?.to_string();
                Some((id, p))
            })
            .collect()
    };
    for row in rows {
        resolve_plan(row, &batch, provider).await?;
    }
    Ok(())
}

/// Resolve one row against an already-loaded batch.
pub async fn resolve_plan(
    row: &mut Value,
    batch: &HashMap<String, Value>,
    provider: &dyn PlanProvider,
) -> Result<(), DataError> {
    let resolved = match PlanSource::from_row(row) {
        PlanSource::Snapshot(v) => v,
        PlanSource::Reference(id) => match batch.get(&id) {
            Some(plan) => plan.clone(),
            None => provider.fetch_one(&id).await?.unwrap_or(Value::Null),
        },
        PlanSource::Legacy(v) => v,
        PlanSource::None => Value::Null,
    };
    if let Some(obj) = row.as_object_mut() {
        obj.insert(PLAN_LEGACY.into(), resolved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts queries so the O(1)-per-page property is checkable.
    pub struct CountingProvider {
        pub plans: Vec<Value>,
        pub many_calls: AtomicUsize,
        pub one_calls: AtomicUsize,
    }

    impl CountingProvider {
        pub fn new(plans: Vec<Value>) -> CountingProvider {
            CountingProvider {
                plans,
                many_calls: AtomicUsize::new(0),
                one_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PlanProvider for CountingProvider {
        async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Value>, DataError> {
            self.many_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .plans
                .iter()
                .filter(|p| {
                    p.get("id")
                        .and_then(Value::as_str)
                        .map(|id| ids.contains(&id.to_string()))
                        .unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn fetch_one(&self, id: &str) -> Result<Option<Value>, DataError> {
            self.one_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .plans
                .iter()
                .find(|p| p.get("id").and_then(Value::as_str) == Some(id))
                .cloned())
        }
    }

    fn tpl(id: &str, nombre: &str) -> Value {
        json!({ "id": id, "nombre": nombre, "bloques": [] })
    }

    #[test]
    fn reference_ids_are_distinct_and_skip_snapshots() {
        let rows = vec![
            json!({ "plan_id": "t1" }),
            json!({ "plan_id": "t1" }),
            json!({ "plan_id": "t2", "plan_adaptado": {"x": 1} }),
            json!({ "plan_id": "t3" }),
        ];
        assert_eq!(collect_reference_ids(&rows), vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn many_rows_cost_one_batched_fetch() {
        let provider = CountingProvider::new(vec![tpl("t1", "a"), tpl("t2", "b")]);
        let mut rows: Vec<Value> = (0..50)
            .map(|i| json!({ "id": format!("a{}", i), "plan_id": if i % 2 == 0 { "t1" } else { "t2" } }))
            .collect();
        resolve_plans(&mut rows, &provider).await.unwrap();
        assert_eq!(provider.many_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.one_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rows[0]["plan"]["nombre"], "a");
        assert_eq!(rows[1]["plan"]["nombre"], "b");
    }

    #[tokio::test]
    async fn snapshot_wins_over_reference() {
        let provider = CountingProvider::new(vec![tpl("t1", "template")]);
        let mut rows = vec![json!({ "plan_id": "t1", "plan_adaptado": {"nombre": "mine"} })];
        resolve_plans(&mut rows, &provider).await.unwrap();
        assert_eq!(rows[0]["plan"]["nombre"], "mine");
        assert_eq!(provider.many_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dangling_reference_resolves_to_no_plan() {
        let provider = CountingProvider::new(vec![]);
        let mut rows = vec![json!({ "plan_id": "gone" })];
        resolve_plans(&mut rows, &provider).await.unwrap();
        assert_eq!(rows[0]["plan"], Value::Null);
        // Batch miss fell back to one individual fetch, which also missed.
        assert_eq!(provider.one_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn legacy_inline_plan_is_kept_when_nothing_else_set() {
        let provider = CountingProvider::new(vec![]);
        let mut rows = vec![json!({ "plan": {"nombre": "viejo"} })];
        resolve_plans(&mut rows, &provider).await.unwrap();
        assert_eq!(rows[0]["plan"]["nombre"], "viejo");
    }
}
