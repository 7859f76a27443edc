//! Remote-mode implementation of the CRUD contract over PostgreSQL.

use crate::case::{row_to_caller, to_snake_case, value_keys_to_snake_case_recursive};
use crate::config::Settings;
use crate::contract::{DataClient, DeleteResult, SortSpec};
use crate::entity::EntityKind;
use crate::error::{DataError, RLS_DENIED};
use crate::events::AuthEvents;
use crate::plan::{enforce_exclusive_on_create, enforce_exclusive_on_update};
use crate::profile::{normalize_role, sanitize_teacher_ref, validate_teacher_ref};
use crate::remote::guard::guard;
use crate::remote::plans::{resolve_plan, resolve_plans, PlanProvider};
use crate::remote::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;

pub struct RemoteClient {
    pool: PgPool,
    schema: String,
    events: AuthEvents,
}

impl RemoteClient {
    pub fn new(pool: PgPool, schema: String, events: AuthEvents) -> RemoteClient {
        RemoteClient { pool, schema, events }
    }

    pub async fn connect(settings: &Settings, events: AuthEvents) -> Result<RemoteClient, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await
            .map_err(DataError::from_db)?;
        Ok(RemoteClient::new(pool, settings.schema.clone(), events))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Value>, DataError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(DataError::from_db)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, DataError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(DataError::from_db)?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// Caller-convention input -> snake_case storage body.
    fn body_to_storage(input: Value) -> Result<Map<String, Value>, DataError> {
        let mut input = input;
        value_keys_to_snake_case_recursive(&mut input);
        match input {
            Value::Object(m) => Ok(m),
            _ => Err(DataError::Validation("body must be a JSON object".into())),
        }
    }

    /// Write-path normalization shared by create and bulk_create.
    fn prepare_create(kind: EntityKind, body: &mut Map<String, Value>) -> Result<(), DataError> {
        match kind {
            EntityKind::Users => {
                normalize_role(body);
                sanitize_teacher_ref(body);
            }
            EntityKind::Assignments => {
                if let Some(teacher) = body.get("teacher_id").and_then(Value::as_str) {
                    validate_teacher_ref(teacher)?;
                }
                enforce_exclusive_on_create(body);
            }
            _ => {}
        }
        Ok(())
    }

    /// Allow-list gating for updates: out-of-list fields are dropped with a
    /// warning; a change-set that ends up empty is an error naming them.
    fn gate_update(kind: EntityKind, body: Map<String, Value>) -> Result<Map<String, Value>, DataError> {
        let desc = kind.descriptor();
        let mut allowed = Map::new();
        let mut rejected = Vec::new();
        for (k, v) in body {
            if desc.is_updatable(&k) {
                allowed.insert(k, v);
            } else {
                rejected.push(k);
            }
        }
        if !rejected.is_empty() {
            tracing::warn!(
                entity = kind.name(),
                fields = ?rejected,
                "dropping non-updatable fields from update payload"
            );
        }
        if allowed.is_empty() {
            if rejected.is_empty() {
                return Err(DataError::Validation(format!(
                    "update payload for {} is empty",
                    kind.name()
                )));
            }
            return Err(DataError::Validation(format!(
                "update payload for {} has no updatable fields (rejected: {})",
                kind.name(),
                rejected.join(", ")
            )));
        }
        Ok(allowed)
    }

    fn prepare_update(kind: EntityKind, body: &mut Map<String, Value>) -> Result<(), DataError> {
        match kind {
            EntityKind::Users => {
                if body.contains_key("role") {
                    normalize_role(body);
                }
                sanitize_teacher_ref(body);
            }
            EntityKind::Assignments => {
                if let Some(teacher) = body.get("teacher_id").and_then(Value::as_str) {
                    validate_teacher_ref(teacher)?;
                }
                enforce_exclusive_on_update(body);
            }
            _ => {}
        }
        Ok(())
    }

    /// Sort spec from the caller convention ("-createdAt") to column names.
    fn sort_to_storage(sort: Option<&str>) -> Option<String> {
        sort.map(|s| {
            let spec = SortSpec::parse(s);
            let field = to_snake_case(spec.field);
            if spec.descending {
                format!("-{}", field)
            } else {
                field
            }
        })
    }

    async fn resolve_assignment_plans(&self, rows: &mut [Value]) -> Result<(), DataError> {
        resolve_plans(rows, self).await
    }
}

#[async_trait]
impl PlanProvider for RemoteClient {
    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<Value>, DataError> {
        let desc = EntityKind::Plans.descriptor();
        let values: Vec<Value> = ids.iter().map(|id| Value::String(id.clone())).collect();
        let q = sql::select_by_column_in(desc, &self.schema, "id", &values);
        self.fetch_all(&q).await
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<Value>, DataError> {
        let desc = EntityKind::Plans.descriptor();
        let mut q = sql::select_by_id(desc, &self.schema);
        q.params.push(Value::String(id.to_string()));
        self.fetch_optional(&q).await
    }
}

#[async_trait]
impl DataClient for RemoteClient {
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Value>, DataError> {
        guard(&self.events, "list", async {
            let desc = kind.descriptor();
            let sort = Self::sort_to_storage(sort);
            let q = sql::select_list(desc, &self.schema, &[], sort.as_deref(), None);
            let mut rows = self.fetch_all(&q).await?;
            if kind == EntityKind::Assignments {
                self.resolve_assignment_plans(&mut rows).await?;
            }
            for row in &mut rows {
                row_to_caller(row);
            }
            Ok(rows)
        })
        .await
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, DataError> {
        guard(&self.events, "get", async {
            let desc = kind.descriptor();
            let mut q = sql::select_by_id(desc, &self.schema);
            q.params.push(Value::String(id.to_string()));
            let row = match self.fetch_optional(&q).await {
                Ok(row) => row,
                // Row-level security surfaces as permission denied for
                // rows the session may not see; a user lookup treats that
                // as absent rather than an error.
                Err(err)
                    if kind == EntityKind::Users
                        && err.db_code().as_deref() == Some(RLS_DENIED) =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            let Some(mut row) = row else { return Ok(None) };
            if kind == EntityKind::Assignments {
                resolve_plan(&mut row, &HashMap::new(), self).await?;
            }
            row_to_caller(&mut row);
            Ok(Some(row))
        })
        .await
    }

    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Map<String, Value>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataError> {
        guard(&self.events, "filter", async {
            let desc = kind.descriptor();
            let filters: Vec<(String, Value)> = predicate
                .iter()
                .map(|(k, v)| (to_snake_case(k), v.clone()))
                .collect();
            let q = sql::select_list(desc, &self.schema, &filters, None, limit);
            let mut rows = self.fetch_all(&q).await?;
            if kind == EntityKind::Assignments {
                self.resolve_assignment_plans(&mut rows).await?;
            }
            for row in &mut rows {
                row_to_caller(row);
            }
            Ok(rows)
        })
        .await
    }

    async fn create(&self, kind: EntityKind, input: Value) -> Result<Value, DataError> {
        guard(&self.events, "create", async {
            let desc = kind.descriptor();
            let mut body = Self::body_to_storage(input)?;
            Self::prepare_create(kind, &mut body)?;
            let body: HashMap<String, Value> = body.into_iter().collect();
            let q = sql::insert(desc, &self.schema, &body);
            let mut row = self
                .fetch_optional(&q)
                .await?
                .ok_or_else(|| DataError::Db(sqlx::Error::RowNotFound))?;
            row_to_caller(&mut row);
            Ok(row)
        })
        .await
    }

    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value, DataError> {
        guard(&self.events, "update", async {
            let desc = kind.descriptor();
            let body = Self::body_to_storage(partial)?;
            let mut body = Self::gate_update(kind, body)?;
            Self::prepare_update(kind, &mut body)?;
            let body: HashMap<String, Value> = body.into_iter().collect();
            let q = sql::update(desc, &self.schema, &Value::String(id.to_string()), &body);
            let mut row = self
                .fetch_optional(&q)
                .await?
                .ok_or_else(|| DataError::NotFound(id.to_string()))?;
            row_to_caller(&mut row);
            Ok(row)
        })
        .await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<DeleteResult, DataError> {
        guard(&self.events, "delete", async {
            let desc = kind.descriptor();
            let mut q = sql::delete(desc, &self.schema);
            q.params.push(Value::String(id.to_string()));
            let row = self.fetch_optional(&q).await?;
            Ok(DeleteResult { success: row.is_some() })
        })
        .await
    }

    async fn bulk_create(
        &self,
        kind: EntityKind,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, DataError> {
        guard(&self.events, "bulk_create", async {
            let desc = kind.descriptor();
            let mut out = Vec::with_capacity(items.len());
            let mut tx = self.pool.begin().await.map_err(DataError::from_db)?;
            for item in items {
                let mut body = Self::body_to_storage(item)?;
                Self::prepare_create(kind, &mut body)?;
                let body: HashMap<String, Value> = body.into_iter().collect();
                let q = sql::insert(desc, &self.schema, &body);
                tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = query.bind(PgBindValue::from_json(p));
                }
                let row = query
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DataError::from_db)?;
                let row = row.ok_or_else(|| DataError::Db(sqlx::Error::RowNotFound))?;
                let mut row = row_to_json(&row);
                row_to_caller(&mut row);
                out.push(row);
            }
            tx.commit().await.map_err(DataError::from_db)?;
            Ok(out)
        })
        .await
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(v) = row.try_get::<Option<i16>, _>(name) {
        if let Some(n) = v {
            return Value::Number(n.into());
        }
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
        if let Some(n) = v {
            return Value::Number(n.into());
        }
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        if let Some(n) = v {
            return Value::Number(n.into());
        }
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = v {
            if let Some(n) = serde_json::Number::from_f64(n) {
                return Value::Number(n);
            }
        }
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
        if let Some(b) = v {
            return Value::Bool(b);
        }
    }
    if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        if let Some(u) = v {
            return Value::String(u.to_string());
        }
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        if let Some(d) = v {
            return Value::String(d.to_rfc3339());
        }
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        if let Some(s) = v {
            return Value::String(s);
        }
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(name) {
        if let Some(j) = v {
            return j;
        }
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage_body(v: Value) -> Map<String, Value> {
        RemoteClient::body_to_storage(v).unwrap()
    }

    #[test]
    fn input_keys_are_converted_to_columns() {
        let body = storage_body(json!({ "planId": "t1", "planAdaptado": null }));
        assert!(body.contains_key("plan_id"));
        assert!(body.contains_key("plan_adaptado"));
    }

    #[test]
    fn create_preparation_enforces_plan_exclusivity() {
        let mut body = storage_body(json!({ "planId": "t1", "planAdaptado": {"x": 1} }));
        RemoteClient::prepare_create(EntityKind::Assignments, &mut body).unwrap();
        assert_eq!(body["plan_id"], "t1");
        assert_eq!(body["plan_adaptado"], Value::Null);
    }

    #[test]
    fn update_gating_drops_unknown_fields_but_keeps_allowed() {
        let body = storage_body(json!({ "planAdaptado": {"x": 1}, "studentId": "s9", "createdAt": "now" }));
        let gated = RemoteClient::gate_update(EntityKind::Assignments, body).unwrap();
        assert!(gated.contains_key("plan_adaptado"));
        assert!(!gated.contains_key("student_id"));
        assert!(!gated.contains_key("created_at"));
    }

    #[test]
    fn update_with_only_disallowed_fields_names_them() {
        let body = storage_body(json!({ "studentId": "s9", "createdAt": "now" }));
        let err = RemoteClient::gate_update(EntityKind::Assignments, body).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("student_id"));
        assert!(msg.contains("created_at"));
    }

    #[test]
    fn snapshot_update_nulls_reference_after_preparation() {
        let body = storage_body(json!({ "planAdaptado": {"x": 1} }));
        let mut body = RemoteClient::gate_update(EntityKind::Assignments, body).unwrap();
        RemoteClient::prepare_update(EntityKind::Assignments, &mut body).unwrap();
        assert_eq!(body["plan_id"], Value::Null);
    }

    #[test]
    fn assignment_teacher_ref_must_be_uuid() {
        let mut body = storage_body(json!({ "teacherId": "legacy:7", "planId": "t1" }));
        let err = RemoteClient::prepare_create(EntityKind::Assignments, &mut body).unwrap_err();
        assert!(err.to_string().contains("legacy:7"));
    }

    #[test]
    fn user_create_defaults_role_and_clears_bad_teacher_ref() {
        let mut body = storage_body(json!({ "email": "a@b.c", "teacherId": "old-id" }));
        RemoteClient::prepare_create(EntityKind::Users, &mut body).unwrap();
        assert_eq!(body["role"], "STUDENT");
        assert_eq!(body["teacher_id"], Value::Null);
    }

    #[test]
    fn user_update_without_role_key_leaves_role_alone() {
        let body = storage_body(json!({ "displayName": "Ana" }));
        let mut body = RemoteClient::gate_update(EntityKind::Users, body).unwrap();
        RemoteClient::prepare_update(EntityKind::Users, &mut body).unwrap();
        assert!(!body.contains_key("role"));
    }

    #[test]
    fn caller_sort_spec_maps_to_columns() {
        assert_eq!(
            RemoteClient::sort_to_storage(Some("-createdAt")).as_deref(),
            Some("-created_at")
        );
        assert_eq!(RemoteClient::sort_to_storage(None), None);
    }
}
