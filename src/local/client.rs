//! Local-mode implementation of the CRUD contract over the mirror store.

use crate::contract::{apply_sort, matches_predicate, DataClient, DeleteResult};
use crate::entity::EntityKind;
use crate::error::DataError;
use crate::local::store::{row_id, LocalStore, WriteHandler};
use crate::profile::derive_display_name;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct LocalClient {
    store: Arc<LocalStore>,
}

impl LocalClient {
    pub fn new(store: Arc<LocalStore>) -> LocalClient {
        LocalClient { store }
    }

    async fn loaded_rows(&self, kind: EntityKind) -> Vec<Value> {
        self.store.wait_ready().await;
        let mut rows = self.store.rows(kind);
        if kind == EntityKind::Users {
            for row in &mut rows {
                fill_display_name(row);
            }
        }
        rows
    }

    fn write_handler(&self, kind: EntityKind) -> Result<Arc<dyn WriteHandler>, DataError> {
        self.store
            .handler(kind)
            .ok_or(DataError::MissingWriteHandler(kind.name()))
    }
}

/// Users without a stored display name get one derived on the way out.
fn fill_display_name(row: &mut Value) {
    let missing = row
        .get("displayName")
        .and_then(Value::as_str)
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);
    if missing {
        let name = derive_display_name(row);
        if let Some(obj) = row.as_object_mut() {
            obj.insert("displayName".into(), Value::String(name));
        }
    }
}

#[async_trait]
impl DataClient for LocalClient {
    async fn list(&self, kind: EntityKind, sort: Option<&str>) -> Result<Vec<Value>, DataError> {
        let mut rows = self.loaded_rows(kind).await;
        apply_sort(&mut rows, sort);
        Ok(rows)
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, DataError> {
        let rows = self.loaded_rows(kind).await;
        Ok(rows.into_iter().find(|r| row_id(r) == Some(id)))
    }

    async fn filter(
        &self,
        kind: EntityKind,
        predicate: &Map<String, Value>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataError> {
        let rows = self.loaded_rows(kind).await;
        let mut out: Vec<Value> = rows
            .into_iter()
            .filter(|r| matches_predicate(r, predicate))
            .collect();
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn create(&self, kind: EntityKind, input: Value) -> Result<Value, DataError> {
        let handler = self.write_handler(kind)?;
        let created = handler.create(input).await?;
        self.store.mirror_create(kind, created.clone());
        Ok(created)
    }

    async fn update(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value, DataError> {
        let handler = self.write_handler(kind)?;
        let updated = handler.update(id, partial).await?;
        self.store.mirror_update(kind, id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<DeleteResult, DataError> {
        let handler = self.write_handler(kind)?;
        handler.delete(id).await?;
        self.store.mirror_delete(kind, id);
        Ok(DeleteResult { success: true })
    }

    async fn bulk_create(
        &self,
        kind: EntityKind,
        items: Vec<Value>,
    ) -> Result<Vec<Value>, DataError> {
        let handler = self.write_handler(kind)?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let created = handler.create(item).await?;
            self.store.mirror_create(kind, created.clone());
            out.push(created);
        }
        Ok(out)
    }
}
