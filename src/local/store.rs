//! The injected mirror store: per-entity row arrays, an explicit
//! loading -> ready transition, and per-entity persistence callbacks.

use crate::entity::EntityKind;
use crate::error::DataError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Bounded readiness wait: the historical client polled the loading flag
/// up to 40 times at 50 ms. The watch channel replaces the busy-poll, the
/// ceiling stays the same so reads racing the provider return within ~2 s.
const READY_ATTEMPTS: u64 = 40;
const READY_INTERVAL_MS: u64 = 50;

pub fn ready_wait_ceiling() -> Duration {
    Duration::from_millis(READY_ATTEMPTS * READY_INTERVAL_MS)
}

/// Entity-specific persistence callbacks. The mirror is not the source of
/// truth; every local-mode mutation goes through one of these first and is
/// mirrored only on success.
#[async_trait]
pub trait WriteHandler: Send + Sync {
    async fn create(&self, input: Value) -> Result<Value, DataError>;
    async fn update(&self, id: &str, partial: Value) -> Result<Value, DataError>;
    async fn delete(&self, id: &str) -> Result<(), DataError>;
}

/// Explicit store object handed to the local client. Rows are kept in the
/// caller convention, exactly as the provider injects them.
pub struct LocalStore {
    data: RwLock<HashMap<EntityKind, Vec<Value>>>,
    handlers: RwLock<HashMap<EntityKind, Arc<dyn WriteHandler>>>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl LocalStore {
    pub fn new() -> LocalStore {
        let (ready_tx, ready_rx) = watch::channel(false);
        LocalStore {
            data: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            ready_tx,
            ready_rx,
        }
    }

    /// Replace the mirror rows for one entity.
    pub fn set_data(&self, kind: EntityKind, rows: Vec<Value>) {
        self.data.write().unwrap().insert(kind, rows);
    }

    /// Signal that the provider's initial load has resolved.
    pub fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Await readiness up to the bounded ceiling; returns whether the store
    /// became ready. Callers proceed with whatever data is present either
    /// way, so an early render never deadlocks.
    pub async fn wait_ready(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        let mut rx = self.ready_rx.clone();
        let waited = tokio::time::timeout(ready_wait_ceiling(), async {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    return false;
                }
            }
            true
        })
        .await;
        match waited {
            Ok(became_ready) => became_ready,
            Err(_) => {
                tracing::warn!("local store not ready after bounded wait; serving current mirror");
                false
            }
        }
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<Value> {
        self.data
            .read()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn register_handler(&self, kind: EntityKind, handler: Arc<dyn WriteHandler>) {
        self.handlers.write().unwrap().insert(kind, handler);
    }

    pub fn handler(&self, kind: EntityKind) -> Option<Arc<dyn WriteHandler>> {
        self.handlers.read().unwrap().get(&kind).cloned()
    }

    pub fn mirror_create(&self, kind: EntityKind, row: Value) {
        self.data.write().unwrap().entry(kind).or_default().push(row);
    }

    /// Index-replace by id. A row the mirror never saw is left alone.
    pub fn mirror_update(&self, kind: EntityKind, id: &str, row: Value) {
        let mut data = self.data.write().unwrap();
        let rows = data.entry(kind).or_default();
        if let Some(slot) = rows.iter_mut().find(|r| row_id(r) == Some(id)) {
            *slot = row;
        }
    }

    pub fn mirror_delete(&self, kind: EntityKind, id: &str) {
        let mut data = self.data.write().unwrap();
        let rows = data.entry(kind).or_default();
        rows.retain(|r| row_id(r) != Some(id));
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        LocalStore::new()
    }
}

pub(crate) fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}
