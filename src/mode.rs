//! Mode selection (local mirror vs. hosted PostgreSQL) and the per-mode
//! client cache.

use crate::config::Settings;
use crate::contract::DataClient;
use crate::error::DataError;
use crate::events::AuthEvents;
use crate::local::{LocalClient, LocalStore};
use crate::remote::RemoteClient;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which backend serves requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataMode {
    Local,
    Remote,
}

impl DataMode {
    pub fn parse(s: &str) -> Option<DataMode> {
        match s.to_lowercase().as_str() {
            "local" => Some(DataMode::Local),
            "remote" => Some(DataMode::Remote),
            _ => None,
        }
    }
}

/// Source of persisted session-storage keys. The default implementation
/// lists the session directory; tests inject fixtures.
pub trait SessionKeys: Send + Sync {
    fn keys(&self) -> Vec<String>;
}

/// Backend token keys look like `sb-<project>-auth-token`.
fn is_auth_token_key(key: &str) -> bool {
    key.starts_with("sb-") && key.ends_with("-auth-token")
}

/// Session keys persisted as files in a directory maintained by the
/// session layer (one file per key).
pub struct FsSessionKeys {
    dir: Option<String>,
}

impl FsSessionKeys {
    pub fn new(dir: Option<String>) -> FsSessionKeys {
        FsSessionKeys { dir }
    }
}

impl SessionKeys for FsSessionKeys {
    fn keys(&self) -> Vec<String> {
        let Some(dir) = &self.dir else { return Vec::new() };
        let Ok(entries) = std::fs::read_dir(Path::new(dir)) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }
}

/// Resolve the active mode. Pure in its inputs: the override flag wins,
/// then the configured mode, then a persisted auth token implies remote.
pub fn resolve_mode(
    force_local: bool,
    configured: Option<DataMode>,
    session: &dyn SessionKeys,
) -> DataMode {
    if force_local {
        return DataMode::Local;
    }
    if let Some(mode) = configured {
        return mode;
    }
    if session.keys().iter().any(|k| is_auth_token_key(k)) {
        DataMode::Remote
    } else {
        DataMode::Local
    }
}

/// Constructs and caches one client per mode. The remote client holds its
/// own sub-caches and a connection pool, so it is built once and reused;
/// a mode change (login/logout) just selects the other slot, lazily
/// constructing it on first use.
pub struct ClientFactory {
    settings: Settings,
    store: Arc<LocalStore>,
    events: AuthEvents,
    cache: Mutex<HashMap<DataMode, Arc<dyn DataClient>>>,
}

impl ClientFactory {
    pub fn new(settings: Settings, store: Arc<LocalStore>, events: AuthEvents) -> ClientFactory {
        ClientFactory {
            settings,
            store,
            events,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Factory on environment settings, a fresh mirror store, and the
    /// process-wide auth channel.
    pub fn from_env() -> Result<ClientFactory, DataError> {
        let settings = Settings::from_env()?;
        Ok(ClientFactory::new(
            settings,
            Arc::new(LocalStore::new()),
            AuthEvents::global(),
        ))
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Session keys from the configured session directory.
    pub fn session_keys(&self) -> FsSessionKeys {
        FsSessionKeys::new(self.settings.session_dir.clone())
    }

    /// Subscribe to auth failures emitted by the remote client.
    pub fn auth_events(&self) -> &AuthEvents {
        &self.events
    }

    /// Resolve the mode from settings and the persisted session state.
    pub fn resolve(&self, session: &dyn SessionKeys) -> DataMode {
        resolve_mode(self.settings.force_local, self.settings.mode, session)
    }

    /// The client for a mode, constructed on first use and cached.
    pub async fn client(&self, mode: DataMode) -> Result<Arc<dyn DataClient>, DataError> {
        let mut cache = self.cache.lock().await;
        if let Some(client) = cache.get(&mode) {
            return Ok(client.clone());
        }
        let client: Arc<dyn DataClient> = match mode {
            DataMode::Local => Arc::new(LocalClient::new(self.store.clone())),
            DataMode::Remote => {
                Arc::new(RemoteClient::connect(&self.settings, self.events.clone()).await?)
            }
        };
        cache.insert(mode, client.clone());
        Ok(client)
    }

    /// Drop cached clients (e.g. when credentials change under the pool).
    pub async fn invalidate(&self) {
        self.cache.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedKeys(Vec<String>);

    impl SessionKeys for FixedKeys {
        fn keys(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn override_flag_wins_over_everything() {
        let keys = FixedKeys(vec!["sb-abc-auth-token".into()]);
        assert_eq!(resolve_mode(true, Some(DataMode::Remote), &keys), DataMode::Local);
    }

    #[test]
    fn configured_mode_wins_over_session_detection() {
        let keys = FixedKeys(vec!["sb-abc-auth-token".into()]);
        assert_eq!(resolve_mode(false, Some(DataMode::Local), &keys), DataMode::Local);
    }

    #[test]
    fn session_token_presence_implies_remote() {
        let keys = FixedKeys(vec!["sb-proj-auth-token".into(), "theme".into()]);
        assert_eq!(resolve_mode(false, None, &keys), DataMode::Remote);
    }

    #[test]
    fn no_session_token_means_local() {
        let keys = FixedKeys(vec!["theme".into(), "sb-proj-other".into()]);
        assert_eq!(resolve_mode(false, None, &keys), DataMode::Local);
    }
}
