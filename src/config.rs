//! Environment-driven settings for the data layer.

use crate::error::DataError;
use crate::mode::DataMode;

/// Runtime settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Schema holding the entity tables. From `ATRIL_SCHEMA`, default `atril`.
    pub schema: String,
    /// Hard override: serve everything from the local mirror.
    pub force_local: bool,
    /// Explicit mode from `ATRIL_DATA_MODE` ("local" | "remote"), if set.
    pub mode: Option<DataMode>,
    /// Directory where the session layer persists its auth tokens.
    pub session_dir: Option<String>,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Settings, DataError> {
        let _ = dotenvy::dotenv();
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/atril".into());
        let schema = std::env::var("ATRIL_SCHEMA").unwrap_or_else(|_| "atril".into());
        let force_local = std::env::var("ATRIL_FORCE_LOCAL")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let mode = match std::env::var("ATRIL_DATA_MODE") {
            Ok(v) => Some(DataMode::parse(&v).ok_or_else(|| {
                DataError::Config(format!("ATRIL_DATA_MODE must be 'local' or 'remote', got '{}'", v))
            })?),
            Err(_) => None,
        };
        let session_dir = std::env::var("ATRIL_SESSION_DIR").ok();
        let max_connections = std::env::var("ATRIL_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        Ok(Settings {
            database_url,
            schema,
            force_local,
            mode,
            session_dir,
            max_connections,
        })
    }
}
