//! Process-wide auth-failure signal. The remote client publishes here
//! before re-throwing so the session layer can force a logout without the
//! data layer knowing about session lifecycle.

use crate::error::DataError;
use std::sync::OnceLock;
use tokio::sync::broadcast;

/// Payload carried by the auth-failure event.
#[derive(Clone, Debug)]
pub struct AuthFailureEvent {
    pub code: String,
    pub message: String,
}

impl AuthFailureEvent {
    pub fn from_error(err: &DataError) -> Option<AuthFailureEvent> {
        match err {
            DataError::AuthFailure { code, message } => Some(AuthFailureEvent {
                code: code.clone(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Cloneable handle to the auth-failure channel. Subscribers created before
/// an emit receive it; there is no replay.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthFailureEvent>,
}

impl AuthEvents {
    pub fn new() -> AuthEvents {
        let (tx, _) = broadcast::channel(16);
        AuthEvents { tx }
    }

    /// The process-wide instance.
    pub fn global() -> AuthEvents {
        static GLOBAL: OnceLock<AuthEvents> = OnceLock::new();
        GLOBAL.get_or_init(AuthEvents::new).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthFailureEvent> {
        self.tx.subscribe()
    }

    /// Publish one event. Lagging or absent subscribers are not an error.
    pub fn emit(&self, event: AuthFailureEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        AuthEvents::new()
    }
}
