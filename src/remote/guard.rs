//! Auth-error interception around every remote call.

use crate::error::DataError;
use crate::events::{AuthEvents, AuthFailureEvent};
use std::future::Future;

/// Run a remote operation; on a detected auth failure, broadcast it once
/// and re-throw. Non-auth errors pass through unmodified.
pub async fn guard<T, F>(events: &AuthEvents, op: &'static str, fut: F) -> Result<T, DataError>
where
    F: Future<Output = Result<T, DataError>>,
{
    match fut.await {
        Err(err) => {
            if let Some(event) = AuthFailureEvent::from_error(&err) {
                tracing::warn!(op, code = %event.code, "auth failure on remote call");
                events.emit(event);
            } else if let DataError::Db(_) = &err {
                // No retry lives in this layer; callers decide.
                tracing::error!(op, error = %err, "remote operation failed");
            }
            Err(err)
        }
        ok => ok,
    }
}
