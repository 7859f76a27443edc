//! Typed errors and PostgreSQL error-code classification.

use thiserror::Error;

/// SQLSTATE class for authentication/authorization failures.
const AUTH_CLASS: &str = "28";
/// Row-level-security / permission denied.
pub const RLS_DENIED: &str = "42501";

#[derive(Error, Debug)]
pub enum DataError {
    /// Single-row lookup found nothing. Recovered to `None` at the client
    /// boundary; callers never see this variant from `get`.
    #[error("not found: {0}")]
    NotFound(String),
    /// Authentication/authorization failure. Re-thrown after being
    /// broadcast on the auth-failure channel.
    #[error("auth failure ({code}): {message}")]
    AuthFailure { code: String, message: String },
    #[error("validation: {0}")]
    Validation(String),
    /// Backend referential/uniqueness/check failure with a readable message
    /// for the known codes, the raw message otherwise.
    #[error("constraint violation ({code}): {message}")]
    ConstraintViolation { code: String, message: String },
    /// A local-mode mutation was requested for an entity with no injected
    /// persistence function.
    #[error("no write handler registered for entity '{0}'")]
    MissingWriteHandler(&'static str),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("config: {0}")]
    Config(String),
}

impl DataError {
    /// True for errors that must also be published on the auth signal.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DataError::AuthFailure { .. })
    }

    /// Classify a database error by SQLSTATE. Auth-class codes become
    /// `AuthFailure`, known constraint codes become `ConstraintViolation`
    /// with an enriched message, everything else passes through as `Db`.
    pub fn from_db(err: sqlx::Error) -> DataError {
        let classified = err.as_database_error().and_then(|db| {
            db.code()
                .map(|c| (c.to_string(), db.message().to_string()))
        });
        let Some((code, message)) = classified else {
            return DataError::Db(err);
        };
        if code.starts_with(AUTH_CLASS) {
            return DataError::AuthFailure { code, message };
        }
        let enriched = match code.as_str() {
            "23503" => Some("referenced row does not exist"),
            "23505" => Some("a row with the same unique value already exists"),
            "23514" => Some("check constraint rejected the row"),
            _ => None,
        };
        match enriched {
            Some(hint) => DataError::ConstraintViolation {
                code,
                message: format!("{} ({})", hint, message),
            },
            None => DataError::Db(err),
        }
    }

    /// SQLSTATE of the underlying database error, when there is one.
    pub fn db_code(&self) -> Option<String> {
        match self {
            DataError::Db(e) => e
                .as_database_error()
                .and_then(|d| d.code())
                .map(|c| c.to_string()),
            DataError::AuthFailure { code, .. } => Some(code.clone()),
            DataError::ConstraintViolation { code, .. } => Some(code.clone()),
            _ => None,
        }
    }
}
