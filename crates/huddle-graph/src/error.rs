//! Typed errors for the friendship graph.

use thiserror::Error;

/// Data-integrity problems found while reading or validating graph records.
///
/// Business-rule rejections are never reported through this type; the engine
/// answers those with `false`.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown relationship status `{0}`")]
    UnknownStatus(String),

    #[error("invalid timestamp `{value}`")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Whether a storage error is a constraint violation (unique, check or
/// foreign key) rather than an infrastructure failure.
pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation()
        }
        _ => false,
    }
}

/// Like [`is_constraint_violation`], for errors already wrapped in `anyhow`.
pub fn is_constraint_violation_any(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .map(is_constraint_violation)
        .unwrap_or(false)
}
