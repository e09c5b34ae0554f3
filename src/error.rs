use thiserror::Error;

use crate::db::DatabaseError;

/// Service-level error taxonomy.
///
/// Callers map these onto their transport's status codes; the engine
/// never formats transport responses itself.
#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("dose log {id} is already {status}")]
    InvalidState { id: String, status: String },

    #[error("snooze limit reached ({max} allowed)")]
    SnoozeLimitExceeded { max: i64 },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ReminderError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for ReminderError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
