use thiserror::Error;

use cutwise_core::StoreError;

pub mod memory;
pub mod order_history;
pub mod pattern;

pub use memory::{InMemoryOrderHistory, InMemoryPatternStore, RecordingCache};
pub use order_history::SqlOrderHistory;
pub use pattern::SqlPatternStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => {
                if error
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    StoreError::Conflict(error.to_string())
                } else {
                    StoreError::Unavailable(error.to_string())
                }
            }
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}
