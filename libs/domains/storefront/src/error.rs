use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StorefrontError {
    /// No usable store or object-storage handle.
    #[error("Backend is not configured: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The product row was written but a later step (reading it back or
    /// inserting its primary image) failed. The row is not rolled back.
    #[error("Product {product_id} was created but the follow-up step failed: {source}")]
    PartialFailure {
        product_id: Uuid,
        #[source]
        source: Box<StorefrontError>,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StorefrontResult<T> = Result<T, StorefrontError>;

impl StorefrontError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorefrontError::Configuration(_))
    }
}

impl From<StoreError> for StorefrontError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => StorefrontError::Configuration(msg),
            StoreError::NoRows => StorefrontError::NotFound("no matching row".to_string()),
            StoreError::Conflict(msg) => StorefrontError::Conflict(msg),
            err @ StoreError::Backend { .. } => StorefrontError::Store(err.to_string()),
            StoreError::Decode(msg) => StorefrontError::Serialization(msg),
        }
    }
}

impl From<serde_json::Error> for StorefrontError {
    fn from(err: serde_json::Error) -> Self {
        StorefrontError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(err: validator::ValidationErrors) -> Self {
        StorefrontError::Validation(err.to_string())
    }
}
