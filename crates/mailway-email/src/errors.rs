//! Error types for the delivery adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::Serialization(err.to_string())
    }
}
