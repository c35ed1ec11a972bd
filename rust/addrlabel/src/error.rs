//! Error types for the annotation pipeline
//!
//! Only conditions a caller must act on are errors. A candidate failing the
//! identifier check is a normal filter outcome (`bool` / `Option`), and
//! per-match annotation skips (ambiguous elided form, region vanished) are
//! counted in `AnnotateReport` instead of propagated.

use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum Error {
    /// Durable key-value storage read or write failed
    #[error("Storage failure during {operation}: {message}")]
    StorageFailure {
        operation: &'static str,
        message: String,
    },

    /// A key handed to the label store is not a valid identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Label fields failed validation (empty name, malformed color, ...)
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Configuration could not be parsed or holds an unsupported value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A document region targeted by a mutation is no longer attached
    #[error("Node detached from document")]
    Detached,

    /// The host DOM rejected an operation
    #[error("DOM operation failed: {0}")]
    Dom(String),
}

impl Error {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Error::StorageFailure {
            operation,
            message: message.into(),
        }
    }

    /// True for failures the scan loop recovers from by retrying later
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::StorageFailure { .. })
    }
}

impl From<Error> for JsValue {
    fn from(e: Error) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
