use std::{fmt, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use serde_json::Error as JsonError;

#[cfg(feature = "service")]
use sqlx::Error as SqlxError;

/// Crate-wide error type.
///
/// Contradictions are deliberately absent: a contradiction is a simulation
/// outcome (see [`crate::beliefsystem::ContradictionRecord`]), never an error.
/// Violations of the engine invariants are programming errors and panic
/// rather than surfacing here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum FabricError {
    /// Malformed IR, a non-ground input statement, an unknown effect
    /// operation, or any other rejected input. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    /// The persistence adapter failed. The in-memory simulation result is
    /// still valid and the write may be retried against a healthy adapter.
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
}

impl From<JsonError> for FabricError {
    fn from(src: JsonError) -> FabricError {
        FabricError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<toml::de::Error> for FabricError {
    fn from(src: toml::de::Error) -> FabricError {
        FabricError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<uuid::Error> for FabricError {
    fn from(src: uuid::Error) -> FabricError {
        FabricError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for FabricError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => FabricError::NotFound(format!("{x}")),
            _ => FabricError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for FabricError {
    fn from(x: fmt::Error) -> Self {
        FabricError::Serialization(format!("{x}"))
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for FabricError {
    fn from(db_error: SqlxError) -> Self {
        FabricError::Persistence(format!("database error: {db_error:?}"))
    }
}
