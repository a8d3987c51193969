//! Unified engine error type used across all phases.

use thiserror::Error;

use crate::store::StoreError;

/// Every failure the engine surfaces to a caller of `execute`.
///
/// One variant per error kind. Each message names the vertex it was raised
/// at where one is known; errors raised during standalone vertex
/// construction carry no vertex name yet.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Graph or vertex shape is wrong: undeclared reference, missing
    /// dependency, unknown operation, cycle, bad sub-graph output.
    #[error("validation error{}: {message}", vertex_suffix(.vertex))]
    Validation {
        vertex: Option<String>,
        message: String,
    },

    /// Phase 1 failed: a marker could not be resolved or an expression
    /// could not be evaluated.
    #[error("resolution error at vertex '{vertex}': {message}")]
    Resolution { vertex: String, message: String },

    /// Phase 2 failed before or inside the operation call: unregistered
    /// operation, parameter pairing failure, operation-reported failure.
    #[error("dispatch error at vertex '{vertex}': {message}")]
    Dispatch { vertex: String, message: String },

    /// Internal consistency violation observed by the executor.
    #[error("contract violation at vertex '{vertex}': {message}")]
    Contract { vertex: String, message: String },

    /// The artifact store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cancellation flag was observed set between vertices.
    #[error("execution cancelled")]
    Cancelled,
}

fn vertex_suffix(vertex: &Option<String>) -> String {
    match vertex {
        Some(v) => format!(" at vertex '{v}'"),
        None => String::new(),
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>, vertex: Option<String>) -> Self {
        EngineError::Validation {
            vertex,
            message: message.into(),
        }
    }

    pub fn resolution(vertex: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Resolution {
            vertex: vertex.into(),
            message: message.into(),
        }
    }

    pub fn dispatch(vertex: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Dispatch {
            vertex: vertex.into(),
            message: message.into(),
        }
    }

    pub fn contract(vertex: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Contract {
            vertex: vertex.into(),
            message: message.into(),
        }
    }
}
