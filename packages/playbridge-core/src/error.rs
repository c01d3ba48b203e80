//! Centralized error types for the playbridge core library.
//!
//! This module provides a unified error handling system that:
//! - Defines the caller-facing failure taxonomy using `thiserror`
//! - Gives each failure a stable machine-readable code for RPC frontends
//! - Converts SDK-level and storage-level failures into that taxonomy

use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Failure reported by an engine SDK call.
///
/// SDK generations report failures as raw status codes; adapters wrap them
/// here together with the name of the call that failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{call} failed with status {status}")]
pub struct EngineError {
    /// Name of the SDK call, for logs.
    pub call: &'static str,
    /// Raw status code returned by the engine.
    pub status: i32,
}

impl EngineError {
    /// Creates a new engine error for the given call and status code.
    #[must_use]
    pub fn new(call: &'static str, status: i32) -> Self {
        Self { call, status }
    }
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        "engine_call_failed"
    }
}

/// Convenient Result alias for raw SDK calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Application-wide error type for the playbridge core.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// Unknown or out-of-range identifier supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced entity does not exist (or no longer exists).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The underlying engine returned a failure code.
    #[error("Engine call failed: {0}")]
    EngineCallFailed(String),

    /// Reading or writing the playlist store failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A bounded engine call exceeded its allowance.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid configuration supplied at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::EngineCallFailed(_) => "engine_call_failed",
            Self::Persistence(_) => "persistence_error",
            Self::Timeout(_) => "timeout",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Shorthand for an unknown-identifier failure.
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    /// Shorthand for a missing-entity failure.
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        BridgeError::code(self)
    }
}

/// Convenient Result alias for caller-facing operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<EngineError> for BridgeError {
    fn from(err: EngineError) -> Self {
        Self::EngineCallFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
