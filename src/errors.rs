//! Error types for the timecaps application.
//!
//! This module defines custom error types that categorize different failures
//! that can occur during capsule management operations.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::capsule::CapsuleId;

/// The main error type for the timecaps application.
#[derive(Error, Debug)]
pub enum CapsuleError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors related to HTTP requests against the remote capsule service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A create submission was rejected before any mutation happened.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Capsule was not found when performing an operation.
    #[error("Capsule not found: {id}")]
    CapsuleNotFound { id: CapsuleId },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// The remote capsule service answered with an unexpected status.
    #[error("Capsule service returned {status} for {url}")]
    ServiceStatus { status: u16, url: String },

    #[error("{message}")]
    EditorError { message: String },
}
