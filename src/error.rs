//! Error types for the edgequake-convert library.
//!
//! Three distinct types reflect three distinct failure modes:
//!
//! * [`EngineError`] (**fatal**): the call itself is invalid (malformed
//!   format token, conflicting registration, bad configuration) or an
//!   explicit boundary operation hit an I/O error. Returned as
//!   `Err(EngineError)`.
//!
//! * [`IntegrityFailure`]: a file did not pass one of the pre-conversion
//!   checks. Stored inside [`crate::integrity::IntegrityReport`]; never
//!   propagated as `Err`.
//!
//! * [`FailureKind`]: the class of a failed conversion. Stored inside
//!   [`crate::output::ConversionOutcome`] so callers can tell a validation
//!   failure from a missing route or a failing capability.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-convert library.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A format token is empty or contains characters outside `[a-z0-9+_-]`.
    #[error("Invalid format identifier '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    // ── Registry errors ───────────────────────────────────────────────────
    /// A capability for this exact pair was already registered by another origin.
    #[error(
        "Capability {source_format} -> {target} is already registered by '{existing}', \
         refusing registration from '{incoming}'"
    )]
    DuplicateCapability {
        source_format: String,
        target: String,
        existing: String,
        incoming: String,
    },

    // ── Normalization errors ──────────────────────────────────────────────
    /// The file could not be read, backed up or rewritten.
    #[error("Normalization of '{path}' failed: {source}")]
    NormalizationIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The decoded text could not be produced from the detected encoding.
    #[error("Cannot decode '{path}' as {encoding}")]
    Undecodable { path: PathBuf, encoding: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a file failed its pre-conversion check.
///
/// Every variant maps to a stable [`code`](IntegrityFailure::code) so an
/// external layer can translate it into a user-facing explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IntegrityFailure {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("file is empty")]
    Empty,

    #[error("file is {size} bytes, above the {limit}-byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("file is not readable: {detail}")]
    Unreadable { detail: String },

    #[error("invalid {format} structure: {detail}")]
    InvalidStructure { format: String, detail: String },

    #[error("content is corrupted: {detail}")]
    Corrupted { detail: String },

    #[error("unsafe text encoding: {detail}")]
    UnsafeEncoding { detail: String },
}

impl IntegrityFailure {
    /// Machine-distinguishable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityFailure::NotFound { .. } => "not_found",
            IntegrityFailure::Empty => "empty",
            IntegrityFailure::TooLarge { .. } => "too_large",
            IntegrityFailure::Unreadable { .. } => "unreadable",
            IntegrityFailure::InvalidStructure { .. } => "invalid_structure",
            IntegrityFailure::Corrupted { .. } => "corrupted",
            IntegrityFailure::UnsafeEncoding { .. } => "unsafe_encoding",
        }
    }
}

/// Class of a failed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The input did not pass the integrity checker; nothing was converted.
    Validation { code: String },
    /// No direct capability and no path within the hop bound.
    CapabilityMissing,
    /// A capability invocation failed; `step` is 1-indexed.
    StepFailed { step: usize },
    /// The request was never started because the batch was cancelled.
    Cancelled,
}
