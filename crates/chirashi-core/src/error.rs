//! Error types for extraction operations.
//!
//! This module defines the error taxonomy shared by the provider client and
//! the batch scheduler, and a [`Result`] alias for it.

use thiserror::Error;

/// Error types that can occur while extracting listing data.
///
/// Individual call failures (`Provider`, `MalformedResponse`, `Parse`) are
/// caught at the batch boundary, logged, and dropped from the run sequence;
/// only `AllAttemptsFailed` propagates to the caller as a batch-level error.
///
/// # Examples
///
/// ```rust
/// use chirashi_core::ExtractError;
///
/// fn classify(err: &ExtractError) -> &'static str {
///     match err {
///         ExtractError::Provider(_) => "transport",
///         ExtractError::MalformedResponse(_) => "envelope",
///         ExtractError::Parse(_) => "payload",
///         ExtractError::AllAttemptsFailed { .. } => "batch",
///         _ => "other",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Transport or HTTP failure from the extraction provider.
    ///
    /// Never retried within one call; a later wave may issue a fresh
    /// independent call instead.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// The provider responded but without the expected content envelope
    /// (no choices, empty message content, or an undecodable envelope).
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The embedded structured payload failed to decode as the expected
    /// field→value JSON object.
    #[error("failed to parse extraction payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// Every call in a batch failed; no run sequence exists to reconcile.
    #[error("all {attempted} extraction attempts failed")]
    AllAttemptsFailed {
        /// Number of calls that were attempted.
        attempted: usize,
    },

    /// Caller-supplied input violated a precondition (empty image payload,
    /// empty schema, out-of-bounds batch policy).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error from CLI-side image loading or result persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for [`Result<T, ExtractError>`].
pub type Result<T> = std::result::Result<T, ExtractError>;
