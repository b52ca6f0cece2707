//! Error and retry-policy types for the Sprocket analysis domain.
//!
//! The taxonomy mirrors how each failure is handled operationally:
//!
//! - [`ParseError`]: malformed workflow text; recorded as a degraded
//!   analysis, never fatal to the process.
//! - [`FetchError`]: source-control read failures; `NotFound` resolves the
//!   event without a write, transient faults are retried.
//! - [`StoreError`] / [`DispatchError`]: infrastructure faults on the
//!   durable store and the queue transport; retried with backoff and routed
//!   to the dead-letter path after the attempt ceiling.
//! - [`ConfigurationError`]: invalid startup configuration; fatal, the
//!   process refuses to start.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that
//! participates in retry decisions must be able to produce one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the processor decide whether
/// to re-invoke an operation without escalating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means the caller
        /// applies its own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; the event escalates to the
    /// dead-letter path.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A location within a workflow document, when the parser can report one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// The workflow document could not be parsed into a structural model.
///
/// Never fatal: the processor records a degraded analysis carrying the
/// reason and continues with the next event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// Human-readable description of what was malformed.
    pub reason: String,
    /// Where in the document the problem was detected, if known.
    pub location: Option<SourceLocation>,
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(loc) => write!(f, "invalid workflow document: {} ({loc})", self.reason),
            None => write!(f, "invalid workflow document: {}", self.reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch boundary
// ---------------------------------------------------------------------------

/// Failure fetching workflow file content from the source-control read API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The file does not exist at the requested ref: deleted or renamed
    /// between notification and fetch. Not fatal; the event resolves without
    /// a stored analysis.
    #[error("workflow file not found at the requested ref")]
    NotFound,

    /// Network fault, timeout, rate limit, or server-side error. Retried
    /// with bounded exponential backoff.
    #[error("transient fetch failure: {message}")]
    Transient {
        /// Description of the underlying fault.
        message: String,
        /// Minimum delay requested by the server, when it supplied one.
        retry_after: Option<Duration>,
    },

    /// A response that will not improve on retry (bad credentials, malformed
    /// response body, unexpected status).
    #[error("permanent fetch failure (status {status:?}): {message}")]
    Permanent {
        /// HTTP status code, when the failure carried one.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },
}

impl FetchError {
    /// Retry decision for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            FetchError::Transient { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            FetchError::NotFound | FetchError::Permanent { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Store boundary
// ---------------------------------------------------------------------------

/// Failure reading or writing the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection fault or timeout. Retried with bounded exponential backoff.
    #[error("transient store failure: {message}")]
    Transient {
        /// Description of the underlying fault.
        message: String,
    },

    /// Corrupt row, schema mismatch, or serialization failure. Not retried.
    #[error("store failure: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Retry decision for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            StoreError::Transient { .. } => RetryPolicy::Retryable { after: None },
            StoreError::Internal { .. } => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch boundary
// ---------------------------------------------------------------------------

/// Failure publishing a change event onto the queue transport.
///
/// Publishing is retried by the caller with bounded exponential backoff;
/// after exhaustion the failure is surfaced, never silently dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport fault; safe to retry.
    #[error("transient dispatch failure: {message}")]
    Transient {
        /// Description of the underlying fault.
        message: String,
    },

    /// The transport has shut down and will not accept further events.
    #[error("dispatch transport is closed")]
    Closed,
}

impl DispatchError {
    /// Retry decision for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            DispatchError::Transient { .. } => RetryPolicy::Retryable { after: None },
            DispatchError::Closed => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Startup configuration
// ---------------------------------------------------------------------------

/// The process configuration is incomplete or invalid.
///
/// Produced at startup only; the pipeline never starts with an invalid
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required value (credential, endpoint) was not provided.
    #[error("missing required configuration value '{name}'")]
    Missing {
        /// The configuration key that was absent.
        name: String,
    },

    /// A provided value could not be interpreted.
    #[error("invalid configuration value '{name}': {reason}")]
    Invalid {
        /// The configuration key with the bad value.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}
