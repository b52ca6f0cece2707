//! Sprocket orchestration layer.
//!
//! [`Processor`] drives one change event through the analysis pipeline:
//! fetch the workflow bytes, gatekeep on the content fingerprint, parse,
//! extract and classify dependencies, assemble the analysis, and write it
//! through the store port. [`retry::retry_with_backoff`] wraps the two
//! blocking boundaries (fetch and write) in the bounded exponential backoff
//! schedule configured by [`retry::RetryConfig`].
//!
//! ## Architectural Layer
//!
//! **Orchestration.** This crate sequences calls between the domain crate
//! and the injected port implementations; it contains neither domain rules
//! nor transport/storage details.

pub mod processor;
pub mod retry;

pub use processor::{ProcessError, ProcessOutcome, Processor};
pub use retry::RetryConfig;
