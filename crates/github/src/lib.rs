//! Sprocket GitHub infrastructure adapter.
//!
//! Implements the [`pipeline::WorkflowFetcher`] port over the GitHub
//! contents API. All GitHub API details (authentication headers, the
//! base64 content envelope, status-code mapping, rate-limit hints) are
//! handled here; the [`pipeline`] crate never sees them.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.

mod fetcher;

pub use fetcher::GithubFetcher;
