//! Sprocket durable storage infrastructure.
//!
//! [`SqliteStore`] is the single persistence adapter: it implements
//! [`pipeline::AnalysisStore`] (analysis records keyed by
//! `(repository, path, commit_sha)` plus the dependency reverse index) and
//! [`pipeline::DedupStore`] (last-seen content fingerprints per workflow
//! file). One store instance is shared across both ports through `Arc`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Schema, SQL, and row mapping live here; the pipeline
//! crate sees only its storage ports.

mod sqlite;

pub use sqlite::SqliteStore;
