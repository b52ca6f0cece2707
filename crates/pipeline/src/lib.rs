//! Core analysis domain for Sprocket.
//!
//! Sprocket ingests repository change notifications, determines which CI
//! workflow definition files changed, parses those definitions, extracts
//! their external dependency references (reusable actions, runner images,
//! container images), classifies each reference's version-pinning strategy,
//! and emits structured dependency records for durable storage.
//!
//! This crate contains every domain concept, newtype identifier, shared
//! value type, pure computation, and cross-cutting error type used by the
//! pipeline. Infrastructure crates implement the port traits defined here;
//! they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O
//! dependencies. It defines *what* is needed; infrastructure crates define
//! *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`RepositoryId`, `CommitSha`, etc.) |
//! | [`types`] | Events, dependency records, analyses, closed enums |
//! | [`errors`] | Error taxonomy and [`RetryPolicy`] |
//! | [`normalize`] | Raw notifications → canonical change events |
//! | [`model`] | Structural workflow model (jobs, steps, runners, containers) |
//! | [`parser`] | Tolerant YAML → model parsing |
//! | [`classify`] | Version string → pinning classification |
//! | [`extract`] | Model walk → ordered dependency records |
//! | [`fingerprint`] | Deterministic content digests |
//! | [`assemble`] | Records + metadata → one [`WorkflowAnalysis`] |
//! | [`dedup`] | Consumer-side fingerprint gatekeeping |
//! | [`ports`] | Port traits for queue, read API, and durable store |

pub mod assemble;
pub mod classify;
pub mod dedup;
pub mod errors;
pub mod extract;
pub mod fingerprint;
pub mod identifiers;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod ports;
pub mod types;

// Re-export the working set at the crate root for ergonomic usage by
// downstream crates.
pub use errors::{
    ConfigurationError, DispatchError, FetchError, ParseError, RetryPolicy, SourceLocation,
    StoreError,
};
pub use identifiers::{
    CommitSha, DependencyName, Fingerprint, GitRef, GroupKey, RepositoryId, WorkflowPath,
};
pub use ports::{AnalysisStore, DedupStore, EventDispatch, WorkflowFetcher, WriteOutcome};
pub use types::{
    AnalysisMetadata, ChangeEventType, CommitInfo, DedupEntry, DependencyKind, DependencyRecord,
    DependencyReference, PinningStrategy, Repository, WorkflowAnalysis, WorkflowChangeEvent,
    WorkflowRef,
};
