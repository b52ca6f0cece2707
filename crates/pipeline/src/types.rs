//! Shared value types for the Sprocket analysis domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! structured values that cross the system's wire boundaries. Serialized field
//! names follow the external JSON schemas exactly (camelCase, lowercase enum
//! tags), so an event round-trips byte-compatible with what the webhook
//! publisher and the durable store exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommitSha, Fingerprint, GitRef, GroupKey, RepositoryId, WorkflowPath};

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// The kind of repository notification that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventType {
    /// A push to a branch.
    Push,
    /// A pull-request update (opened, synchronized, or reopened).
    PullRequest,
}

/// The repository a change event originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Account or organization owning the repository.
    pub owner: String,
    /// Repository name without the owner prefix.
    pub name: String,
    /// `"owner/name"`, the identity used for group keys and storage.
    pub full_name: RepositoryId,
}

/// The workflow file a change event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Path relative to the repository root.
    pub path: WorkflowPath,
    /// Git reference to fetch the file at.
    #[serde(rename = "ref")]
    pub git_ref: GitRef,
}

/// Commit metadata carried alongside a change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Head commit SHA (push) or pull-request head SHA.
    pub sha: CommitSha,
    /// Commit message, or the pull-request title for PR events.
    pub message: String,
    /// Author name or login.
    pub author: String,
}

/// One detected change to one workflow file.
///
/// Created once per matched path by the change normalizer, published through
/// the ordered dispatch port, and consumed exactly once per processing
/// attempt on the other side. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowChangeEvent {
    /// Repository the change occurred in.
    pub repository: Repository,
    /// Workflow file the change touched.
    pub workflow: WorkflowRef,
    /// Commit the change is attributed to.
    pub commit: CommitInfo,
    /// Push or pull-request origin.
    pub event_type: ChangeEventType,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl WorkflowChangeEvent {
    /// The ordering partition key: all events for one workflow file share it,
    /// so the queue transport delivers them strictly in publish order.
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(format!(
            "{}/{}",
            self.repository.full_name, self.workflow.path
        ))
        .expect("group key is never empty: built from validated identifiers")
    }

    /// The transport-level deduplication key, suppressing exact-duplicate
    /// deliveries of the same notification.
    pub fn dedup_key(&self) -> String {
        format!("{}-{}", self.commit.sha, self.timestamp.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Dependency references and records
// ---------------------------------------------------------------------------

/// What kind of external dependency a reference points at.
///
/// Closed set: every match site handles all three variants, so a new kind
/// added here is surfaced by the compiler at each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A reusable action invoked from a step (`uses: owner/repo@ref`).
    Action,
    /// A runner image declared via `runs-on`.
    Runner,
    /// A container image, from a `container` declaration or a `docker://` step.
    Container,
}

impl DependencyKind {
    /// Returns the lowercase wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::Action => "action",
            DependencyKind::Runner => "runner",
            DependencyKind::Container => "container",
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Degree of immutability of a dependency's version reference.
///
/// Derived deterministically from the version string alone: identical
/// versions always classify identically. See [`crate::classify`] for the
/// rules and their significance-ordered application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinningStrategy {
    /// Pinned to an immutable 40-character commit digest.
    Sha,
    /// Pinned to a release-style version tag (`v4`, `v4.1.2`, `1.2.3`).
    Tag,
    /// A mutable reference: a branch name or anything else that is neither a
    /// digest nor a version tag. The conservative fallback classification.
    Branch,
    /// No version reference at all.
    Unpinned,
}

impl PinningStrategy {
    /// Returns the lowercase wire tag for this strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            PinningStrategy::Sha => "sha",
            PinningStrategy::Tag => "tag",
            PinningStrategy::Branch => "branch",
            PinningStrategy::Unpinned => "unpinned",
        }
    }
}

impl std::fmt::Display for PinningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// A single external dependency reference as written in a workflow file.
///
/// `raw_reference` is the verbatim source text (`"actions/checkout@v4"`);
/// `name` and `version` are its parsed components. Every reference is
/// traceable to exactly one declaration site in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReference {
    /// Action, runner, or container.
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    /// Name without the version component.
    pub name: String,
    /// Version component, absent when the reference carries none.
    pub version: Option<String>,
    /// The reference exactly as written in the workflow.
    pub raw_reference: String,
}

/// A [`DependencyReference`] tagged with its pinning classification.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// The underlying reference.
    #[serde(flatten)]
    pub reference: DependencyReference,
    /// Classification of `reference.version`.
    #[serde(rename = "pinningStrategy")]
    pub pinning: PinningStrategy,
}

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Workflow-level metadata extracted alongside the dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// The workflow's display name, when declared.
    pub workflow_name: Option<String>,
    /// Job identifiers in declaration order.
    pub jobs: Vec<String>,
    /// Step count summed across all jobs.
    pub total_steps: usize,
}

impl AnalysisMetadata {
    /// Metadata for a degraded analysis where the document never parsed.
    pub fn empty() -> Self {
        Self {
            workflow_name: None,
            jobs: Vec::new(),
            total_steps: 0,
        }
    }
}

/// The complete analysis of one workflow file at one commit.
///
/// Identity key for storage purposes is
/// `(repository.full_name, workflow.path, commit.sha)`: re-writing the same
/// key with the same content is a no-op, with different content an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAnalysis {
    /// The change event that triggered this analysis.
    pub event: WorkflowChangeEvent,
    /// Dependency records in source document order.
    pub dependencies: Vec<DependencyRecord>,
    /// Workflow-level metadata.
    pub metadata: AnalysisMetadata,
    /// SHA-256 digest of the exact bytes the analysis was computed from.
    pub content_fingerprint: Fingerprint,
    /// When the analysis was produced.
    pub analyzed_at: DateTime<Utc>,
    /// Present when the document failed to parse: the analysis is degraded
    /// (no dependencies, empty metadata) and this carries the reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl WorkflowAnalysis {
    /// The storage identity key.
    pub fn identity_key(&self) -> (&RepositoryId, &WorkflowPath, &CommitSha) {
        (
            &self.event.repository.full_name,
            &self.event.workflow.path,
            &self.event.commit.sha,
        )
    }
}

// ---------------------------------------------------------------------------

/// The row shape the dedup gatekeeper reads and writes through its port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupEntry {
    /// Content fingerprint last recorded for a `(repository, path)` key.
    pub fingerprint: Fingerprint,
    /// When that fingerprint was first recorded.
    pub first_seen_at: DateTime<Utc>,
}
