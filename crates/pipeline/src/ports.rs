//! Port trait definitions for the system's external collaborators.
//!
//! The domain defines *what* it needs from the queue transport, the
//! source-control read API, and the durable store; infrastructure crates
//! define *how* each is supplied. Tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, FetchError, StoreError};
use crate::identifiers::{DependencyName, Fingerprint, GitRef, RepositoryId, WorkflowPath};
use crate::types::{DedupEntry, Repository, WorkflowAnalysis, WorkflowChangeEvent};

// ---------------------------------------------------------------------------
// Ordered dispatch
// ---------------------------------------------------------------------------

/// Publishes change events onto the ordered queue transport.
///
/// The transport must deliver events sharing a group key strictly in publish
/// order and suppress exact duplicates by the event's dedup key. The client
/// carries no business logic; publishing failures are retried by the caller
/// with bounded exponential backoff and surfaced after exhaustion.
#[async_trait]
pub trait EventDispatch: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: &WorkflowChangeEvent) -> Result<(), DispatchError>;
}

// ---------------------------------------------------------------------------
// Source-control read API
// ---------------------------------------------------------------------------

/// Fetches raw workflow file content from the source-control read API.
#[async_trait]
pub trait WorkflowFetcher: Send + Sync {
    /// Retrieves the file bytes at `path` as of `git_ref`.
    async fn fetch(
        &self,
        repository: &Repository,
        git_ref: &GitRef,
        path: &WorkflowPath,
    ) -> Result<Vec<u8>, FetchError>;
}

// ---------------------------------------------------------------------------
// Dedup store
// ---------------------------------------------------------------------------

/// Reads and writes the last-seen content fingerprint per
/// `(repository, workflow path)` key.
///
/// Invocations for distinct keys may run concurrently; invocations for the
/// same key are serialized by the queue's ordering guarantee.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Returns the last recorded entry for the key, if any.
    async fn last_entry(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
    ) -> Result<Option<DedupEntry>, StoreError>;

    /// Records `fingerprint` as the last-seen content for the key.
    async fn record_fingerprint(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
        first_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Analysis store
// ---------------------------------------------------------------------------

/// What an idempotent store write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// No record existed for the identity key.
    Inserted,
    /// A record existed with different content and was replaced in place.
    Updated,
    /// An identical record already existed; the write was a no-op.
    Unchanged,
}

/// Persists analyses and maintains the reverse index from dependency name to
/// the `(repository, workflow path)` locations that reference it.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Writes an analysis idempotently under its identity key.
    ///
    /// Re-writing the same key with the same field values is a no-op; the
    /// same key with different content is an update, never a duplicate.
    async fn write(&self, analysis: &WorkflowAnalysis) -> Result<WriteOutcome, StoreError>;

    /// Reads an analysis back by its identity key.
    async fn read(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        sha: &crate::CommitSha,
    ) -> Result<Option<WorkflowAnalysis>, StoreError>;

    /// Returns the locations that currently reference the named dependency.
    async fn locations_for(
        &self,
        name: &DependencyName,
    ) -> Result<Vec<(RepositoryId, WorkflowPath)>, StoreError>;
}

// ---------------------------------------------------------------------------
// Shared-handle impls
// ---------------------------------------------------------------------------

// One adapter value can back several ports at once (the store adapter
// implements both `DedupStore` and `AnalysisStore`), so the ports are also
// implemented for `Arc<T>` by delegation.

#[async_trait]
impl<T: EventDispatch + ?Sized> EventDispatch for std::sync::Arc<T> {
    async fn publish(&self, event: &WorkflowChangeEvent) -> Result<(), DispatchError> {
        (**self).publish(event).await
    }
}

#[async_trait]
impl<T: WorkflowFetcher + ?Sized> WorkflowFetcher for std::sync::Arc<T> {
    async fn fetch(
        &self,
        repository: &Repository,
        git_ref: &GitRef,
        path: &WorkflowPath,
    ) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(repository, git_ref, path).await
    }
}

#[async_trait]
impl<T: DedupStore + ?Sized> DedupStore for std::sync::Arc<T> {
    async fn last_entry(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
    ) -> Result<Option<DedupEntry>, StoreError> {
        (**self).last_entry(repository, path).await
    }

    async fn record_fingerprint(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
        first_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self)
            .record_fingerprint(repository, path, fingerprint, first_seen_at)
            .await
    }
}

#[async_trait]
impl<T: AnalysisStore + ?Sized> AnalysisStore for std::sync::Arc<T> {
    async fn write(&self, analysis: &WorkflowAnalysis) -> Result<WriteOutcome, StoreError> {
        (**self).write(analysis).await
    }

    async fn read(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        sha: &crate::CommitSha,
    ) -> Result<Option<WorkflowAnalysis>, StoreError> {
        (**self).read(repository, path, sha).await
    }

    async fn locations_for(
        &self,
        name: &DependencyName,
    ) -> Result<Vec<(RepositoryId, WorkflowPath)>, StoreError> {
        (**self).locations_for(name).await
    }
}
