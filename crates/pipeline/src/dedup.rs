//! Consumer-side idempotency: the dedup gatekeeper.
//!
//! The check runs *after* fetch, over the fingerprint of the actual file
//! bytes, so a redelivery with stale metadata but unchanged content is still
//! suppressed, while changed content is still processed even if the commit
//! SHA is reused.
//!
//! The check and the record are separate steps. The store write is the
//! pipeline's single commit point; recording the fingerprint before a write
//! that then fails would make the redelivered event look like a duplicate
//! and lose the analysis. The processor calls [`DedupGatekeeper::commit`]
//! only after the write succeeds. Same-key invocations are serialized by the
//! queue's ordering guarantee, so check-then-commit is race-free.

use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::identifiers::{Fingerprint, RepositoryId, WorkflowPath};
use crate::ports::DedupStore;

/// Fingerprint-based duplicate suppression over a [`DedupStore`] port.
pub struct DedupGatekeeper<S> {
    store: S,
}

impl<S: DedupStore> DedupGatekeeper<S> {
    /// Wraps a dedup store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns `false` when the content fingerprint equals the last one
    /// recorded for `(repository, path)`, the event is an idempotent no-op
    /// and resolves as success without reprocessing.
    pub async fn should_process(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
    ) -> Result<bool, StoreError> {
        let last = self.store.last_entry(repository, path).await?;
        Ok(last.map(|entry| entry.fingerprint) != Some(fingerprint.clone()))
    }

    /// Records the fingerprint as the last-seen content for the key.
    /// Invoked after the analysis write commits.
    pub async fn commit(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store
            .record_fingerprint(repository, path, fingerprint, seen_at)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DedupEntry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapDedupStore {
        entries: Mutex<HashMap<(String, String), DedupEntry>>,
    }

    #[async_trait]
    impl DedupStore for MapDedupStore {
        async fn last_entry(
            &self,
            repository: &RepositoryId,
            path: &WorkflowPath,
        ) -> Result<Option<DedupEntry>, StoreError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(&(repository.to_string(), path.to_string()))
                .cloned())
        }

        async fn record_fingerprint(
            &self,
            repository: &RepositoryId,
            path: &WorkflowPath,
            fingerprint: &Fingerprint,
            first_seen_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.entries.lock().unwrap().insert(
                (repository.to_string(), path.to_string()),
                DedupEntry {
                    fingerprint: fingerprint.clone(),
                    first_seen_at,
                },
            );
            Ok(())
        }
    }

    fn key() -> (RepositoryId, WorkflowPath) {
        (
            RepositoryId::new("acme/widgets").unwrap(),
            WorkflowPath::new(".github/workflows/ci.yml").unwrap(),
        )
    }

    #[tokio::test]
    async fn first_sighting_is_processed() {
        let gatekeeper = DedupGatekeeper::new(MapDedupStore::default());
        let (repo, path) = key();
        let fp = Fingerprint::new("aaaa").unwrap();

        assert!(gatekeeper.should_process(&repo, &path, &fp).await.unwrap());
    }

    #[tokio::test]
    async fn committed_fingerprint_suppresses_redelivery() {
        let gatekeeper = DedupGatekeeper::new(MapDedupStore::default());
        let (repo, path) = key();
        let fp = Fingerprint::new("aaaa").unwrap();

        gatekeeper.commit(&repo, &path, &fp, Utc::now()).await.unwrap();
        assert!(!gatekeeper.should_process(&repo, &path, &fp).await.unwrap());
    }

    #[tokio::test]
    async fn changed_content_is_processed_again() {
        let gatekeeper = DedupGatekeeper::new(MapDedupStore::default());
        let (repo, path) = key();
        let old = Fingerprint::new("aaaa").unwrap();
        let new = Fingerprint::new("bbbb").unwrap();

        gatekeeper.commit(&repo, &path, &old, Utc::now()).await.unwrap();
        assert!(gatekeeper.should_process(&repo, &path, &new).await.unwrap());
    }

    #[tokio::test]
    async fn uncommitted_check_does_not_record() {
        let gatekeeper = DedupGatekeeper::new(MapDedupStore::default());
        let (repo, path) = key();
        let fp = Fingerprint::new("aaaa").unwrap();

        assert!(gatekeeper.should_process(&repo, &path, &fp).await.unwrap());
        // The check alone must leave no trace; only commit records.
        assert!(gatekeeper.should_process(&repo, &path, &fp).await.unwrap());
    }
}
