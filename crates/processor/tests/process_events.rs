//! Processor flow tests against in-memory port fakes: idempotence,
//! degraded parses, removed files, and retry behavior.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pipeline::{
    AnalysisStore, ChangeEventType, CommitInfo, CommitSha, DedupEntry, DedupStore, DependencyName,
    FetchError, Fingerprint, GitRef, Repository, RepositoryId, StoreError, WorkflowAnalysis,
    WorkflowChangeEvent, WorkflowFetcher, WorkflowPath, WorkflowRef, WriteOutcome,
};
use processor::{ProcessOutcome, Processor, RetryConfig};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Serves queued fetch responses in order; repeats the last one when empty.
#[derive(Default)]
struct FakeFetcher {
    responses: Mutex<VecDeque<Result<Vec<u8>, FetchError>>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn push_ok(&self, content: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(content.to_vec()));
    }

    fn push_err(&self, error: FetchError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _repository: &Repository,
        _git_ref: &GitRef,
        _path: &WorkflowPath,
    ) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

/// In-memory analysis + dedup store with a write counter.
#[derive(Default)]
struct MemoryStore {
    analyses: Mutex<HashMap<(String, String, String), WorkflowAnalysis>>,
    fingerprints: Mutex<HashMap<(String, String), DedupEntry>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn write(&self, analysis: &WorkflowAnalysis) -> Result<WriteOutcome, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let (repo, path, sha) = analysis.identity_key();
        let key = (repo.to_string(), path.to_string(), sha.to_string());
        let mut analyses = self.analyses.lock().unwrap();
        let outcome = match analyses.get(&key) {
            None => WriteOutcome::Inserted,
            Some(existing) if existing == analysis => WriteOutcome::Unchanged,
            Some(_) => WriteOutcome::Updated,
        };
        analyses.insert(key, analysis.clone());
        Ok(outcome)
    }

    async fn read(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        sha: &CommitSha,
    ) -> Result<Option<WorkflowAnalysis>, StoreError> {
        let key = (
            repository.to_string(),
            path.to_string(),
            sha.to_string(),
        );
        Ok(self.analyses.lock().unwrap().get(&key).cloned())
    }

    async fn locations_for(
        &self,
        _name: &DependencyName,
    ) -> Result<Vec<(RepositoryId, WorkflowPath)>, StoreError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn last_entry(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
    ) -> Result<Option<DedupEntry>, StoreError> {
        let key = (repository.to_string(), path.to_string());
        Ok(self.fingerprints.lock().unwrap().get(&key).cloned())
    }

    async fn record_fingerprint(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        fingerprint: &Fingerprint,
        first_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = (repository.to_string(), path.to_string());
        self.fingerprints.lock().unwrap().insert(
            key,
            DedupEntry {
                fingerprint: fingerprint.clone(),
                first_seen_at,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn event_for(path: &str, sha: &str) -> WorkflowChangeEvent {
    WorkflowChangeEvent {
        repository: Repository {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
            full_name: RepositoryId::new("acme/widgets").unwrap(),
        },
        workflow: WorkflowRef {
            path: WorkflowPath::new(path).unwrap(),
            git_ref: GitRef::new("refs/heads/main").unwrap(),
        },
        commit: CommitInfo {
            sha: CommitSha::new(sha).unwrap(),
            message: "update ci".to_string(),
            author: "dev".to_string(),
        },
        event_type: ChangeEventType::Push,
        timestamp: Utc::now(),
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn processor(
    fetcher: Arc<FakeFetcher>,
    store: Arc<MemoryStore>,
) -> Processor<Arc<FakeFetcher>, Arc<MemoryStore>, Arc<MemoryStore>> {
    Processor::new(fetcher, Arc::clone(&store), store, fast_retry())
}

const CI_WORKFLOW: &[u8] = b"
name: CI
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stores_analysis_then_skips_unchanged_redelivery() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));
    let event = event_for(".github/workflows/ci.yml", "sha-1");

    fetcher.push_ok(CI_WORKFLOW);
    let first = processor.process(&event).await.unwrap();
    assert_eq!(first, ProcessOutcome::Stored(WriteOutcome::Inserted));
    assert_eq!(store.write_count(), 1);

    // Redelivery with unchanged content resolves without a second write.
    fetcher.push_ok(CI_WORKFLOW);
    let second = processor.process(&event).await.unwrap();
    assert_eq!(second, ProcessOutcome::DuplicateContent);
    assert_eq!(store.write_count(), 1);

    let stored = store
        .read(
            &event.repository.full_name,
            &event.workflow.path,
            &event.commit.sha,
        )
        .await
        .unwrap()
        .expect("analysis stored");
    assert_eq!(stored.dependencies.len(), 2);
    assert_eq!(stored.parse_error, None);
}

#[tokio::test]
async fn changed_content_under_the_same_key_updates_in_place() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));
    let event = event_for(".github/workflows/ci.yml", "sha-reused");

    fetcher.push_ok(CI_WORKFLOW);
    processor.process(&event).await.unwrap();

    // Same commit SHA, different bytes: still processed, updated in place.
    fetcher.push_ok(b"name: CI v2\njobs: {}\n");
    let outcome = processor.process(&event).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Stored(WriteOutcome::Updated));

    let stored = store
        .read(
            &event.repository.full_name,
            &event.workflow.path,
            &event.commit.sha,
        )
        .await
        .unwrap()
        .expect("analysis stored");
    assert_eq!(stored.metadata.workflow_name.as_deref(), Some("CI v2"));
}

#[tokio::test]
async fn removed_file_suppresses_the_write() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));
    let event = event_for(".github/workflows/old.yml", "sha-2");

    fetcher.push_err(FetchError::NotFound);
    let outcome = processor.process(&event).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::FileRemoved);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn malformed_document_records_a_degraded_analysis_and_processing_continues() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));

    let broken = event_for(".github/workflows/broken.yml", "sha-3");
    fetcher.push_ok(b"invalid: yaml: content:");
    let outcome = processor.process(&broken).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::ParseFailed { .. }));

    let stored = store
        .read(
            &broken.repository.full_name,
            &broken.workflow.path,
            &broken.commit.sha,
        )
        .await
        .unwrap()
        .expect("degraded analysis stored");
    assert!(stored.dependencies.is_empty());
    assert!(stored.parse_error.is_some());

    // The next event for a different workflow processes normally.
    let healthy = event_for(".github/workflows/ci.yml", "sha-4");
    fetcher.push_ok(CI_WORKFLOW);
    let outcome = processor.process(&healthy).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Stored(WriteOutcome::Inserted));
}

#[tokio::test]
async fn transient_fetch_failures_are_retried_to_success() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));
    let event = event_for(".github/workflows/ci.yml", "sha-5");

    fetcher.push_err(FetchError::Transient {
        message: "timeout".to_string(),
        retry_after: None,
    });
    fetcher.push_err(FetchError::Transient {
        message: "503".to_string(),
        retry_after: None,
    });
    fetcher.push_ok(CI_WORKFLOW);

    let outcome = processor.process(&event).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Stored(WriteOutcome::Inserted));
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn fetch_exhaustion_surfaces_and_leaves_no_partial_state() {
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(MemoryStore::default());
    let processor = processor(Arc::clone(&fetcher), Arc::clone(&store));
    let event = event_for(".github/workflows/ci.yml", "sha-6");

    for _ in 0..3 {
        fetcher.push_err(FetchError::Transient {
            message: "unreachable".to_string(),
            retry_after: None,
        });
    }
    let error = processor.process(&event).await.unwrap_err();
    assert!(error.to_string().contains("fetch failed"));
    assert_eq!(store.write_count(), 0);

    // Redelivery after the fault clears processes from scratch: no
    // fingerprint was recorded by the failed attempt.
    fetcher.push_ok(CI_WORKFLOW);
    let outcome = processor.process(&event).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Stored(WriteOutcome::Inserted));
}
