//! End-to-end delivery tests: webhook payloads published through the queue,
//! consumed into the processor, and settled against in-memory port fakes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use listener::{Consumer, InMemoryQueue, QueueConfig, WebhookDispatcher, PUSH_EVENT};
use pipeline::{
    AnalysisStore, ChangeEventType, CommitInfo, CommitSha, DedupEntry, DedupStore, DependencyName,
    EventDispatch, FetchError, Fingerprint, GitRef, Repository, RepositoryId, StoreError,
    WorkflowAnalysis, WorkflowChangeEvent, WorkflowFetcher, WorkflowPath, WorkflowRef,
    WriteOutcome,
};
use processor::{Processor, RetryConfig};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Serves queued per-path responses, each after an optional delay.
#[derive(Default)]
struct StepFetcher {
    responses: Mutex<HashMap<String, VecDeque<(Duration, Result<Vec<u8>, FetchError>)>>>,
}

impl StepFetcher {
    fn push(&self, path: &str, delay: Duration, content: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back((delay, Ok(content.to_vec())));
    }

    fn push_err(&self, path: &str, error: FetchError) {
        self.responses
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back((Duration::ZERO, Err(error)));
    }
}

#[async_trait]
impl WorkflowFetcher for StepFetcher {
    async fn fetch(
        &self,
        _repository: &Repository,
        _git_ref: &GitRef,
        path: &WorkflowPath,
    ) -> Result<Vec<u8>, FetchError> {
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(path.as_str())
            .and_then(VecDeque::pop_front);
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(FetchError::Permanent {
                status: None,
                message: "no scripted response".to_string(),
            }),
        }
    }
}

/// In-memory store that records the order analysis writes complete in.
#[derive(Default)]
struct OrderedStore {
    analyses: Mutex<HashMap<(String, String, String), WorkflowAnalysis>>,
    fingerprints: Mutex<HashMap<(String, String), DedupEntry>>,
    write_order: Mutex<Vec<String>>,
}

impl OrderedStore {
    fn write_order(&self) -> Vec<String> {
        self.write_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisStore for OrderedStore {
    async fn write(&self, analysis: &WorkflowAnalysis) -> Result<WriteOutcome, StoreError> {
        let (repo, path, sha) = analysis.identity_key();
        let key = (repo.to_string(), path.to_string(), sha.to_string());
        let mut analyses = self.analyses.lock().unwrap();
        let outcome = match analyses.get(&key) {
            None => WriteOutcome::Inserted,
            Some(existing) if existing == analysis => WriteOutcome::Unchanged,
            Some(_) => WriteOutcome::Updated,
        };
        analyses.insert(key, analysis.clone());
        self.write_order.lock().unwrap().push(sha.to_string());
        Ok(outcome)
    }

    async fn read(
        &self,
        repository: &RepositoryId,
        path: &WorkflowPath,
        sha: &CommitSha,
    ) -> Result<Option<WorkflowAnalysis>, StoreError> {
        let key = (repository.to_string(), path.to_string(), sha.to_string());
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
impl DedupStore for OrderedStore {
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

fn event(path: &str, sha: &str, minute: u32) -> WorkflowChangeEvent {
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
        timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap(),
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

fn harness(
    fetcher: Arc<StepFetcher>,
    store: Arc<OrderedStore>,
    queue: Arc<InMemoryQueue>,
) -> Consumer<Arc<StepFetcher>, Arc<OrderedStore>, Arc<OrderedStore>> {
    let processor = Processor::new(fetcher, Arc::clone(&store), store, fast_retry());
    Consumer::new(queue, Arc::new(processor))
}

fn position(order: &[String], sha: &str) -> usize {
    order
        .iter()
        .position(|s| s == sha)
        .unwrap_or_else(|| panic!("{sha} missing from write order {order:?}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_group_writes_land_in_publish_order() {
    let fetcher = Arc::new(StepFetcher::default());
    let store = Arc::new(OrderedStore::default());
    let queue = Arc::new(InMemoryQueue::default());

    // The first ci.yml fetch stalls; if ordering were not enforced, the
    // second ci.yml event and the release.yml event would both win the race.
    fetcher.push(
        ".github/workflows/ci.yml",
        Duration::from_millis(80),
        b"name: A\njobs: {}\n",
    );
    fetcher.push(
        ".github/workflows/ci.yml",
        Duration::ZERO,
        b"name: B\njobs: {}\n",
    );
    fetcher.push(
        ".github/workflows/release.yml",
        Duration::ZERO,
        b"name: C\njobs: {}\n",
    );

    queue
        .publish(&event(".github/workflows/ci.yml", "sha-a", 0))
        .await
        .unwrap();
    queue
        .publish(&event(".github/workflows/ci.yml", "sha-b", 1))
        .await
        .unwrap();
    queue
        .publish(&event(".github/workflows/release.yml", "sha-c", 2))
        .await
        .unwrap();
    queue.close();

    harness(fetcher, Arc::clone(&store), Arc::clone(&queue))
        .run()
        .await;

    let order = store.write_order();
    assert_eq!(order.len(), 3);
    // Within the ci.yml group the first event's write completes first.
    assert!(position(&order, "sha-a") < position(&order, "sha-b"));
    // The independent release.yml group is not held up by the stalled group.
    assert!(position(&order, "sha-c") < position(&order, "sha-a"));
    assert!(queue.dead_letters().is_empty());
}

#[tokio::test]
async fn failing_deliveries_end_in_the_dead_letter_buffer() {
    let fetcher = Arc::new(StepFetcher::default());
    let store = Arc::new(OrderedStore::default());
    let queue = Arc::new(InMemoryQueue::new(QueueConfig {
        visibility_timeout: Duration::from_secs(30),
        max_deliveries: 2,
    }));

    for _ in 0..2 {
        fetcher.push_err(
            ".github/workflows/ci.yml",
            FetchError::Permanent {
                status: Some(500),
                message: "scripted failure".to_string(),
            },
        );
    }

    queue
        .publish(&event(".github/workflows/ci.yml", "sha-a", 0))
        .await
        .unwrap();
    queue.close();

    harness(fetcher, Arc::clone(&store), Arc::clone(&queue))
        .run()
        .await;

    assert!(store.write_order().is_empty());
    let buried = queue.dead_letters();
    assert_eq!(buried.len(), 1);
    assert_eq!(buried[0].delivery_count, 2);
    assert_eq!(buried[0].event.commit.sha.as_str(), "sha-a");
}

#[tokio::test]
async fn webhook_payloads_flow_through_to_the_store() {
    let body = r#"{
        "ref": "refs/heads/main",
        "after": "3333333333333333333333333333333333333333",
        "repository": {
            "name": "widgets",
            "full_name": "acme/widgets",
            "owner": { "name": "acme" }
        },
        "head_commit": {
            "id": "3333333333333333333333333333333333333333",
            "message": "pin checkout",
            "author": { "name": "dev" },
            "added": [],
            "modified": [".github/workflows/ci.yml"],
            "removed": []
        },
        "commits": []
    }"#;

    let fetcher = Arc::new(StepFetcher::default());
    let store = Arc::new(OrderedStore::default());
    let queue = Arc::new(InMemoryQueue::default());

    fetcher.push(
        ".github/workflows/ci.yml",
        Duration::ZERO,
        b"jobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n",
    );

    let events = WebhookDispatcher::new()
        .dispatch(PUSH_EVENT, body.as_bytes(), &[])
        .unwrap();
    assert_eq!(events.len(), 1);
    for ev in &events {
        queue.publish(ev).await.unwrap();
    }
    queue.close();

    harness(fetcher, Arc::clone(&store), Arc::clone(&queue))
        .run()
        .await;

    let stored = store
        .read(
            &events[0].repository.full_name,
            &events[0].workflow.path,
            &events[0].commit.sha,
        )
        .await
        .unwrap()
        .expect("analysis written");
    assert_eq!(stored.dependencies.len(), 2);
    assert_eq!(stored.parse_error, None);
}
