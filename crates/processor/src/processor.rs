//! Per-event orchestration: fetch → gatekeep → parse → extract → assemble →
//! write.
//!
//! The processor sequences calls between the pure domain functions and the
//! injected port implementations. It contains no domain rules of its own:
//! parsing, classification, and assembly live in [`pipeline`]; transports
//! and storage live behind the ports.
//!
//! The store write is the single commit point. A duplicate, a removed file,
//! and a degraded parse all resolve as *successful* outcomes so the queue
//! acknowledges the delivery; only infrastructure failures (retry ceiling
//! reached, non-retryable faults) surface as [`ProcessError`] and leave the
//! delivery to be redelivered and eventually dead-lettered.

use chrono::Utc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use pipeline::assemble::{assemble, assemble_degraded};
use pipeline::dedup::DedupGatekeeper;
use pipeline::extract::extract_dependencies;
use pipeline::fingerprint::fingerprint_content;
use pipeline::parser::parse_workflow;
use pipeline::{
    AnalysisStore, DedupStore, FetchError, StoreError, WorkflowChangeEvent, WorkflowFetcher,
    WriteOutcome,
};

use crate::retry::{retry_with_backoff, RetryConfig};

/// How one delivery resolved. Every variant acknowledges the delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The analysis was written (or re-written idempotently).
    Stored(WriteOutcome),
    /// Content fingerprint matched the last processed one; idempotent no-op.
    DuplicateContent,
    /// The file no longer exists at the notified ref; nothing was written.
    FileRemoved,
    /// The document failed to parse; a degraded analysis was written.
    ParseFailed {
        /// The parse failure, as recorded on the degraded analysis.
        reason: String,
    },
}

/// Infrastructure failure that prevents the delivery from resolving.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The fetch boundary failed beyond the retry budget.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// The store boundary failed beyond the retry budget.
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// The per-event processing unit. Stateless between invocations; all state
/// lives behind the injected ports.
pub struct Processor<F, D, A> {
    fetcher: F,
    gatekeeper: DedupGatekeeper<D>,
    store: A,
    retry: RetryConfig,
}

impl<F, D, A> Processor<F, D, A>
where
    F: WorkflowFetcher,
    D: DedupStore,
    A: AnalysisStore,
{
    /// Builds a processor from explicitly injected port implementations.
    pub fn new(fetcher: F, dedup_store: D, store: A, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            gatekeeper: DedupGatekeeper::new(dedup_store),
            store,
            retry,
        }
    }

    /// Processes one change event to completion.
    pub async fn process(
        &self,
        event: &WorkflowChangeEvent,
    ) -> Result<ProcessOutcome, ProcessError> {
        let span = tracing::info_span!(
            "process_event",
            invocation = %Uuid::new_v4(),
            repository = %event.repository.full_name,
            path = %event.workflow.path,
            sha = %event.commit.sha,
        );
        self.process_inner(event).instrument(span).await
    }

    async fn process_inner(
        &self,
        event: &WorkflowChangeEvent,
    ) -> Result<ProcessOutcome, ProcessError> {
        let content = match retry_with_backoff(
            &self.retry,
            "fetch_workflow",
            FetchError::retry_policy,
            || {
                self.fetcher
                    .fetch(&event.repository, &event.workflow.git_ref, &event.workflow.path)
            },
        )
        .await
        {
            Ok(content) => content,
            Err(FetchError::NotFound) => {
                tracing::info!("workflow file removed before fetch, suppressing analysis");
                return Ok(ProcessOutcome::FileRemoved);
            }
            Err(error) => return Err(error.into()),
        };

        let fingerprint = fingerprint_content(&content);

        let proceed = self
            .gatekeeper
            .should_process(&event.repository.full_name, &event.workflow.path, &fingerprint)
            .await?;
        if !proceed {
            tracing::info!("content unchanged since last analysis, skipping");
            return Ok(ProcessOutcome::DuplicateContent);
        }

        let analyzed_at = Utc::now();
        let (analysis, parse_failure) = match parse_workflow(&content) {
            Ok(model) => {
                let dependencies = extract_dependencies(&model);
                tracing::debug!(
                    dependencies = dependencies.len(),
                    jobs = model.jobs.len(),
                    "workflow analyzed"
                );
                (
                    assemble(event.clone(), &model, dependencies, fingerprint.clone(), analyzed_at),
                    None,
                )
            }
            Err(error) => {
                tracing::warn!(%error, "workflow failed to parse, recording degraded analysis");
                let reason = error.to_string();
                (
                    assemble_degraded(event.clone(), &error, fingerprint.clone(), analyzed_at),
                    Some(reason),
                )
            }
        };

        let outcome = retry_with_backoff(
            &self.retry,
            "write_analysis",
            StoreError::retry_policy,
            || self.store.write(&analysis),
        )
        .await?;

        // The write has committed; only now does the fingerprint become the
        // last-seen content for this workflow.
        self.gatekeeper
            .commit(
                &event.repository.full_name,
                &event.workflow.path,
                &fingerprint,
                analyzed_at,
            )
            .await?;

        tracing::info!(outcome = ?outcome, "analysis stored");
        match parse_failure {
            Some(reason) => Ok(ProcessOutcome::ParseFailed { reason }),
            None => Ok(ProcessOutcome::Stored(outcome)),
        }
    }
}
