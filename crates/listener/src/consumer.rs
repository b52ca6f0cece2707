//! Queue consumer loop.
//!
//! [`Consumer`] bridges the queue and the processor: it receives deliveries,
//! runs each through [`processor::Processor::process`], and settles the
//! delivery based on the outcome. Deliveries for different group keys run
//! concurrently; within a group the queue itself guarantees that the next
//! message is not handed out until the previous one settles.

use std::sync::Arc;

use processor::retry::{retry_with_backoff, RetryConfig};
use processor::Processor;

use pipeline::types::WorkflowChangeEvent;
use pipeline::{
    AnalysisStore, DedupStore, DispatchError, EventDispatch, WorkflowFetcher,
};

use crate::queue::InMemoryQueue;

/// Publishes one event, retrying transient dispatch failures with bounded
/// backoff. A closed queue fails immediately.
pub async fn publish_with_retry<D: EventDispatch>(
    dispatch: &D,
    event: &WorkflowChangeEvent,
    retry: &RetryConfig,
) -> Result<(), DispatchError> {
    retry_with_backoff(retry, "publish", DispatchError::retry_policy, || {
        dispatch.publish(event)
    })
    .await
}

/// Drives deliveries from the queue through the processor until the queue is
/// closed and drained.
pub struct Consumer<F, D, A> {
    queue: Arc<InMemoryQueue>,
    processor: Arc<Processor<F, D, A>>,
}

impl<F, D, A> Consumer<F, D, A>
where
    F: WorkflowFetcher + 'static,
    D: DedupStore + 'static,
    A: AnalysisStore + 'static,
{
    pub fn new(queue: Arc<InMemoryQueue>, processor: Arc<Processor<F, D, A>>) -> Self {
        Self { queue, processor }
    }

    /// Receives until end-of-stream. Each delivery is processed on its own
    /// task so independent groups make progress concurrently.
    pub async fn run(&self) {
        let mut workers = Vec::new();
        while let Some(delivery) = self.queue.receive().await {
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            workers.push(tokio::spawn(async move {
                match processor.process(&delivery.event).await {
                    Ok(outcome) => {
                        tracing::debug!(?outcome, "delivery processed");
                        queue.ack(&delivery.receipt);
                    }
                    Err(error) => {
                        tracing::warn!(%error, "delivery failed, returning to queue");
                        queue.nack(&delivery.receipt);
                    }
                }
            }));
        }
        for worker in workers {
            // A panicked worker already left its delivery to lease expiry.
            let _ = worker.await;
        }
    }
}
