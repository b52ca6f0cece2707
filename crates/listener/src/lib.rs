//! Sprocket event source infrastructure.
//!
//! Turns raw repository notifications into ordered deliveries for the
//! analysis pipeline:
//!
//! - [`WebhookDispatcher`] routes a raw `(event kind, body)` payload pair
//!   to an explicit per-kind handler and returns normalized
//!   [`pipeline::types::WorkflowChangeEvent`]s.
//! - [`InMemoryQueue`] implements [`pipeline::EventDispatch`] with the
//!   delivery semantics of a session-enabled broker: per-group-key FIFO,
//!   at-least-once delivery under a visibility lease, publish-side dedup-key
//!   suppression, and a dead-letter buffer.
//! - [`Consumer`] is the receive loop feeding deliveries to
//!   [`processor::Processor`] and settling them by outcome.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport shapes and delivery mechanics live here;
//! the pipeline crate sees only its own ports and event model.

pub mod consumer;
pub mod queue;
pub mod webhook;

pub use consumer::{publish_with_retry, Consumer};
pub use queue::{DeadLetter, Delivery, InMemoryQueue, QueueConfig, Receipt};
pub use webhook::{WebhookDispatcher, WebhookError, PULL_REQUEST_EVENT, PUSH_EVENT};
