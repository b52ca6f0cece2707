//! Webhook payload handling.
//!
//! [`WebhookDispatcher`] is the boundary between the raw transport (an HTTP
//! endpoint, a forwarded queue message, an event file on disk) and the
//! normalized event model. It routes a `(event kind, body)` pair to an
//! explicit per-kind handler and returns zero or more
//! [`WorkflowChangeEvent`]s ready for publishing.
//!
//! Unknown event kinds are not an error; the transport subscribes broadly
//! and the dispatcher simply produces no events for kinds it does not
//! handle.

use chrono::Utc;
use thiserror::Error;

use pipeline::normalize::{
    normalize_pull_request, normalize_push, PullRequestNotification, PushNotification,
};
use pipeline::types::WorkflowChangeEvent;

/// Event kind header value for push notifications.
pub const PUSH_EVENT: &str = "push";
/// Event kind header value for pull-request notifications.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

/// Errors raised while turning a raw payload into events.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The payload body could not be deserialized for its declared kind.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

/// Routes raw webhook payloads to explicit per-kind handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebhookDispatcher;

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Dispatches one raw payload.
    ///
    /// `changed_files` carries the pull request's changed-path list, looked
    /// up by the transport via the read API; it is ignored for every other
    /// kind. Unknown kinds yield an empty event list.
    pub fn dispatch(
        &self,
        kind: &str,
        body: &[u8],
        changed_files: &[String],
    ) -> Result<Vec<WorkflowChangeEvent>, WebhookError> {
        match kind {
            PUSH_EVENT => self.handle_push(body),
            PULL_REQUEST_EVENT => self.handle_pull_request(body, changed_files),
            other => {
                tracing::debug!(kind = other, "ignoring unhandled event kind");
                Ok(Vec::new())
            }
        }
    }

    /// Handles a push notification body.
    pub fn handle_push(&self, body: &[u8]) -> Result<Vec<WorkflowChangeEvent>, WebhookError> {
        let notification: PushNotification =
            serde_json::from_slice(body).map_err(|err| WebhookError::InvalidPayload {
                kind: PUSH_EVENT.to_owned(),
                reason: err.to_string(),
            })?;
        let events = normalize_push(&notification, Utc::now());
        tracing::info!(
            repository = %notification.repository.full_name,
            events = events.len(),
            "handled push notification"
        );
        Ok(events)
    }

    /// Handles a pull-request notification body.
    pub fn handle_pull_request(
        &self,
        body: &[u8],
        changed_files: &[String],
    ) -> Result<Vec<WorkflowChangeEvent>, WebhookError> {
        let notification: PullRequestNotification =
            serde_json::from_slice(body).map_err(|err| WebhookError::InvalidPayload {
                kind: PULL_REQUEST_EVENT.to_owned(),
                reason: err.to_string(),
            })?;
        let events = normalize_pull_request(&notification, changed_files, Utc::now());
        tracing::info!(
            repository = %notification.repository.full_name,
            action = %notification.action,
            events = events.len(),
            "handled pull-request notification"
        );
        Ok(events)
    }
}
