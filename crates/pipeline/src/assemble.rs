//! Result assembly: combines event, model, records, and fingerprint into one
//! [`WorkflowAnalysis`]. Pure, no I/O.

use chrono::{DateTime, Utc};

use crate::errors::ParseError;
use crate::model::WorkflowModel;
use crate::types::{AnalysisMetadata, DependencyRecord, WorkflowAnalysis, WorkflowChangeEvent};
use crate::Fingerprint;

/// Assembles the analysis for a successfully parsed workflow.
///
/// Dependency order is preserved exactly as extracted; metadata carries the
/// job identifiers in declaration order and the step count summed across
/// jobs.
pub fn assemble(
    event: WorkflowChangeEvent,
    model: &WorkflowModel,
    dependencies: Vec<DependencyRecord>,
    content_fingerprint: Fingerprint,
    analyzed_at: DateTime<Utc>,
) -> WorkflowAnalysis {
    WorkflowAnalysis {
        event,
        dependencies,
        metadata: AnalysisMetadata {
            workflow_name: model.name.clone(),
            jobs: model.job_ids(),
            total_steps: model.total_steps(),
        },
        content_fingerprint,
        analyzed_at,
        parse_error: None,
    }
}

/// Assembles the degraded analysis for a document that failed to parse.
///
/// The record carries no dependencies and empty metadata; `parse_error`
/// preserves the reason so the failure stays attributable to the
/// originating event.
pub fn assemble_degraded(
    event: WorkflowChangeEvent,
    error: &ParseError,
    content_fingerprint: Fingerprint,
    analyzed_at: DateTime<Utc>,
) -> WorkflowAnalysis {
    WorkflowAnalysis {
        event,
        dependencies: Vec::new(),
        metadata: AnalysisMetadata::empty(),
        content_fingerprint,
        analyzed_at,
        parse_error: Some(error.to_string()),
    }
}
