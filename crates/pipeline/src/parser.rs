//! Tolerant parser from workflow YAML bytes to [`WorkflowModel`].
//!
//! Workflow files are semi-structured: optional fields, scalar-or-list
//! `runs-on`, string-or-mapping `container`, steps with or without `uses`.
//! The parser walks a [`serde_yaml::Value`] rather than deserializing into a
//! rigid struct, so a single unexpected shape degrades that one element
//! instead of failing the document. Only YAML syntax errors and a
//! non-mapping root are reported as [`ParseError`].
//!
//! `serde_yaml` mappings preserve insertion order, which is what guarantees
//! jobs and steps come out in declaration order.

use serde_yaml::Value;

use crate::errors::{ParseError, SourceLocation};
use crate::model::{JobModel, StepModel, WorkflowModel};

/// Parses workflow file bytes into a structural model.
pub fn parse_workflow(content: &[u8]) -> Result<WorkflowModel, ParseError> {
    let document: Value = serde_yaml::from_slice(content).map_err(|e| ParseError {
        reason: e.to_string(),
        location: e.location().map(|loc| SourceLocation {
            line: loc.line(),
            column: loc.column(),
        }),
    })?;

    if !document.is_mapping() {
        return Err(ParseError {
            reason: "workflow document root must be a mapping".to_string(),
            location: None,
        });
    }

    let name = document
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut jobs = Vec::new();
    if let Some(jobs_mapping) = document.get("jobs").and_then(Value::as_mapping) {
        for (key, job) in jobs_mapping {
            let Some(job_id) = key.as_str() else {
                continue;
            };
            // Non-mapping job entries are tolerated and skipped.
            if !job.is_mapping() {
                continue;
            }

            jobs.push(JobModel {
                id: job_id.to_string(),
                runs_on: parse_runs_on(job.get("runs-on")),
                container: parse_container(job.get("container")),
                steps: parse_steps(job.get("steps")),
            });
        }
    }

    Ok(WorkflowModel { name, jobs })
}

/// `runs-on` accepts a scalar label or a list of labels.
fn parse_runs_on(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(label)) => vec![label.clone()],
        Some(Value::Sequence(labels)) => labels
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// `container` accepts a bare image string or a mapping with an `image` key.
fn parse_container(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(image)) => Some(image.clone()),
        Some(container @ Value::Mapping(_)) => container
            .get("image")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Every sequence element counts as a step; entries that are not mappings
/// (or carry no `uses`) are script steps with no dependency reference.
fn parse_steps(value: Option<&Value>) -> Vec<StepModel> {
    let Some(Value::Sequence(steps)) = value else {
        return Vec::new();
    };

    steps
        .iter()
        .map(|step| StepModel {
            uses: step
                .get("uses")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}
