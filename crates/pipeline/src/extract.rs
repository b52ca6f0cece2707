//! Dependency extraction: walks a [`WorkflowModel`] in document order and
//! produces one classified [`DependencyRecord`] per external reference.
//!
//! Per-job emission order is fixed: runner labels first, then the container
//! declaration, then step references in step order. Jobs are visited in
//! declaration order, so the output sequence mirrors the source document.

use crate::classify::classify_reference;
use crate::model::WorkflowModel;
use crate::types::{DependencyKind, DependencyRecord, DependencyReference};

/// Extracts every external dependency reference from a parsed workflow.
pub fn extract_dependencies(model: &WorkflowModel) -> Vec<DependencyRecord> {
    let mut records = Vec::new();

    for job in &model.jobs {
        for label in &job.runs_on {
            records.push(classify_reference(runner_reference(label)));
        }

        if let Some(image) = &job.container {
            records.push(classify_reference(container_reference(image, image)));
        }

        for step in &job.steps {
            if let Some(uses) = &step.uses {
                if let Some(reference) = step_reference(uses) {
                    records.push(classify_reference(reference));
                }
            }
        }
    }

    records
}

/// Runner images are not version-pinned in this model: the label is the name
/// and the version is always absent.
fn runner_reference(label: &str) -> DependencyReference {
    DependencyReference {
        kind: DependencyKind::Runner,
        name: label.to_string(),
        version: None,
        raw_reference: label.to_string(),
    }
}

/// Splits `image[:tag]` into a container reference. `raw` is kept verbatim,
/// so a `docker://` step records the full scheme-prefixed string.
fn container_reference(image: &str, raw: &str) -> DependencyReference {
    let (name, version) = split_image_tag(image);
    DependencyReference {
        kind: DependencyKind::Container,
        name: name.to_string(),
        version: version.map(str::to_string),
        raw_reference: raw.to_string(),
    }
}

/// Interprets a step's `uses` reference.
///
/// Returns `None` for local actions (`./`, `../`): they live inside the
/// repository and are not external dependencies.
fn step_reference(uses: &str) -> Option<DependencyReference> {
    if uses.is_empty() {
        return None;
    }

    // `docker://image[:tag]` pulls a container image directly.
    if let Some(image) = uses.strip_prefix("docker://") {
        return Some(container_reference(image, uses));
    }

    if uses.starts_with("./") || uses.starts_with("../") {
        return None;
    }

    // `owner/repo[/subpath]@ref`; the name keeps any subpath.
    match uses.split_once('@') {
        Some((name, version)) => Some(DependencyReference {
            kind: DependencyKind::Action,
            name: name.to_string(),
            version: Some(version.to_string()),
            raw_reference: uses.to_string(),
        }),
        None => Some(DependencyReference {
            kind: DependencyKind::Action,
            name: uses.to_string(),
            version: None,
            raw_reference: uses.to_string(),
        }),
    }
}

/// Splits a container image reference into name and optional tag.
///
/// The tag is the part after the last `:` provided it contains no `/`, so a
/// registry host with a port (`ghcr.io:443/tools/img`) is not mis-split.
fn split_image_tag(image: &str) -> (&str, Option<&str>) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') && !tag.is_empty() => (name, Some(tag)),
        _ => (image, None),
    }
}
