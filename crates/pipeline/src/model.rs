//! Structural model of a parsed workflow document.
//!
//! The model is deliberately narrow: it keeps exactly the parts the
//! dependency extractor walks (jobs, steps, runner and container
//! declarations) and nothing else. Declaration order is preserved at every
//! level so extracted records can mirror the source document.

/// A parsed workflow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowModel {
    /// Display name, when the document declares one.
    pub name: Option<String>,
    /// Jobs in declaration order.
    pub jobs: Vec<JobModel>,
}

impl WorkflowModel {
    /// Step count summed across all jobs.
    pub fn total_steps(&self) -> usize {
        self.jobs.iter().map(|job| job.steps.len()).sum()
    }

    /// Job identifiers in declaration order.
    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.id.clone()).collect()
    }
}

/// One job within a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobModel {
    /// The job's key in the `jobs` mapping.
    pub id: String,
    /// Runner labels from `runs-on`: one element for the scalar form, one per
    /// entry for the list form, empty when the job declares none.
    pub runs_on: Vec<String>,
    /// Container image reference (`image[:tag]`), from either the string form
    /// or the `image` key of the mapping form.
    pub container: Option<String>,
    /// Steps in declaration order.
    pub steps: Vec<StepModel>,
}

/// One step within a job.
///
/// Script steps carry no `uses` reference and contribute no dependency, but
/// still count toward the step total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepModel {
    /// The step's `uses` reference, verbatim, when present.
    pub uses: Option<String>,
}
