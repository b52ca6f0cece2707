//! Change normalization: raw repository notifications in, canonical
//! [`WorkflowChangeEvent`]s out.
//!
//! The normalizer performs no I/O. It filters changed paths to the workflow
//! definitions directory and emits one event per distinct matched path; no
//! matches is an empty result, not an error, and the caller short-circuits.
//!
//! The notification structs deserialize directly from the webhook payload
//! field names. For pull requests the changed-file list is not part of the
//! payload; the listener obtains it from the read API and passes it in, so
//! normalization itself stays pure.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::identifiers::{CommitSha, GitRef, RepositoryId, WorkflowPath};
use crate::types::{ChangeEventType, CommitInfo, Repository, WorkflowChangeEvent, WorkflowRef};

/// Directory that holds workflow definition files.
pub const WORKFLOW_DIR: &str = ".github/workflows/";

// ---------------------------------------------------------------------------
// Raw notification shapes
// ---------------------------------------------------------------------------

/// Repository block common to push and pull-request notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySummary {
    /// Repository name without the owner prefix.
    pub name: String,
    /// `"owner/name"`.
    pub full_name: String,
    /// Owner block; push payloads carry `name`, pull-request payloads `login`.
    pub owner: OwnerSummary,
}

/// Owner block of a repository summary.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerSummary {
    /// Present on pull-request payloads.
    #[serde(default)]
    pub login: Option<String>,
    /// Present on push payloads.
    #[serde(default)]
    pub name: Option<String>,
}

impl RepositorySummary {
    fn owner_id(&self) -> String {
        self.owner
            .login
            .clone()
            .or_else(|| self.owner.name.clone())
            .unwrap_or_else(|| {
                self.full_name
                    .split('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }
}

/// One commit inside a push notification.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    /// Commit SHA.
    pub id: String,
    /// Commit message.
    #[serde(default)]
    pub message: String,
    /// Commit author.
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    /// Commit timestamp, when the payload carries one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Paths added by this commit.
    #[serde(default)]
    pub added: Vec<String>,
    /// Paths modified by this commit.
    #[serde(default)]
    pub modified: Vec<String>,
    /// Paths removed by this commit.
    #[serde(default)]
    pub removed: Vec<String>,
}

/// Author block of a commit summary.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    /// Author display name.
    #[serde(default)]
    pub name: String,
}

/// A push notification as delivered by the webhook transport.
#[derive(Debug, Clone, Deserialize)]
pub struct PushNotification {
    /// The pushed ref (`"refs/heads/main"`).
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// The commit the ref points at after the push.
    pub after: String,
    /// Repository the push targeted.
    pub repository: RepositorySummary,
    /// Head commit, absent for some force-push shapes.
    #[serde(default)]
    pub head_commit: Option<CommitSummary>,
    /// Commits contained in the push.
    #[serde(default)]
    pub commits: Vec<CommitSummary>,
}

/// A pull-request notification as delivered by the webhook transport.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestNotification {
    /// The PR action (`"opened"`, `"synchronize"`, ...).
    pub action: String,
    /// PR number.
    pub number: u64,
    /// Repository the PR targets.
    pub repository: RepositorySummary,
    /// PR details.
    pub pull_request: PullRequestSummary,
}

/// Pull-request block of a pull-request notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    /// PR title, used as the commit message surrogate.
    #[serde(default)]
    pub title: String,
    /// PR author.
    #[serde(default)]
    pub user: Option<UserSummary>,
    /// Head of the PR branch.
    pub head: PullRequestHead,
}

/// Head block of a pull-request summary.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestHead {
    /// Head commit SHA.
    pub sha: String,
}

/// User block of a pull-request summary.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSummary {
    /// Account login.
    #[serde(default)]
    pub login: String,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Returns `true` for paths inside the workflow definitions directory.
pub fn is_workflow_path(path: &str) -> bool {
    path.starts_with(WORKFLOW_DIR) && (path.ends_with(".yml") || path.ends_with(".yaml"))
}

/// Pull-request actions that represent a content change worth analyzing.
fn is_analyzable_pr_action(action: &str) -> bool {
    matches!(action, "opened" | "synchronize" | "reopened")
}

/// Normalizes a push notification into one event per touched workflow file.
///
/// The commit SHA is the head commit id, falling back to `after` when no
/// head commit is present. `now` is the caller's clock, used when the
/// payload carries no commit timestamp.
pub fn normalize_push(
    notification: &PushNotification,
    now: DateTime<Utc>,
) -> Vec<WorkflowChangeEvent> {
    let sha = notification
        .head_commit
        .as_ref()
        .map(|c| c.id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| notification.after.clone());

    let Some(sha) = CommitSha::new(sha) else {
        // No attributable commit; nothing to analyze.
        return Vec::new();
    };

    let reference_commit = notification
        .head_commit
        .as_ref()
        .or_else(|| notification.commits.last());
    let message = reference_commit
        .map(|c| c.message.clone())
        .unwrap_or_default();
    let author = reference_commit
        .and_then(|c| c.author.as_ref())
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let timestamp = reference_commit
        .and_then(|c| c.timestamp)
        .unwrap_or(now);

    let mut paths: Vec<&str> = Vec::new();
    let commits: Vec<&CommitSummary> = if notification.commits.is_empty() {
        notification.head_commit.iter().collect()
    } else {
        notification.commits.iter().collect()
    };
    for commit in commits {
        for path in commit
            .added
            .iter()
            .chain(commit.modified.iter())
            .chain(commit.removed.iter())
        {
            if is_workflow_path(path) && !paths.contains(&path.as_str()) {
                paths.push(path);
            }
        }
    }

    build_events(
        &notification.repository,
        &paths,
        &notification.git_ref,
        &sha,
        &message,
        &author,
        ChangeEventType::Push,
        timestamp,
    )
}

/// Normalizes a pull-request notification into one event per touched
/// workflow file.
///
/// `changed_files` is the PR's changed-path list, obtained by the caller
/// from the read API. The workflow ref is synthesized as the PR head
/// reference (`refs/pull/{number}/head`), so fetches see the PR's content.
pub fn normalize_pull_request(
    notification: &PullRequestNotification,
    changed_files: &[String],
    now: DateTime<Utc>,
) -> Vec<WorkflowChangeEvent> {
    if !is_analyzable_pr_action(&notification.action) {
        return Vec::new();
    }

    let Some(sha) = CommitSha::new(notification.pull_request.head.sha.clone()) else {
        return Vec::new();
    };

    let mut paths: Vec<&str> = Vec::new();
    for path in changed_files {
        if is_workflow_path(path) && !paths.contains(&path.as_str()) {
            paths.push(path);
        }
    }

    let author = notification
        .pull_request
        .user
        .as_ref()
        .map(|u| u.login.clone())
        .unwrap_or_default();
    let head_ref = format!("refs/pull/{}/head", notification.number);

    build_events(
        &notification.repository,
        &paths,
        &head_ref,
        &sha,
        &notification.pull_request.title,
        &author,
        ChangeEventType::PullRequest,
        now,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_events(
    repository: &RepositorySummary,
    paths: &[&str],
    git_ref: &str,
    sha: &CommitSha,
    message: &str,
    author: &str,
    event_type: ChangeEventType,
    timestamp: DateTime<Utc>,
) -> Vec<WorkflowChangeEvent> {
    let (Some(full_name), Some(git_ref)) = (
        RepositoryId::new(repository.full_name.clone()),
        GitRef::new(git_ref),
    ) else {
        return Vec::new();
    };

    paths
        .iter()
        .filter_map(|path| WorkflowPath::new(*path))
        .map(|path| WorkflowChangeEvent {
            repository: Repository {
                owner: repository.owner_id(),
                name: repository.name.clone(),
                full_name: full_name.clone(),
            },
            workflow: WorkflowRef {
                path,
                git_ref: git_ref.clone(),
            },
            commit: CommitInfo {
                sha: sha.clone(),
                message: message.to_string(),
                author: author.to_string(),
            },
            event_type,
            timestamp,
        })
        .collect()
}
