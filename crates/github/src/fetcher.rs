//! `WorkflowFetcher` over `GET /repos/{owner}/{repo}/contents/{path}`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;

use pipeline::{ConfigurationError, FetchError, GitRef, Repository, WorkflowFetcher, WorkflowPath};

/// Request timeout for one contents-API call. Transient timeouts are retried
/// by the processor's backoff schedule, not here.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The contents API rejects requests without a User-Agent.
const USER_AGENT: &str = concat!("sprocket/", env!("CARGO_PKG_VERSION"));

/// Fetches workflow file bytes from the GitHub contents API.
pub struct GithubFetcher {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubFetcher {
    /// Builds a fetcher against `base_url` (`https://api.github.com` in
    /// production, a local stub in tests) authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ConfigurationError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                name: "http_client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl WorkflowFetcher for GithubFetcher {
    async fn fetch(
        &self,
        repository: &Repository,
        git_ref: &GitRef,
        path: &WorkflowPath,
    ) -> Result<Vec<u8>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, repository.owner, repository.name, path
        );
        tracing::debug!(%url, git_ref = %git_ref, "fetching workflow content");

        let response = self
            .http
            .get(&url)
            .query(&[("ref", git_ref.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                message: e.to_string(),
                retry_after: None,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::Transient {
                message: format!("contents API returned {status}"),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Permanent {
                status: Some(status.as_u16()),
                message: format!("contents API returned {status}"),
            });
        }

        let body: ContentsResponse =
            response.json().await.map_err(|e| FetchError::Permanent {
                status: None,
                message: format!("malformed contents response: {e}"),
            })?;
        decode_content(&body)
    }
}

/// The slice of the contents-API response this adapter reads.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

/// The API wraps file bytes in base64 with embedded line breaks.
fn decode_content(body: &ContentsResponse) -> Result<Vec<u8>, FetchError> {
    let Some(content) = body.content.as_deref() else {
        return Err(FetchError::Permanent {
            status: None,
            message: "contents response carried no content field".to_string(),
        });
    };
    match body.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = content.split_whitespace().collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| FetchError::Permanent {
                    status: None,
                    message: format!("invalid base64 content: {e}"),
                })
        }
        Some(other) => Err(FetchError::Permanent {
            status: None,
            message: format!("unsupported content encoding '{other}'"),
        }),
    }
}
