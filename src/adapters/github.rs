use crate::core::{PullRequestContext, ReviewComment};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("GitHub token not configured. Set GITHUB_TOKEN")]
    MissingToken,
}

/// Operations the review pipeline needs from the hosting service.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequestContext>;

    async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String>;

    async fn compare_commits_diff(&self, owner: &str, repo: &str, base: &str, head: &str) -> Result<String>;

    /// Submits `comments` as one advisory (`COMMENT`) review.
    async fn create_review(&self, pr: &PullRequestContext, comments: &[ReviewComment]) -> Result<()>;
}

pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct PullResponse {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Serialize)]
struct CreateReviewRequest<'a> {
    event: &'static str,
    comments: &'a [ReviewComment],
}

impl GitHubClient {
    pub fn new(token: Option<String>, base_url: impl Into<String>) -> Result<Self, GitHubError> {
        let token = token.ok_or(GitHubError::MissingToken)?;
        let client = Client::builder()
            .user_agent(concat!("pr-reviewer/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str, accept: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, GitHubError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GitHubError::Status { status, body })
    }

    async fn fetch_diff(&self, path: &str) -> Result<String, GitHubError> {
        debug!("Fetching diff from {}", path);
        let response = Self::send(self.request(reqwest::Method::GET, path, DIFF_MEDIA_TYPE)).await?;
        let diff = response.text().await?;
        debug!(diff_bytes = diff.len(), "received diff");
        Ok(diff)
    }
}

#[async_trait]
impl PullRequestHost for GitHubClient {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequestContext> {
        let path = format!("/repos/{}/{}/pulls/{}", owner, repo, number);
        let response = Self::send(self.request(reqwest::Method::GET, &path, JSON_MEDIA_TYPE)).await?;
        let pull: PullResponse = response.json().await.map_err(GitHubError::from)?;

        Ok(PullRequestContext {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
            title: pull.title.unwrap_or_default(),
            description: pull.body.unwrap_or_default(),
        })
    }

    async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String> {
        let path = format!("/repos/{}/{}/pulls/{}", owner, repo, number);
        Ok(self.fetch_diff(&path).await?)
    }

    async fn compare_commits_diff(&self, owner: &str, repo: &str, base: &str, head: &str) -> Result<String> {
        let path = format!("/repos/{}/{}/compare/{}...{}", owner, repo, base, head);
        Ok(self.fetch_diff(&path).await?)
    }

    async fn create_review(&self, pr: &PullRequestContext, comments: &[ReviewComment]) -> Result<()> {
        let path = format!("/repos/{}/{}/pulls/{}/reviews", pr.owner, pr.repo, pr.number);
        let body = CreateReviewRequest {
            event: "COMMENT",
            comments,
        };
        Self::send(
            self.request(reqwest::Method::POST, &path, JSON_MEDIA_TYPE)
                .json(&body),
        )
        .await?;
        Ok(())
    }
}
