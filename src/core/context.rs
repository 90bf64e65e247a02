use serde::{Deserialize, Serialize};

/// Pull request metadata shared read-only by every hunk of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestContext {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub description: String,
}
