use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// The pull-request action that triggered the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Opened,
    Synchronize,
    Other(String),
}

impl EventKind {
    pub fn from_action(action: &str) -> Self {
        match action {
            "opened" => EventKind::Opened,
            "synchronize" => EventKind::Synchronize,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

/// Coordinates of the pull request plus the commit range of a push.
///
/// Events of an unsupported kind carry whatever coordinates the document had;
/// `owner` and `repo` may be empty and `number` zero.
#[derive(Debug, Clone)]
pub struct PullRequestEvent {
    pub kind: EventKind,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    action: Option<String>,
    number: Option<u64>,
    pull_request: Option<RawPullRequest>,
    repository: Option<RawRepository>,
    before: Option<String>,
    after: Option<String>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: Option<u64>,
}

#[derive(Deserialize)]
struct RawRepository {
    name: String,
    owner: RawOwner,
}

#[derive(Deserialize)]
struct RawOwner {
    login: String,
}

impl PullRequestEvent {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawEvent =
            serde_json::from_str(content).context("Failed to parse event document")?;

        let kind = match raw.action.as_deref() {
            Some(action) => EventKind::from_action(action),
            None => EventKind::Other("unknown".to_string()),
        };
        let number = raw
            .number
            .or_else(|| raw.pull_request.and_then(|pr| pr.number));

        let (owner, repo, number) = if kind.is_supported() {
            let repository = raw
                .repository
                .context("Event document has no repository")?;
            let number = number.context("Event document has no pull request number")?;
            (repository.owner.login, repository.name, number)
        } else {
            let (owner, repo) = raw
                .repository
                .map(|repository| (repository.owner.login, repository.name))
                .unwrap_or_default();
            (owner, repo, number.unwrap_or_default())
        };

        Ok(Self {
            kind,
            owner,
            repo,
            number,
            before: raw.before.filter(|sha| !sha.is_empty()),
            after: raw.after.filter(|sha| !sha.is_empty()),
        })
    }
}
