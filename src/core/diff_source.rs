use crate::adapters::PullRequestHost;
use crate::core::{EventKind, PullRequestEvent};
use anyhow::{Context, Result};
use tracing::info;

/// Picks the diff to review for a pull-request event.
pub struct DiffSource<'a> {
    host: &'a dyn PullRequestHost,
}

impl<'a> DiffSource<'a> {
    pub fn new(host: &'a dyn PullRequestHost) -> Self {
        Self { host }
    }

    /// `opened` reviews the whole pull request, `synchronize` only the
    /// commits of the push. Other actions and empty diffs yield `None`.
    pub async fn fetch(&self, event: &PullRequestEvent) -> Result<Option<String>> {
        let diff = match &event.kind {
            EventKind::Opened => {
                info!("Fetching full diff of PR #{}", event.number);
                self.host
                    .get_pull_request_diff(&event.owner, &event.repo, event.number)
                    .await
                    .context("Failed to fetch pull request diff")?
            }
            EventKind::Synchronize => {
                let base = event
                    .before
                    .as_deref()
                    .context("synchronize event has no `before` commit")?;
                let head = event
                    .after
                    .as_deref()
                    .context("synchronize event has no `after` commit")?;
                info!("Fetching diff of pushed commits {}...{}", base, head);
                self.host
                    .compare_commits_diff(&event.owner, &event.repo, base, head)
                    .await
                    .context("Failed to fetch commit comparison diff")?
            }
            EventKind::Other(action) => {
                info!("Unsupported event: {}", action);
                return Ok(None);
            }
        };

        if diff.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(diff))
    }
}
