use crate::adapters::PullRequestHost;
use crate::core::{PullRequestContext, ReviewComment};
use tracing::{error, info};

/// Posts the comments of one hunk as a single advisory review.
pub struct ReviewPublisher<'a> {
    host: &'a dyn PullRequestHost,
    dry_run: bool,
}

impl<'a> ReviewPublisher<'a> {
    pub fn new(host: &'a dyn PullRequestHost, dry_run: bool) -> Self {
        Self { host, dry_run }
    }

    /// Returns `false` when the host rejected the review. Failures are
    /// logged and never propagated.
    pub async fn publish(&self, pr: &PullRequestContext, comments: &[ReviewComment]) -> bool {
        if comments.is_empty() {
            return true;
        }

        if self.dry_run {
            for comment in comments {
                info!("[dry run] {}:{} {}", comment.path, comment.line, comment.body);
            }
            return true;
        }

        match self.host.create_review(pr, comments).await {
            Ok(()) => {
                info!(
                    "Posted review with {} comment(s) to {}/{}#{}",
                    comments.len(),
                    pr.owner,
                    pr.repo,
                    pr.number
                );
                true
            }
            Err(err) => {
                error!("Failed to create review: {:#}", err);
                false
            }
        }
    }
}
