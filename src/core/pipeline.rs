use crate::adapters::llm::ReviewModelClient;
use crate::adapters::PullRequestHost;
use crate::config::Config;
use crate::core::{
    CommentMapper, DiffFile, DiffParser, DiffSource, EventKind, ExcludeFilter, PromptBuilder,
    PullRequestContext, PullRequestEvent, ReviewComment, ReviewPublisher,
};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub review_enabled: bool,
    pub dry_run: bool,
    pub filter: ExcludeFilter,
}

impl PipelineSettings {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            review_enabled: config.review_enabled,
            dry_run,
            filter: ExcludeFilter::parse(&config.exclude),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub files_reviewed: usize,
    pub binary_files_skipped: usize,
    pub hunks_reviewed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub comments_published: usize,
    pub failed_publishes: usize,
    pub comments: Vec<ReviewComment>,
}

/// How a run ended. Every variant is a successful exit.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Disabled,
    UnsupportedEvent(String),
    NoDiff,
    Completed(ReviewSummary),
}

/// Drives one run: fetch, filter, then prompt, invoke, map and publish hunk by hunk.
pub struct ReviewPipeline<'a> {
    host: &'a dyn PullRequestHost,
    reviewer: &'a ReviewModelClient,
    settings: PipelineSettings,
}

impl<'a> ReviewPipeline<'a> {
    pub fn new(
        host: &'a dyn PullRequestHost,
        reviewer: &'a ReviewModelClient,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            host,
            reviewer,
            settings,
        }
    }

    pub async fn run(&self, event: &PullRequestEvent) -> Result<RunOutcome> {
        if !self.settings.review_enabled {
            info!("Review is disabled");
            return Ok(RunOutcome::Disabled);
        }

        if let EventKind::Other(action) = &event.kind {
            info!("Unsupported event: {}", action);
            return Ok(RunOutcome::UnsupportedEvent(action.clone()));
        }

        let pr = self
            .host
            .get_pull_request(&event.owner, &event.repo, event.number)
            .await
            .context("Failed to fetch pull request details")?;
        info!("Reviewing {}/{}#{}: {}", pr.owner, pr.repo, pr.number, pr.title);

        let Some(diff) = DiffSource::new(self.host).fetch(event).await? else {
            info!("No diff found");
            return Ok(RunOutcome::NoDiff);
        };

        let files = DiffParser::parse_unified_diff(&diff)?;
        info!("Parsed {} file diffs", files.len());

        let files = self.settings.filter.apply(files);
        debug!("{} file diffs left after exclusions", files.len());

        let summary = self.review_files(&pr, &files).await;
        info!(
            files = summary.files_reviewed,
            binary_skipped = summary.binary_files_skipped,
            added = summary.lines_added,
            removed = summary.lines_removed,
            hunks = summary.hunks_reviewed,
            published = summary.comments_published,
            failed = summary.failed_publishes,
            "review complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    async fn review_files(&self, pr: &PullRequestContext, files: &[DiffFile]) -> ReviewSummary {
        let publisher = ReviewPublisher::new(self.host, self.settings.dry_run);
        let mut summary = ReviewSummary::default();

        for file in files {
            if file.target_path().is_none() {
                info!("Skipping deleted file: {}", file.display_path());
                continue;
            }
            if file.is_binary {
                info!("Skipping binary file: {}", file.display_path());
                summary.binary_files_skipped += 1;
                continue;
            }
            summary.files_reviewed += 1;
            summary.lines_added += file.additions;
            summary.lines_removed += file.deletions;
            debug!(
                new_file = file.is_new,
                additions = file.additions,
                deletions = file.deletions,
                "Reviewing {}",
                file.display_path()
            );

            for (index, hunk) in file.hunks.iter().enumerate() {
                summary.hunks_reviewed += 1;
                debug!(
                    "Hunk {} of {}: old {}+{} new {}+{}",
                    index + 1,
                    file.display_path(),
                    hunk.old_start,
                    hunk.old_lines,
                    hunk.new_start,
                    hunk.new_lines
                );

                let prompt = PromptBuilder::build_prompt(file, hunk, pr);
                let Some(findings) = self.reviewer.generate_findings(&prompt).await else {
                    continue;
                };

                let comments = CommentMapper::map(file, &findings);
                if comments.is_empty() {
                    continue;
                }

                if publisher.publish(pr, &comments).await {
                    if !self.settings.dry_run {
                        summary.comments_published += comments.len();
                    }
                } else {
                    summary.failed_publishes += 1;
                }
                summary.comments.extend(comments);
            }
        }

        summary
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory host recording every call it receives.
    pub struct FakeHost {
        diff: String,
        fail_reviews: bool,
        calls: Mutex<Vec<String>>,
        reviews: Mutex<Vec<Vec<ReviewComment>>>,
    }

    impl FakeHost {
        pub fn with_diff(diff: &str) -> Self {
            Self {
                diff: diff.to_string(),
                fail_reviews: false,
                calls: Mutex::new(Vec::new()),
                reviews: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_reviews(mut self) -> Self {
            self.fail_reviews = true;
            self
        }

        pub fn context(&self) -> PullRequestContext {
            PullRequestContext {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                number: 5,
                title: "Add widgets".to_string(),
                description: "Adds the widget module.".to_string(),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn reviews(&self) -> Vec<Vec<ReviewComment>> {
            self.reviews.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl PullRequestHost for FakeHost {
        async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequestContext> {
            self.record(format!("pr {}/{}#{}", owner, repo, number));
            Ok(self.context())
        }

        async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String> {
            self.record(format!("pr_diff {}/{}#{}", owner, repo, number));
            Ok(self.diff.clone())
        }

        async fn compare_commits_diff(&self, owner: &str, repo: &str, base: &str, head: &str) -> Result<String> {
            self.record(format!("compare {}/{} {}...{}", owner, repo, base, head));
            Ok(self.diff.clone())
        }

        async fn create_review(&self, pr: &PullRequestContext, comments: &[ReviewComment]) -> Result<()> {
            self.record(format!(
                "review {}/{}#{} ({} comments)",
                pr.owner,
                pr.repo,
                pr.number,
                comments.len()
            ));
            if self.fail_reviews {
                anyhow::bail!("GitHub API returned 422 Unprocessable Entity");
            }
            self.reviews.lock().unwrap().push(comments.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeHost;
    use super::*;
    use crate::adapters::llm::testing::ScriptedAdapter;

    const ONE_HUNK: &str = "\
diff --git a/src/widget.rs b/src/widget.rs
--- a/src/widget.rs
+++ b/src/widget.rs
@@ -10,3 +10,4 @@
 fn build() {
+    let unused = 1;
     run();
 }
";

    const TWO_FILES: &str = "\
diff --git a/src/a.rs b/src/a.rs
--- a/src/a.rs
+++ b/src/a.rs
@@ -1,2 +1,2 @@
-let a = 1;
+let a = 2;
 done();
@@ -20,2 +20,2 @@
-let b = 1;
+let b = 2;
 done();
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-# Old
+# New
diff --git a/gone.rs b/gone.rs
deleted file mode 100644
--- a/gone.rs
+++ /dev/null
@@ -1 +0,0 @@
-fn gone() {}
";

    const WITH_BINARY: &str = "\
diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..e69de29
Binary files /dev/null and b/logo.png differ
diff --git a/src/widget.rs b/src/widget.rs
--- a/src/widget.rs
+++ b/src/widget.rs
@@ -10,3 +10,4 @@
 fn build() {
+    let unused = 1;
     run();
 }
";

    fn event(kind: EventKind) -> PullRequestEvent {
        PullRequestEvent {
            kind,
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            number: 5,
            before: Some("aaa".to_string()),
            after: Some("bbb".to_string()),
        }
    }

    fn settings(exclude: &str) -> PipelineSettings {
        PipelineSettings {
            review_enabled: true,
            dry_run: false,
            filter: ExcludeFilter::parse(exclude),
        }
    }

    fn completed(outcome: RunOutcome) -> ReviewSummary {
        match outcome {
            RunOutcome::Completed(summary) => summary,
            other => panic!("expected a completed run, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_finding_is_published() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::new(Box::new(ScriptedAdapter::new(vec![Ok(
            r#"{"reviews":[{"lineNumber":"12","reviewComment":"Unused variable"}]}"#,
        )])));

        let outcome = ReviewPipeline::new(&host, &reviewer, settings(""))
            .run(&event(EventKind::Opened))
            .await
            .unwrap();

        let summary = completed(outcome);
        assert_eq!(summary.comments_published, 1);
        assert_eq!(
            host.reviews(),
            vec![vec![ReviewComment {
                path: "src/widget.rs".to_string(),
                line: 12,
                body: "Unused variable".to_string(),
            }]]
        );
        assert_eq!(
            host.calls(),
            vec![
                "pr acme/widgets#5",
                "pr_diff acme/widgets#5",
                "review acme/widgets#5 (1 comments)",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_reviews_publish_nothing() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::new(Box::new(ScriptedAdapter::new(vec![Ok(r#"{"reviews":[]}"#)])));

        let summary = completed(
            ReviewPipeline::new(&host, &reviewer, settings(""))
                .run(&event(EventKind::Opened))
                .await
                .unwrap(),
        );

        assert_eq!(summary.hunks_reviewed, 1);
        assert_eq!(summary.comments_published, 0);
        assert!(host.reviews().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_moves_on_to_next_hunk() {
        let host = FakeHost::with_diff(TWO_FILES);
        let adapter = ScriptedAdapter::new(vec![
            Err("model unavailable"),
            Ok(r#"{"reviews":[{"lineNumber":"20","reviewComment":"Magic number"}]}"#),
        ]);
        let reviewer = ReviewModelClient::new(Box::new(adapter));

        let summary = completed(
            ReviewPipeline::new(&host, &reviewer, settings("*.md"))
                .run(&event(EventKind::Opened))
                .await
                .unwrap(),
        );

        assert_eq!(summary.files_reviewed, 1);
        assert_eq!(summary.hunks_reviewed, 2);
        assert_eq!(summary.comments_published, 1);
        assert_eq!(host.reviews()[0][0].line, 20);
    }

    #[tokio::test]
    async fn test_excluded_and_deleted_files_never_reach_the_model() {
        let host = FakeHost::with_diff(TWO_FILES);
        let adapter = ScriptedAdapter::new(Vec::new());
        let prompts = adapter.prompt_log();
        let reviewer = ReviewModelClient::new(Box::new(adapter));

        ReviewPipeline::new(&host, &reviewer, settings("*.md"))
            .run(&event(EventKind::Opened))
            .await
            .unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.contains("in the file \"src/a.rs\"")));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_the_run() {
        let host = FakeHost::with_diff(TWO_FILES).failing_reviews();
        let reviewer = ReviewModelClient::new(Box::new(ScriptedAdapter::new(vec![
            Ok(r#"{"reviews":[{"lineNumber":"1","reviewComment":"x"}]}"#),
            Ok(r#"{"reviews":[{"lineNumber":"20","reviewComment":"y"}]}"#),
        ])));

        let summary = completed(
            ReviewPipeline::new(&host, &reviewer, settings("*.md"))
                .run(&event(EventKind::Opened))
                .await
                .unwrap(),
        );

        assert_eq!(summary.failed_publishes, 2);
        assert_eq!(summary.comments_published, 0);
        assert_eq!(summary.comments.len(), 2);
    }

    #[tokio::test]
    async fn test_synchronize_reviews_only_pushed_commits() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::new(Box::new(ScriptedAdapter::new(Vec::new())));

        ReviewPipeline::new(&host, &reviewer, settings(""))
            .run(&event(EventKind::Synchronize))
            .await
            .unwrap();

        assert_eq!(host.calls()[1], "compare acme/widgets aaa...bbb");
    }

    #[tokio::test]
    async fn test_unsupported_event_makes_no_calls() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::unconfigured();

        let outcome = ReviewPipeline::new(&host, &reviewer, settings(""))
            .run(&event(EventKind::Other("labeled".to_string())))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::UnsupportedEvent("labeled".to_string()));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_push_event_document_is_unsupported() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::unconfigured();
        let push = PullRequestEvent::from_json(
            r#"{"ref":"refs/heads/main","before":"a","after":"b","repository":{"name":"widgets","owner":{"login":"acme"}}}"#,
        )
        .unwrap();

        let outcome = ReviewPipeline::new(&host, &reviewer, settings(""))
            .run(&push)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::UnsupportedEvent("unknown".to_string()));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_binary_files_are_skipped_and_lines_counted() {
        let host = FakeHost::with_diff(WITH_BINARY);
        let adapter = ScriptedAdapter::new(Vec::new());
        let prompts = adapter.prompt_log();
        let reviewer = ReviewModelClient::new(Box::new(adapter));

        let summary = completed(
            ReviewPipeline::new(&host, &reviewer, settings(""))
                .run(&event(EventKind::Opened))
                .await
                .unwrap(),
        );

        assert_eq!(summary.binary_files_skipped, 1);
        assert_eq!(summary.files_reviewed, 1);
        assert_eq!(summary.lines_added, 1);
        assert_eq!(summary.lines_removed, 0);
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_review_makes_no_calls() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::unconfigured();
        let mut disabled = settings("");
        disabled.review_enabled = false;

        let outcome = ReviewPipeline::new(&host, &reviewer, disabled)
            .run(&event(EventKind::Opened))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Disabled);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_diff_ends_run() {
        let host = FakeHost::with_diff("");
        let reviewer = ReviewModelClient::unconfigured();

        let outcome = ReviewPipeline::new(&host, &reviewer, settings(""))
            .run(&event(EventKind::Opened))
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::NoDiff);
    }

    #[tokio::test]
    async fn test_dry_run_collects_without_publishing() {
        let host = FakeHost::with_diff(ONE_HUNK);
        let reviewer = ReviewModelClient::new(Box::new(ScriptedAdapter::new(vec![Ok(
            r#"{"reviews":[{"lineNumber":"11","reviewComment":"Remove"}]}"#,
        )])));
        let mut dry = settings("");
        dry.dry_run = true;

        let summary = completed(
            ReviewPipeline::new(&host, &reviewer, dry)
                .run(&event(EventKind::Opened))
                .await
                .unwrap(),
        );

        assert_eq!(summary.comments.len(), 1);
        assert_eq!(summary.comments_published, 0);
        assert!(host.reviews().is_empty());
    }
}
