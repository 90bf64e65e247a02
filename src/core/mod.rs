pub mod diff_parser;
pub mod context;
pub mod event;
pub mod diff_source;
pub mod filter;
pub mod prompt;
pub mod comment;
pub mod publisher;
pub mod pipeline;

pub use diff_parser::{DiffFile, DiffHunk, DiffParser};
pub use context::PullRequestContext;
pub use event::{EventKind, PullRequestEvent};
pub use diff_source::DiffSource;
pub use filter::ExcludeFilter;
pub use prompt::PromptBuilder;
pub use comment::{CommentMapper, ReviewComment};
pub use publisher::ReviewPublisher;
pub use pipeline::{PipelineSettings, ReviewPipeline, RunOutcome};
