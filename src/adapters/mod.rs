pub mod github;
pub mod llm;
pub mod openai;
pub mod google;

pub use github::{GitHubClient, PullRequestHost};
pub use openai::OpenAIAdapter;
pub use google::GoogleAdapter;
