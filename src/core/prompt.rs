use crate::core::{DiffFile, DiffHunk, PullRequestContext};

const INSTRUCTIONS: &str = r#"Your task is to review pull requests. Instructions:
- Provide the response in following JSON format:  {"reviews": [{"lineNumber":  <line_number>, "reviewComment": "<review comment>"}]}
- Do not give positive comments or compliments.
- Provide comments and suggestions ONLY if there is something to improve, otherwise "reviews" should be an empty array.
- Write the comment in GitHub Markdown format.
- Use the given description only for the overall context and only comment the code.
- IMPORTANT: NEVER suggest adding comments to the code.
- IMPORTANT: NEVER suggest explain the code."#;

/// Renders the per-hunk review instruction sent to the model.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build_prompt(file: &DiffFile, hunk: &DiffHunk, pr: &PullRequestContext) -> String {
        let path = file.target_path().unwrap_or_default();

        format!(
            "{INSTRUCTIONS}\n\n\
Review the following code diff in the file \"{path}\" and take the pull request title and description into account when writing the response.\n\n\
Pull request title: {title}\n\
Pull request description:\n\n\
---\n\
{description}\n\
---\n\n\
Git diff to review:\n\n\
```diff\n\
{header}\n\
{changes}\n\
```\n",
            title = pr.title,
            description = pr.description,
            header = hunk.header,
            changes = Self::format_changes(hunk),
        )
    }

    fn format_changes(hunk: &DiffHunk) -> String {
        hunk.changes
            .iter()
            .map(|change| {
                let line_no = change
                    .resolved_line_no()
                    .map(|n| n.to_string())
                    .unwrap_or_default();
                format!("{} {}", line_no, change.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
