use crate::core::DiffFile;
use glob::{MatchOptions, Pattern};
use tracing::{info, warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Drops diff files whose target path matches any exclusion glob.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Pattern>,
}

impl ExcludeFilter {
    /// Builds a filter from a comma-separated pattern list.
    pub fn parse(list: &str) -> Self {
        Self::from_patterns(list.split(','))
    }

    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|raw| {
                let raw = raw.as_ref().trim();
                if raw.is_empty() {
                    return None;
                }
                match Pattern::new(raw) {
                    Ok(pattern) => Some(pattern),
                    Err(err) => {
                        warn!("Ignoring invalid exclude pattern {:?}: {}", raw, err);
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }

    pub fn apply(&self, files: Vec<DiffFile>) -> Vec<DiffFile> {
        files
            .into_iter()
            .filter(|file| {
                let excluded = self.is_excluded(file.target_path().unwrap_or_default());
                if excluded {
                    info!("Skipping excluded file: {}", file.display_path());
                }
                !excluded
            })
            .collect()
    }
}
