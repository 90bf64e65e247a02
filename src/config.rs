use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static CONFIG_FILE_NAMES: [&str; 2] = [".pr-reviewer.yml", ".pr-reviewer.yaml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiVendor {
    OpenAi,
    Google,
}

impl AiVendor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(AiVendor::OpenAi),
            "google" => Some(AiVendor::Google),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github_token: Option<String>,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Raw vendor name; resolved once when the model client is built.
    pub ai_vendor: Option<String>,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_api_model: String,

    pub openai_base_url: Option<String>,

    pub google_api_key: Option<String>,

    #[serde(default = "default_google_model")]
    pub google_model: String,

    pub google_base_url: Option<String>,

    #[serde(default)]
    pub review_enabled: bool,

    /// Comma-separated exclusion globs.
    #[serde(default)]
    pub exclude: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: default_github_api_url(),
            ai_vendor: None,
            openai_api_key: None,
            openai_api_model: default_openai_model(),
            openai_base_url: None,
            google_api_key: None,
            google_model: default_google_model(),
            google_base_url: None,
            review_enabled: false,
            exclude: String::new(),
        }
    }
}

impl Config {
    /// Loads the optional config file and applies environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let file_config = match explicit_path {
            Some(path) => Self::load_from(path)?,
            None => match Self::discover() {
                Some(path) => Self::load_from(&path)?,
                None => Config::default(),
            },
        };

        Ok(Self::from_lookup(file_config, |key| std::env::var(key).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = CONFIG_FILE_NAMES.iter().map(PathBuf::from);
        let home = dirs::home_dir()
            .into_iter()
            .flat_map(|home| CONFIG_FILE_NAMES.iter().map(move |name| home.join(name)));
        local.chain(home).find(|path| path.exists())
    }

    /// Overlays `base` with values found through `lookup`.
    ///
    /// Every option is looked up as the action input `INPUT_<NAME>` first and
    /// then as `<NAME>`. Empty values are treated as unset.
    pub fn from_lookup<F>(base: Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let input_key = format!("INPUT_{}", name.to_ascii_uppercase());
            lookup(&input_key)
                .or_else(|| lookup(name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = base;
        if let Some(token) = get("GITHUB_TOKEN") {
            config.github_token = Some(token);
        }
        if let Some(url) = get("GITHUB_API_URL") {
            config.github_api_url = url;
        }
        if let Some(vendor) = get("AI_VENDOR") {
            config.ai_vendor = Some(vendor);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_API_MODEL") {
            config.openai_api_model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = Some(url);
        }
        if let Some(key) = get("GOOGLE_GENERATIVE_AI_API_KEY") {
            config.google_api_key = Some(key);
        }
        if let Some(model) = get("GOOGLE_GENERATIVE_AI_MODEL") {
            config.google_model = model;
        }
        if let Some(url) = get("GOOGLE_GENERATIVE_AI_BASE_URL") {
            config.google_base_url = Some(url);
        }
        if let Some(enabled) = get("REVIEW_ENABLED") {
            config.review_enabled = !enabled.eq_ignore_ascii_case("false");
        }
        if let Some(exclude) = get("exclude") {
            config.exclude = exclude;
        }
        config
    }

    /// One-line description for the startup log, with secrets masked.
    pub fn redacted_summary(&self) -> String {
        fn mask(secret: &Option<String>) -> &'static str {
            if secret.is_some() {
                "set"
            } else {
                "unset"
            }
        }

        format!(
            "review_enabled={} ai_vendor={} openai_model={} google_model={} github_api_url={} github_token={} openai_api_key={} google_api_key={} exclude={:?}",
            self.review_enabled,
            self.ai_vendor.as_deref().unwrap_or("<unset>"),
            self.openai_api_model,
            self.google_model,
            self.github_api_url,
            mask(&self.github_token),
            mask(&self.openai_api_key),
            mask(&self.google_api_key),
            self.exclude,
        )
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_google_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(Config::default(), lookup(&[]));
        assert!(!config.review_enabled);
        assert_eq!(config.google_model, "gemini-1.5-flash");
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert!(config.ai_vendor.is_none());
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_action_inputs_take_precedence() {
        let config = Config::from_lookup(
            Config::default(),
            lookup(&[
                ("INPUT_AI_VENDOR", "google"),
                ("AI_VENDOR", "openai"),
                ("INPUT_EXCLUDE", "*.md, dist/**"),
                ("OPENAI_API_MODEL", "gpt-4o"),
                ("INPUT_GOOGLE_GENERATIVE_AI_MODEL", ""),
            ]),
        );
        assert_eq!(config.ai_vendor.as_deref(), Some("google"));
        assert_eq!(config.exclude, "*.md, dist/**");
        assert_eq!(config.openai_api_model, "gpt-4o");
        assert_eq!(config.google_model, "gemini-1.5-flash");
    }

    #[test]
    fn test_review_enabled_values() {
        let enabled = |value: &str| {
            Config::from_lookup(Config::default(), lookup(&[("REVIEW_ENABLED", value)]))
                .review_enabled
        };
        assert!(enabled("true"));
        assert!(enabled("yes"));
        assert!(!enabled("false"));
        assert!(!enabled("FALSE"));
    }

    #[test]
    fn test_vendor_parsing() {
        assert_eq!(AiVendor::parse("OpenAI"), Some(AiVendor::OpenAi));
        assert_eq!(AiVendor::parse(" google "), Some(AiVendor::Google));
        assert_eq!(AiVendor::parse("anthropic"), None);
    }

    #[test]
    fn test_load_from_yaml_then_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ai_vendor: openai\nopenai_api_model: gpt-4-1106-preview\nreview_enabled: true\nexclude: \"*.lock\""
        )
        .unwrap();

        let base = Config::load_from(file.path()).unwrap();
        assert!(base.review_enabled);
        assert_eq!(base.google_model, "gemini-1.5-flash");

        let config = Config::from_lookup(base, lookup(&[("REVIEW_ENABLED", "false")]));
        assert_eq!(config.ai_vendor.as_deref(), Some("openai"));
        assert_eq!(config.openai_api_model, "gpt-4-1106-preview");
        assert_eq!(config.exclude, "*.lock");
        assert!(!config.review_enabled);
    }

    #[test]
    fn test_redacted_summary_hides_secrets() {
        let mut config = Config::default();
        config.github_token = Some("ghp_secret".to_string());
        config.openai_api_key = Some("sk-secret".to_string());

        let summary = config.redacted_summary();
        assert!(!summary.contains("ghp_secret"));
        assert!(!summary.contains("sk-secret"));
        assert!(summary.contains("github_token=set"));
        assert!(summary.contains("google_api_key=unset"));
    }
}
