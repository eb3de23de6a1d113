use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::llm::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub author: AuthorConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>, // For OpenAI-compatible APIs

    /// Optional: Override max_tokens for LLM requests
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: Some("GPT_KEY".to_string()),
            base_url: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Get max_tokens value, using provider-specific default if not specified
    pub fn get_max_tokens(&self) -> u32 {
        if let Some(tokens) = self.max_tokens {
            return tokens;
        }

        match self.provider.as_str() {
            "openai-compatible" => 16384, // ollama and similar
            _ => 4096,
        }
    }
}

fn default_llm_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// "classified" (bounded, backoff + jitter) or "legacy" (fixed 15s, forever)
    #[serde(default = "default_retry_mode")]
    pub mode: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Fraction of the computed delay added as random jitter (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: default_retry_mode(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        match self.mode.trim().to_lowercase().as_str() {
            "legacy" => Ok(RetryPolicy::legacy()),
            "classified" => Ok(RetryPolicy::classified(
                self.max_attempts,
                std::time::Duration::from_millis(self.base_delay_ms),
                std::time::Duration::from_millis(self.max_delay_ms),
                self.jitter,
            )),
            other => bail!("Unknown retry mode: {} (expected classified or legacy)", other),
        }
    }
}

fn default_retry_mode() -> String {
    "classified".to_string()
}

fn default_max_attempts() -> u32 {
    6
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.25
}

/// Identity strings used in generated README/package.json text
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthorConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub org_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// GraphQL node id of the owning user/org (used for createRepository)
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub username: String,
    /// PUBLIC, PRIVATE or INTERNAL
    #[serde(default = "default_visibility")]
    pub visibility: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            username: String::new(),
            visibility: default_visibility(),
        }
    }
}

impl GithubConfig {
    pub fn normalized_visibility(&self) -> Result<String> {
        let upper = self.visibility.trim().to_uppercase();
        match upper.as_str() {
            "PUBLIC" | "PRIVATE" | "INTERNAL" => Ok(upper),
            other => bail!("Unknown repository visibility: {}", other),
        }
    }

    pub fn repo_url(&self, package: &str) -> String {
        format!("https://github.com/{}/{}", self.username, package)
    }
}

fn default_visibility() -> String {
    "PUBLIC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Run `npm publish` after pushing
    #[serde(default)]
    pub npm: bool,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            npm: false,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_command_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_published_dir")]
    pub published_dir: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schemas_dir: default_schemas_dir(),
            staging_dir: default_staging_dir(),
            published_dir: default_published_dir(),
            state_dir: default_state_dir(),
        }
    }
}

impl PathsConfig {
    /// Resolve every relative path against `root`
    pub fn rooted_at(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            schemas_dir: join(&self.schemas_dir),
            staging_dir: join(&self.staging_dir),
            published_dir: join(&self.published_dir),
            state_dir: join(&self.state_dir),
        }
    }
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("hero_modules")
}

fn default_published_dir() -> PathBuf {
    PathBuf::from("published_hero_modules")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".herogen/state")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Pause between two function generations
    #[serde(default = "default_function_delay")]
    pub function_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            function_delay_ms: default_function_delay(),
        }
    }
}

fn default_function_delay() -> u64 {
    2_000
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load config from the working directory or user config directory
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path);
        }

        if let Ok(config) = Self::load_from_path("herogen.toml") {
            debug!("Loaded config from ./herogen.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("herogen").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply the legacy environment variable names on top of file config.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("GPT_MODEL") {
            debug!("Env override: model = {}", model);
            self.llm.model = model;
        }
        let string_fields: [(&str, &mut String); 7] = [
            ("AUTHOR_NAME", &mut self.author.name),
            ("AUTHOR_URL", &mut self.author.url),
            ("AUTHOR_ORG_NAME", &mut self.author.org_name),
            ("AUTHOR_ORG_URL", &mut self.author.org_url),
            ("GITHUB_OWNER_ID", &mut self.github.owner_id),
            ("GITHUB_USERNAME", &mut self.github.username),
            ("REPO_VISIBILITY", &mut self.github.visibility),
        ];
        for (key, field) in string_fields {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
        if let Some(raw) = lookup("SHOULD_PUBLISH_TO_NPM") {
            match parse_bool(&raw) {
                Some(flag) => self.publish.npm = flag,
                None => bail!("SHOULD_PUBLISH_TO_NPM must be a boolean, got {:?}", raw),
            }
        }
        Ok(())
    }

    /// Get API key from environment variable specified in config
    pub fn get_api_key(&self) -> Result<String> {
        match &self.llm.api_key_env {
            Some(env_var) => {
                // Special case: "none" means no API key needed (e.g., Ollama)
                if env_var.to_lowercase() == "none" {
                    return Ok(String::new());
                }

                if self.llm.provider == "openai-compatible" {
                    return Ok(env::var(env_var).unwrap_or_default());
                }

                env::var(env_var).map_err(|_| {
                    anyhow::anyhow!("API key not found in environment variable: {}", env_var)
                })
            }
            None => Ok(String::new()),
        }
    }

    /// Settings the publisher needs before it touches GitHub.
    pub fn check_publish_identity(&self) -> Result<()> {
        if self.github.username.trim().is_empty() {
            bail!("github.username (GITHUB_USERNAME) is not set");
        }
        if self.github.owner_id.trim().is_empty() {
            bail!("github.owner_id (GITHUB_OWNER_ID) is not set");
        }
        self.github.normalized_visibility()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.api_key_env, Some("GPT_KEY".to_string()));
        assert_eq!(config.paths.staging_dir, PathBuf::from("hero_modules"));
        assert_eq!(
            config.paths.published_dir,
            PathBuf::from("published_hero_modules")
        );
        assert!(!config.publish.npm);
        assert_eq!(config.generation.function_delay_ms, 2000);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("provider = \"openai\""));
        assert!(toml_str.contains("GPT_KEY"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[author]
name = "Ada"

[publish]
npm = true
"#,
        )
        .unwrap();
        assert_eq!(config.author.name, "Ada");
        assert!(config.publish.npm);
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.retry.mode, "classified");
        assert_eq!(config.github.visibility, "PUBLIC");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GPT_MODEL", "gpt-4o"),
            ("AUTHOR_NAME", "Ada"),
            ("AUTHOR_ORG_URL", "https://example.org"),
            ("GITHUB_USERNAME", "ada"),
            ("REPO_VISIBILITY", "private"),
            ("SHOULD_PUBLISH_TO_NPM", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.author.name, "Ada");
        assert_eq!(config.author.org_url, "https://example.org");
        assert_eq!(config.github.username, "ada");
        assert_eq!(config.github.normalized_visibility().unwrap(), "PRIVATE");
        assert!(config.publish.npm);
        // untouched
        assert_eq!(config.author.url, "");
    }

    #[test]
    fn test_env_override_bad_bool() {
        let mut config = Config::default();
        let result = config.apply_overrides_from(|k| {
            (k == "SHOULD_PUBLISH_TO_NPM").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_visibility_rejected() {
        let mut config = Config::default();
        config.github.visibility = "secret".to_string();
        assert!(config.github.normalized_visibility().is_err());
    }

    #[test]
    fn test_check_publish_identity() {
        let mut config = Config::default();
        assert!(config.check_publish_identity().is_err());
        config.github.username = "ada".to_string();
        config.github.owner_id = "MDQ6VXNlcjE=".to_string();
        assert!(config.check_publish_identity().is_ok());
    }

    #[test]
    fn test_paths_rooted_at() {
        let paths = PathsConfig::default().rooted_at(Path::new("/work"));
        assert_eq!(paths.schemas_dir, PathBuf::from("/work/schemas"));
        assert_eq!(paths.state_dir, PathBuf::from("/work/.herogen/state"));
    }

    #[test]
    fn test_retry_config_to_policy() {
        let mut retry = RetryConfig::default();
        assert_eq!(retry.to_policy().unwrap().max_attempts, Some(6));
        retry.mode = "legacy".to_string();
        assert_eq!(retry.to_policy().unwrap().max_attempts, None);
    }

    #[test]
    fn test_unknown_retry_mode_rejected() {
        let mut retry = RetryConfig::default();
        retry.mode = "legcy".to_string();
        assert!(retry.to_policy().is_err());
    }

    #[test]
    #[serial]
    fn test_api_key_from_env() {
        env::set_var("HEROGEN_TEST_API_KEY", "test_key_123");
        let mut config = Config::default();
        config.llm.api_key_env = Some("HEROGEN_TEST_API_KEY".to_string());

        let api_key = config.get_api_key().unwrap();
        assert_eq!(api_key, "test_key_123");

        env::remove_var("HEROGEN_TEST_API_KEY");
    }

    #[test]
    #[serial]
    fn test_api_key_missing_fails() {
        let mut config = Config::default();
        config.llm.api_key_env = Some("HEROGEN_NONEXISTENT_KEY_XYZ".to_string());
        assert!(config.get_api_key().is_err());
    }

    #[test]
    fn test_api_key_none_for_ollama() {
        let mut config = Config::default();
        config.llm.api_key_env = Some("none".to_string());
        assert_eq!(config.get_api_key().unwrap(), "");
    }
}
