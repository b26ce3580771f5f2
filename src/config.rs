//! Run configuration.
//!
//! A [`Config`] is built once per invocation and handed to each component by
//! reference. Values are layered: built-in defaults, then an optional YAML
//! file, then credentials from the environment (a `.env` file is loaded
//! first), then CLI overrides applied by the binaries.
//!
//! ```yaml
//! llm:
//!   model: claude-sonnet-4-5-20250929
//!   timeout_secs: 300
//! wechat:
//!   author: Tech Digest
//! digest:
//!   output_dir: output
//!   history_days: 7
//!   two_stage: true
//! cover:
//!   font_paths: [/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc]
//! ```

use crate::error::{DigestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const WECHAT_APP_ID: &str = "WECHAT_APP_ID";
pub const WECHAT_APP_SECRET: &str = "WECHAT_APP_SECRET";

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Everything one run needs to know.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub wechat: WeChatConfig,
    pub digest: DigestConfig,
    pub cover: CoverConfig,
}

/// LLM endpoint and request sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Read from `ANTHROPIC_API_KEY`, never from the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Token budget for a single web-search call.
    pub search_max_tokens: u32,
    /// Token budget for the compose and HTML calls.
    pub compose_max_tokens: u32,
    pub timeout_secs: u64,
    /// Extra attempts on transport errors, per HTTP call.
    pub transport_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            search_max_tokens: 4096,
            compose_max_tokens: 16384,
            timeout_secs: 300,
            transport_retries: 2,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or(DigestError::MissingCredential(ANTHROPIC_API_KEY))
    }
}

/// Publishing platform endpoint and article metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeChatConfig {
    #[serde(skip)]
    pub app_id: Option<String>,
    #[serde(skip)]
    pub app_secret: Option<String>,
    pub base_url: String,
    pub author: String,
    /// Short description shown under the title in the article list.
    pub summary: String,
    /// Article title is `<title_prefix> MM.DD`.
    pub title_prefix: String,
}

impl Default for WeChatConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            base_url: "https://api.weixin.qq.com/".to_string(),
            author: "Tech Digest".to_string(),
            summary: "每日技术趋势精选".to_string(),
            title_prefix: "Tech Digest".to_string(),
        }
    }
}

/// Application id and secret, present only when both are configured.
#[derive(Clone)]
pub struct WeChatCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl std::fmt::Debug for WeChatCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeChatCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

impl WeChatConfig {
    pub fn credentials(&self) -> Option<WeChatCredentials> {
        match (&self.app_id, &self.app_secret) {
            (Some(app_id), Some(app_secret)) => Some(WeChatCredentials {
                app_id: app_id.clone(),
                app_secret: app_secret.clone(),
            }),
            _ => None,
        }
    }
}

/// Composition and persistence knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestConfig {
    pub output_dir: PathBuf,
    /// How many previous days feed the dedup context.
    pub history_days: u32,
    /// Generation attempts before giving up on the markup.
    pub max_attempts: usize,
    /// Markup shorter than this counts as a failed attempt.
    pub min_markup_chars: usize,
    /// Markdown and HTML in two separate calls instead of one.
    pub two_stage: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            history_days: 7,
            max_attempts: 3,
            min_markup_chars: 500,
            two_stage: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Candidate font files (TTF or TTC); the first one that loads is used.
    pub font_paths: Vec<PathBuf>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            font_paths: vec![
                PathBuf::from("/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc"),
                PathBuf::from("/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc"),
                PathBuf::from("/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc"),
                PathBuf::from("/System/Library/Fonts/PingFang.ttc"),
                PathBuf::from("C:\\Windows\\Fonts\\msyh.ttc"),
            ],
        }
    }
}

impl Config {
    /// Parse a YAML document; missing sections and fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load `.env`, the config file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_yaml_str(&std::fs::read_to_string(path)?)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                info!(path = DEFAULT_CONFIG_FILE, "Loading configuration file");
                Self::from_yaml_str(&std::fs::read_to_string(DEFAULT_CONFIG_FILE)?)?
            }
            None => {
                debug!("No configuration file; using defaults");
                Self::default()
            }
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Fill credentials from the environment. Blank values count as unset.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        self.llm.api_key = lookup(ANTHROPIC_API_KEY);
        self.wechat.app_id = lookup(WECHAT_APP_ID);
        self.wechat.app_secret = lookup(WECHAT_APP_SECRET);
    }

    pub fn validate(&self) -> Result<()> {
        if self.digest.max_attempts == 0 {
            return Err(DigestError::InvalidConfig {
                field: "digest.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("llm.base_url", &self.llm.base_url),
            ("wechat.base_url", &self.wechat.base_url),
        ] {
            url::Url::parse(value).map_err(|e| DigestError::InvalidConfig {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_correct() {
        let config = Config::default();
        assert_eq!(config.digest.max_attempts, 3);
        assert_eq!(config.digest.min_markup_chars, 500);
        assert_eq!(config.digest.history_days, 7);
        assert_eq!(config.digest.output_dir, PathBuf::from("output"));
        assert!(config.digest.two_stage);
        assert!(config.llm.api_key.is_none());
        assert!(config.wechat.credentials().is_none());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml_str("digest:\n  history_days: 3\nllm:\n  model: test-model\n")
            .unwrap();
        assert_eq!(config.digest.history_days, 3);
        assert_eq!(config.digest.max_attempts, 3);
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.search_max_tokens, 4096);
    }

    #[test]
    fn yaml_cannot_set_secrets() {
        let config = Config::from_yaml_str("llm:\n  api_key: leaked\n").unwrap();
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn env_fills_credentials() {
        let mut config = Config::default();
        config.apply_env(env_of(&[
            (ANTHROPIC_API_KEY, "sk-test"),
            (WECHAT_APP_ID, "wx123"),
            (WECHAT_APP_SECRET, "secret"),
        ]));
        assert_eq!(config.llm.api_key().unwrap(), "sk-test");
        let creds = config.wechat.credentials().unwrap();
        assert_eq!(creds.app_id, "wx123");
        let debug = format!("{creds:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn blank_or_partial_wechat_env_disables_publishing() {
        let mut config = Config::default();
        config.apply_env(env_of(&[(WECHAT_APP_ID, "wx123"), (WECHAT_APP_SECRET, "  ")]));
        assert!(config.wechat.credentials().is_none());
        assert!(matches!(
            config.llm.api_key(),
            Err(DigestError::MissingCredential(ANTHROPIC_API_KEY))
        ));
    }

    #[test]
    fn load_with_env_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.yaml");
        std::fs::write(&path, "digest:\n  max_attempts: 5\n").unwrap();
        let config =
            Config::load_with_env(Some(&path), env_of(&[(ANTHROPIC_API_KEY, "k")])).unwrap();
        assert_eq!(config.digest.max_attempts, 5);
        assert_eq!(config.llm.api_key().unwrap(), "k");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = Config::default();
        config.digest.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(DigestError::InvalidConfig { .. })
        ));
    }
}
