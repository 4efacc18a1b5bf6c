// src/ingest/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IngestError, Result};

pub const ENV_CONFIG_PATH: &str = "HERBERT_CONFIG_PATH";
pub const ENV_YT_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_YT_CHANNEL_ID: &str = "HERBERT_YT_CHANNEL_ID";
pub const ENV_SITE_URL: &str = "HERBERT_SITE_URL";

pub const DEFAULT_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
pub const DEFAULT_VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
pub const DEFAULT_SITE_URL: &str = "https://www.herbertong.com/";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub youtube: YoutubeSettings,
    pub site: SiteSettings,
    pub http: HttpSettings,
    pub out_dir: OutDir,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OutDir(pub PathBuf);

impl Default for OutDir {
    fn default() -> Self {
        Self(PathBuf::from("data/signals/generated"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YoutubeSettings {
    pub api_key: Option<String>,
    pub channel_id: Option<String>,
    pub search_url: String,
    pub videos_url: String,
    pub max_results: usize,
    pub enrich: bool,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            channel_id: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            videos_url: DEFAULT_VIDEOS_URL.to_string(),
            max_results: 5,
            enrich: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteSettings {
    pub url: String,
    /// CSS selector for one milestone node.
    pub selector: String,
    pub user_agent: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SITE_URL.to_string(),
            selector: "li".to_string(),
            user_agent: crate::ingest::http::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_secs: f64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 3,
            backoff_base_secs: 0.5,
        }
    }
}

/// Explicit credentials handed to the live video adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoutubeCredentials {
    pub api_key: String,
    pub channel_id: String,
}

impl YoutubeSettings {
    /// Both values must be present and non-blank.
    pub fn credentials(&self) -> Result<YoutubeCredentials> {
        match (non_blank(&self.api_key), non_blank(&self.channel_id)) {
            (Some(api_key), Some(channel_id)) => Ok(YoutubeCredentials {
                api_key,
                channel_id,
            }),
            _ => Err(IngestError::config(format!(
                "{ENV_YT_API_KEY} and {ENV_YT_CHANNEL_ID} must be set for live fetch"
            ))),
        }
    }
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl IngestConfig {
    /// Fill credentials and the site URL from the environment when the
    /// config leaves them unset. Values already present win.
    pub fn with_env_fallback(self) -> Self {
        self.with_env_from(|k| std::env::var(k).ok())
    }

    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if non_blank(&self.youtube.api_key).is_none() {
            self.youtube.api_key = lookup(ENV_YT_API_KEY);
        }
        if non_blank(&self.youtube.channel_id).is_none() {
            self.youtube.channel_id = lookup(ENV_YT_CHANNEL_ID);
        }
        if let Some(url) = lookup(ENV_SITE_URL).filter(|u| !u.trim().is_empty()) {
            if self.site.url == DEFAULT_SITE_URL {
                self.site.url = url;
            }
        }
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks:
/// 1) $HERBERT_CONFIG_PATH
/// 2) config/herbert.toml
/// 3) config/herbert.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(IngestError::config(format!(
            "{ENV_CONFIG_PATH} points to non-existent path {}",
            pb.display()
        )));
    }
    let toml_p = PathBuf::from("config/herbert.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/herbert.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(IngestConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s)
            .map_err(|e| IngestError::malformed("config json", e));
    }
    Ok(toml::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = parse_config(
            r#"
out_dir = "out/events"

[youtube]
channel_id = "chan"
max_results = 12

[http]
max_retries = 1
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.youtube.channel_id.as_deref(), Some("chan"));
        assert_eq!(cfg.youtube.max_results, 12);
        assert!(cfg.youtube.enrich);
        assert_eq!(cfg.youtube.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(cfg.http.max_retries, 1);
        assert_eq!(cfg.http.timeout_secs, 10);
        assert_eq!(cfg.site.selector, "li");
        assert_eq!(cfg.out_dir.0, PathBuf::from("out/events"));
    }

    #[test]
    fn json_is_accepted() {
        let cfg = parse_config(r#"{"site": {"url": "http://x.test/"}}"#, "").unwrap();
        assert_eq!(cfg.site.url, "http://x.test/");
        assert_eq!(cfg.http, HttpSettings::default());
    }

    #[test]
    fn env_fallback_only_fills_missing_values() {
        let env: HashMap<&str, &str> = [
            (ENV_YT_API_KEY, "env-key"),
            (ENV_YT_CHANNEL_ID, "env-chan"),
            (ENV_SITE_URL, "http://env.test/"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let mut cfg = IngestConfig::default();
        cfg.youtube.channel_id = Some("cfg-chan".into());
        let cfg = cfg.with_env_from(lookup);

        assert_eq!(cfg.youtube.api_key.as_deref(), Some("env-key"));
        assert_eq!(cfg.youtube.channel_id.as_deref(), Some("cfg-chan"));
        assert_eq!(cfg.site.url, "http://env.test/");
    }

    #[test]
    fn blank_credentials_are_a_config_error() {
        let mut yt = YoutubeSettings::default();
        yt.api_key = Some("  ".into());
        yt.channel_id = Some("chan".into());
        let err = yt.credentials().unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));

        yt.api_key = Some("key".into());
        let creds = yt.credentials().unwrap();
        assert_eq!(creds.api_key, "key");
        assert_eq!(creds.channel_id, "chan");
    }
}
