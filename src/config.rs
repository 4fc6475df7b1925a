//! Configuration for the acquisition pipeline.
//!
//! One JSON document describes a deployment: the search target, the
//! field-selector schema, pacing/retry bounds, and the reporting sinks.
//! Components receive these as immutable value structs at construction;
//! nothing mutates configuration after load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub selectors: SelectorSchema,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
    /// Absolute-date formats (chrono syntax) tried after the relative
    /// patterns. Year-less formats assume the current year.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

/// The search target one deployment harvests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Full URL of the feed search to open.
    pub url: String,
    /// Opaque tag stored on every lead this search produces.
    pub query_ref: String,
    /// Base for resolving relative URLs. Defaults to the search URL's origin.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl SearchConfig {
    /// Base URL for relative-link resolution.
    pub fn base_url(&self) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        match url::Url::parse(&self.url) {
            Ok(u) => u.origin().ascii_serialization(),
            Err(_) => self.url.clone(),
        }
    }
}

/// One extractable field: a CSS selector plus how to read the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelector {
    /// CSS selector relative to the fragment. Empty string means the
    /// fragment's root element itself.
    pub selector: String,
    /// Attribute to read instead of text content (e.g. "href", "data-urn").
    #[serde(default)]
    pub attr: Option<String>,
    /// Optional permalink template; `{}` is replaced with the raw value
    /// before URL resolution. Used when the post URL is derived from an
    /// identifier attribute rather than a literal href.
    #[serde(default)]
    pub template: Option<String>,
}

impl FieldSelector {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: None,
            template: None,
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
            template: None,
        }
    }
}

/// The declared extraction contract against the feed's markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSchema {
    /// Selector matching one post container per fragment.
    pub container: String,
    pub user_name: FieldSelector,
    pub profile_url: FieldSelector,
    pub posted_date: FieldSelector,
    pub post_content: FieldSelector,
    pub post_url: FieldSelector,
    /// "See more" style expanders clicked once before collection.
    #[serde(default)]
    pub expand: Option<String>,
    /// Element whose presence marks a challenge/verification page.
    #[serde(default)]
    pub challenge: Option<String>,
}

/// Browser-session pacing and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Navigation timeout in milliseconds.
    pub nav_timeout_ms: u64,
    /// Pause after navigation before the first interaction.
    pub settle_ms: u64,
    /// Upper bound on scroll attempts.
    pub max_scrolls: u32,
    /// URL substrings that mark a block/login/challenge redirect.
    pub block_markers: Vec<String>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 30_000,
            settle_ms: 2_000,
            max_scrolls: 12,
            block_markers: vec![
                "authwall".to_string(),
                "login".to_string(),
                "checkpoint".to_string(),
                "challenge".to_string(),
            ],
        }
    }
}

/// Retry/backoff bounds and the identity pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Randomized inter-action pacing range in milliseconds.
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    /// Additional attempts after the first try.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles per attempt).
    pub backoff_base_ms: u64,
    /// Cap on any single backoff delay.
    pub backoff_max_ms: u64,
    /// User-agent strings rotated per session.
    pub user_agents: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pacing_min_ms: 1_500,
            pacing_max_ms: 4_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            user_agents: default_user_agents(),
        }
    }
}

/// Where leads are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Reporting sinks for the unreported backlog.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    /// Report even when a cycle inserted nothing new.
    pub always_report: bool,
    /// JSONL artifact snapshot path. None disables the artifact writer.
    pub artifact_path: Option<PathBuf>,
    /// Webhook dispatch target. None disables dispatch.
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Subject line prefix for the rendered summary.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

impl AppConfig {
    /// Load a configuration document, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file: {}", path.display()))?;
        let mut cfg: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deploy-sensitive values can be overridden without editing the file.
    fn apply_env_overrides(&mut self) {
        if let Some(path) = read_env_string("LEADSCOUT_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(url) = read_env_string("LEADSCOUT_WEBHOOK_URL") {
            match &mut self.report.webhook {
                Some(hook) => hook.url = url,
                None => {
                    self.report.webhook = Some(WebhookConfig {
                        url,
                        subject_prefix: default_subject_prefix(),
                        timeout_ms: default_webhook_timeout_ms(),
                    });
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.policy.pacing_min_ms > self.policy.pacing_max_ms {
            anyhow::bail!(
                "pacing_min_ms ({}) exceeds pacing_max_ms ({})",
                self.policy.pacing_min_ms,
                self.policy.pacing_max_ms
            );
        }
        if self.retriever.max_scrolls == 0 {
            anyhow::bail!("max_scrolls must be at least 1");
        }
        if self.selectors.container.trim().is_empty() {
            anyhow::bail!("selectors.container must not be empty");
        }
        Ok(())
    }
}

fn default_date_formats() -> Vec<String> {
    vec![
        "%b %d, %Y".to_string(),
        "%B %d, %Y".to_string(),
        "%b %d".to_string(),
        "%B %d".to_string(),
    ]
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36"
            .to_string(),
    ]
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leadscout")
        .join("leads.db")
}

fn default_subject_prefix() -> String {
    "Leadscout report".to_string()
}

fn default_webhook_timeout_ms() -> u64 {
    15_000
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
