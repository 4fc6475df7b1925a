//! Webhook dispatch of the rendered lead report.
//!
//! POSTs one JSON payload per delivery: subject line, rendered HTML
//! summary, and the leads themselves as structured data. A non-success
//! status is a failed delivery — the cycle will retry the backlog next
//! time rather than mark it reported.

use crate::config::WebhookConfig;
use crate::report::{summary, LeadReporter};
use crate::store::Lead;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::info;

pub struct WebhookReporter {
    client: reqwest::Client,
    cfg: WebhookConfig,
}

impl WebhookReporter {
    pub fn new(cfg: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self { client, cfg })
    }
}

#[async_trait]
impl LeadReporter for WebhookReporter {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, leads: &[Lead]) -> Result<()> {
        let now = Utc::now();
        let subject = format!(
            "{} | {} lead(s) | {}",
            self.cfg.subject_prefix,
            leads.len(),
            now.format("%Y-%m-%d %H:%M")
        );
        let payload = serde_json::json!({
            "subject": subject,
            "generated_at": now.to_rfc3339(),
            "lead_count": leads.len(),
            "html": summary::render_html(leads),
            "leads": leads,
        });

        let resp = self
            .client
            .post(&self.cfg.url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("webhook POST to {} failed", self.cfg.url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("webhook returned {status} for {}", self.cfg.url);
        }

        info!(count = leads.len(), status = %status, "report dispatched");
        Ok(())
    }
}
