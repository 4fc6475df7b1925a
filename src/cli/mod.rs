//! CLI subcommand implementations for the leadscout binary.

pub mod leads_cmd;
pub mod run_cmd;
pub mod status_cmd;
pub mod watch_cmd;

use crate::cancel::CancelFlag;
use crate::config::AppConfig;
use crate::cycle::CycleRunner;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use crate::report::artifact::ArtifactWriter;
use crate::report::webhook::WebhookReporter;
use crate::report::LeadReporter;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Reporting collaborators enabled by the configuration.
pub fn reporters_from_config(cfg: &AppConfig) -> Result<Vec<Box<dyn LeadReporter>>> {
    let mut reporters: Vec<Box<dyn LeadReporter>> = Vec::new();
    if let Some(path) = &cfg.report.artifact_path {
        reporters.push(Box::new(ArtifactWriter::new(path.clone())));
    }
    if let Some(hook) = &cfg.report.webhook {
        reporters.push(Box::new(WebhookReporter::new(hook.clone())?));
    }
    Ok(reporters)
}

/// Assemble the full pipeline: browser, extractor, store, reporters.
pub async fn build_runner(config_path: &Path) -> Result<CycleRunner> {
    let cfg = AppConfig::load(config_path)?;
    let renderer: Arc<dyn Renderer> = Arc::new(
        ChromiumRenderer::new()
            .await
            .context("failed to start browser engine")?,
    );
    info!("Chromium renderer initialized");
    let reporters = reporters_from_config(&cfg)?;
    CycleRunner::from_config(&cfg, renderer, reporters)
}

/// Cancel flag wired to ctrl-c, shared by all long-running commands.
pub fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        flag.cancel();
    });
    cancel
}
