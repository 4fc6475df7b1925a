//! Tabular export artifact: one JSON Lines snapshot of the backlog.
//!
//! Written atomically (tmp then rename) so a half-written snapshot is
//! never observed by whatever picks the file up.

use crate::report::LeadReporter;
use crate::store::Lead;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Writes the backlog as a JSONL file, one lead per line.
pub struct ArtifactWriter {
    path: PathBuf,
}

impl ArtifactWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl LeadReporter for ArtifactWriter {
    fn name(&self) -> &'static str {
        "artifact"
    }

    async fn deliver(&self, leads: &[Lead]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }

        let mut out = String::new();
        for lead in leads {
            out.push_str(&serde_json::to_string(lead)?);
            out.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, out.as_bytes())
            .with_context(|| format!("cannot write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot move artifact into place: {}", self.path.display()))?;

        info!(count = leads.len(), path = %self.path.display(), "wrote lead artifact");
        Ok(())
    }
}
