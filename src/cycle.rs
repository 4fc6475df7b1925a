//! Cycle orchestration: retrieve → extract → persist → report.
//!
//! A cycle never lets a lower-layer failure escape uncategorized: every
//! exit is a completed summary (possibly with per-fragment failure
//! counts) or a stage-tagged failure. Resources are released on every
//! path — the retriever owns the browser context and closes it itself.

use crate::cancel::CancelFlag;
use crate::config::AppConfig;
use crate::error::{CycleCause, CycleError, CycleStage};
use crate::extract::Extractor;
use crate::policy::BackoffPolicy;
use crate::renderer::Renderer;
use crate::report::LeadReporter;
use crate::retriever::Retriever;
use crate::store::{InsertOutcome, LeadStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Accounting for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub query_ref: String,
    pub fragments: usize,
    pub extracted: usize,
    pub rejected: usize,
    pub degraded: usize,
    pub date_fallbacks: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub reported: usize,
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new lead(s) stored ({} fragment(s): {} extracted, {} rejected, \
             {} duplicate(s), {} degraded, {} date fallback(s); {} reported)",
            self.inserted,
            self.fragments,
            self.extracted,
            self.rejected,
            self.duplicates,
            self.degraded,
            self.date_fallbacks,
            self.reported
        )
    }
}

/// Terminal state of one cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    Failed(CycleError),
}

impl CycleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// Composes the pipeline components for one search deployment.
pub struct CycleRunner {
    retriever: Retriever,
    extractor: Extractor,
    store: LeadStore,
    reporters: Vec<Box<dyn LeadReporter>>,
    policy: BackoffPolicy,
    always_report: bool,
    query_ref: String,
}

impl CycleRunner {
    pub fn new(
        retriever: Retriever,
        extractor: Extractor,
        store: LeadStore,
        reporters: Vec<Box<dyn LeadReporter>>,
        policy: BackoffPolicy,
        always_report: bool,
        query_ref: String,
    ) -> Self {
        Self {
            retriever,
            extractor,
            store,
            reporters,
            policy,
            always_report,
            query_ref,
        }
    }

    /// Assemble a runner from configuration and a browser engine.
    pub fn from_config(
        cfg: &AppConfig,
        renderer: Arc<dyn Renderer>,
        reporters: Vec<Box<dyn LeadReporter>>,
    ) -> anyhow::Result<Self> {
        let policy = BackoffPolicy::new(cfg.policy.clone());
        let retriever = Retriever::new(
            renderer,
            cfg.search.url.clone(),
            &cfg.selectors,
            cfg.retriever.clone(),
            policy.clone(),
        );
        let extractor = Extractor::new(
            cfg.selectors.clone(),
            cfg.search.base_url(),
            cfg.search.query_ref.clone(),
            &cfg.date_formats,
        )
        .map_err(|e| anyhow::anyhow!("selector schema rejected: {e}"))?;
        let store = LeadStore::open(&cfg.store.path)?;

        Ok(Self::new(
            retriever,
            extractor,
            store,
            reporters,
            policy,
            cfg.report.always_report,
            cfg.search.query_ref.clone(),
        ))
    }

    /// Run one acquisition cycle.
    pub async fn run_cycle(&self, cancel: &CancelFlag) -> CycleOutcome {
        let mut summary = CycleSummary {
            query_ref: self.query_ref.clone(),
            ..CycleSummary::default()
        };

        // Retrieving — retryable failures go through the backoff policy;
        // a Blocked signal aborts without retry.
        info!(query = %self.query_ref, "cycle started");
        let fragments = match self
            .policy
            .retry(cancel, |_attempt| self.retriever.retrieve(cancel))
            .await
        {
            Ok(fragments) => fragments,
            Err(err) => {
                warn!(query = %self.query_ref, stage = %CycleStage::Retrieving, error = %err,
                      "cycle failed");
                return CycleOutcome::Failed(CycleError::new(CycleStage::Retrieving, err));
            }
        };
        summary.fragments = fragments.len();

        // Extracting — fragment-level failures are absorbed and counted.
        if cancel.is_cancelled() {
            return self.cancelled(CycleStage::Extracting);
        }
        let now = Utc::now();
        let mut records = Vec::new();
        for fragment in &fragments {
            match self.extractor.extract(fragment, now) {
                Ok(extracted) => {
                    if extracted.is_degraded() {
                        summary.degraded += 1;
                        warn!(post_url = %extracted.lead.post_url, missing = ?extracted.missing,
                              "lead degraded");
                    }
                    if extracted.lead.posted_at_estimated {
                        summary.date_fallbacks += 1;
                    }
                    records.push(extracted);
                }
                Err(err) => {
                    summary.rejected += 1;
                    warn!(query = %self.query_ref, error = %err, "fragment rejected");
                }
            }
        }
        summary.extracted = records.len();

        // Persisting — duplicates are expected outcomes; store failures
        // are fatal to the cycle.
        if cancel.is_cancelled() {
            return self.cancelled(CycleStage::Persisting);
        }
        for record in &records {
            match self.store.insert(&record.lead) {
                Ok(InsertOutcome::Inserted(_)) => summary.inserted += 1,
                Ok(InsertOutcome::Duplicate) => summary.duplicates += 1,
                Err(err) => {
                    warn!(query = %self.query_ref, stage = %CycleStage::Persisting, error = %err,
                          "cycle failed");
                    return CycleOutcome::Failed(CycleError::new(CycleStage::Persisting, err));
                }
            }
        }

        // Reporting — the whole unreported backlog, not just this cycle's
        // inserts; marked only after every collaborator confirms.
        if summary.inserted > 0 || self.always_report {
            if cancel.is_cancelled() {
                return self.cancelled(CycleStage::Reporting);
            }
            match self.report_backlog().await {
                Ok(reported) => summary.reported = reported,
                Err(outcome) => return outcome,
            }
        }

        info!(query = %self.query_ref, "cycle completed: {summary}");
        CycleOutcome::Completed(summary)
    }

    async fn report_backlog(&self) -> Result<usize, CycleOutcome> {
        let backlog = self.store.unreported().map_err(|err| {
            CycleOutcome::Failed(CycleError::new(CycleStage::Reporting, err))
        })?;
        if backlog.is_empty() && !self.always_report {
            return Ok(0);
        }

        for reporter in &self.reporters {
            if let Err(err) = reporter.deliver(&backlog).await {
                warn!(reporter = reporter.name(), error = %err, "delivery failed");
                return Err(CycleOutcome::Failed(CycleError::new(
                    CycleStage::Reporting,
                    CycleCause::Report(err),
                )));
            }
            info!(reporter = reporter.name(), count = backlog.len(), "delivery confirmed");
        }

        let ids: Vec<i64> = backlog.iter().map(|lead| lead.id).collect();
        self.store.mark_reported(&ids).map_err(|err| {
            CycleOutcome::Failed(CycleError::new(CycleStage::Reporting, err))
        })?;
        Ok(backlog.len())
    }

    fn cancelled(&self, stage: CycleStage) -> CycleOutcome {
        warn!(query = %self.query_ref, stage = %stage, "cycle cancelled");
        CycleOutcome::Failed(CycleError::new(stage, CycleCause::Cancelled))
    }

    /// The store, for read-only CLI commands sharing a runner's config.
    pub fn store(&self) -> &LeadStore {
        &self.store
    }
}
