//! Error taxonomy for the acquisition pipeline.
//!
//! Field-level extraction problems are carried as data on the extracted
//! record, not as errors; everything here is fragment-level or above.
//! Duplicate inserts are a normal store outcome and never appear in this
//! taxonomy.

use thiserror::Error;

/// Failures while driving the browser session for one retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Block/challenge page detected. Non-retryable: retrying against a
    /// challenge only burns the session's reputation further.
    #[error("blocked or challenged at {url} (matched: {marker})")]
    Blocked { url: String, marker: String },

    #[error("browser error: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("retrieval cancelled")]
    Cancelled,
}

impl RetrievalError {
    /// Whether a retry with backoff can plausibly succeed.
    ///
    /// Timeouts and transport-level failures are transient; a challenge
    /// page or an explicit cancel is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RetrievalError::Timeout { .. }
                | RetrievalError::Navigation { .. }
                | RetrievalError::Browser(_)
        )
    }
}

/// A fragment that cannot become a valid lead.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// No resolvable post URL — the dedup key cannot be synthesized, so
    /// the whole fragment is rejected before it ever reaches the store.
    #[error("fragment has no resolvable post URL (selector: {selector})")]
    MissingPostUrl { selector: String },

    #[error("selector for {field} does not parse: {selector}")]
    BadSelector { field: &'static str, selector: String },
}

/// Store-layer failures. The duplicate path is not an error (see
/// [`crate::store::InsertOutcome`]); this covers the cases that are fatal
/// to a cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage of the acquisition cycle, used to tag cycle-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Retrieving,
    Extracting,
    Persisting,
    Reporting,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CycleStage::Idle => "idle",
            CycleStage::Retrieving => "retrieving",
            CycleStage::Extracting => "extracting",
            CycleStage::Persisting => "persisting",
            CycleStage::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

/// A categorized cycle-boundary failure. Lower-layer errors never escape
/// the cycle without being wrapped in one of these.
#[derive(Debug, Error)]
#[error("cycle failed during {stage}: {source}")]
pub struct CycleError {
    pub stage: CycleStage,
    #[source]
    pub source: CycleCause,
}

/// Cause of a cycle failure.
#[derive(Debug, Error)]
pub enum CycleCause {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("report delivery failed: {0}")]
    Report(#[from] anyhow::Error),

    #[error("cycle cancelled")]
    Cancelled,
}

impl CycleError {
    pub fn new(stage: CycleStage, source: impl Into<CycleCause>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_is_not_retryable() {
        let err = RetrievalError::Blocked {
            url: "https://feed.example/authwall".into(),
            marker: "authwall".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = RetrievalError::Timeout {
            url: "https://feed.example/search".into(),
            timeout_ms: 30000,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_cycle_error_carries_stage() {
        let err = CycleError::new(
            CycleStage::Retrieving,
            RetrievalError::Blocked {
                url: "https://feed.example/login".into(),
                marker: "login".into(),
            },
        );
        assert_eq!(err.stage, CycleStage::Retrieving);
        assert!(format!("{err}").contains("retrieving"));
    }
}
