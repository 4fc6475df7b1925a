//! Reporting boundary.
//!
//! The core hands the unreported backlog to one or more collaborators
//! and marks leads reported only after every delivery confirms. How a
//! collaborator delivers (file artifact, webhook, anything else) is its
//! own business.

pub mod artifact;
pub mod summary;
pub mod webhook;

use crate::store::Lead;
use anyhow::Result;
use async_trait::async_trait;

/// A downstream consumer of the unreported lead backlog.
#[async_trait]
pub trait LeadReporter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deliver the ordered lead sequence. An error here means the cycle
    /// must not mark these leads reported.
    async fn deliver(&self, leads: &[Lead]) -> Result<()>;
}
