//! Renderer abstraction for browser-based feed retrieval.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Tests
//! script these traits in-process; the retriever never touches the
//! engine directly.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Navigation failure, split so callers can tell transient timeouts from
/// hard failures.
#[derive(Debug, Error)]
pub enum NavigateError {
    #[error("navigation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("navigation failed: {reason}")]
    Failed { reason: String },
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab) presenting the given identity.
    async fn new_context(&self, user_agent: &str) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout; returns the final URL after any
    /// redirects (block detection needs it).
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<String, NavigateError>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
