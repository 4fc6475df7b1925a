//! Browser-driven feed retrieval.
//!
//! One retrieval owns one browser context: navigate to the search target,
//! detect block/challenge pages, expand the feed by scrolling until the
//! document height stalls, trigger "see more" expanders, then collect the
//! raw outer HTML of every post container. The context is closed on every
//! exit path.

use crate::cancel::CancelFlag;
use crate::config::{RetrieverConfig, SelectorSchema};
use crate::error::RetrievalError;
use crate::policy::BackoffPolicy;
use crate::renderer::{NavigateError, RenderContext, Renderer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Retrieves raw post fragments for one search target.
pub struct Retriever {
    renderer: Arc<dyn Renderer>,
    url: String,
    container: String,
    expand: Option<String>,
    challenge: Option<String>,
    cfg: RetrieverConfig,
    policy: BackoffPolicy,
}

impl Retriever {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        url: String,
        schema: &SelectorSchema,
        cfg: RetrieverConfig,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            renderer,
            url,
            container: schema.container.clone(),
            expand: schema.expand.clone(),
            challenge: schema.challenge.clone(),
            cfg,
            policy,
        }
    }

    /// Run one retrieval. Returns the unparsed container fragments.
    ///
    /// The browser context is released exactly once whether the drive
    /// succeeds, fails, or is cancelled mid-pause.
    pub async fn retrieve(&self, cancel: &CancelFlag) -> Result<Vec<String>, RetrievalError> {
        if cancel.is_cancelled() {
            return Err(RetrievalError::Cancelled);
        }

        let user_agent = self.policy.user_agent();
        let mut ctx = self.renderer.new_context(user_agent).await?;

        let result = self.drive(ctx.as_mut(), cancel).await;
        if let Err(e) = ctx.close().await {
            warn!("browser context close failed: {e}");
        }
        result
    }

    async fn drive(
        &self,
        ctx: &mut dyn RenderContext,
        cancel: &CancelFlag,
    ) -> Result<Vec<String>, RetrievalError> {
        info!(url = %self.url, "navigating to search target");
        let navigated = tokio::select! {
            result = ctx.navigate(&self.url, self.cfg.nav_timeout_ms) => result,
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
        };
        let final_url = navigated.map_err(|e| match e {
            NavigateError::Timeout { timeout_ms } => RetrievalError::Timeout {
                url: self.url.clone(),
                timeout_ms,
            },
            NavigateError::Failed { reason } => RetrievalError::Navigation {
                url: self.url.clone(),
                reason,
            },
        })?;

        if let Some(marker) = self.redirect_marker(&final_url) {
            return Err(RetrievalError::Blocked {
                url: final_url,
                marker,
            });
        }

        if !cancel
            .sleep(std::time::Duration::from_millis(self.cfg.settle_ms))
            .await
        {
            return Err(RetrievalError::Cancelled);
        }

        if let Some(selector) = &self.challenge {
            if self.element_present(ctx, selector).await? {
                return Err(RetrievalError::Blocked {
                    url: final_url,
                    marker: format!("challenge selector {selector}"),
                });
            }
        }

        self.scroll_to_exhaustion(ctx, cancel).await?;

        if let Some(selector) = &self.expand {
            self.expand_truncated(ctx, cancel, selector).await?;
        }

        let fragments = self.collect_fragments(ctx).await?;
        info!(count = fragments.len(), "collected post fragments");
        Ok(fragments)
    }

    /// Scroll until the document height repeats across one full pause
    /// interval, or the scroll bound is reached. Both are normal
    /// termination.
    async fn scroll_to_exhaustion(
        &self,
        ctx: &mut dyn RenderContext,
        cancel: &CancelFlag,
    ) -> Result<(), RetrievalError> {
        let mut last_height = self.document_height(ctx).await?;
        let mut scrolls = 0u32;

        while scrolls < self.cfg.max_scrolls {
            ctx.execute_js("window.scrollTo(0, document.body.scrollHeight);")
                .await?;
            if !cancel.sleep(self.policy.pause()).await {
                return Err(RetrievalError::Cancelled);
            }
            let height = self.document_height(ctx).await?;
            if height == last_height {
                debug!(height, scrolls, "content exhausted, stopping scroll");
                return Ok(());
            }
            last_height = height;
            scrolls += 1;
            debug!(height, scrolls, "scrolled, content still growing");
        }

        debug!(
            scrolls,
            max_scrolls = self.cfg.max_scrolls,
            "scroll bound reached"
        );
        Ok(())
    }

    /// Click every "see more" expander once so collected fragments carry
    /// full text. Expander failures are logged, never fatal.
    async fn expand_truncated(
        &self,
        ctx: &mut dyn RenderContext,
        cancel: &CancelFlag,
        selector: &str,
    ) -> Result<(), RetrievalError> {
        let script = format!(
            "document.querySelectorAll({}).forEach((el) => el.click());",
            js_string(selector)
        );
        if let Err(e) = ctx.execute_js(&script).await {
            warn!("expand pass failed: {e}");
            return Ok(());
        }
        if !cancel.sleep(self.policy.pause()).await {
            return Err(RetrievalError::Cancelled);
        }
        Ok(())
    }

    async fn collect_fragments(
        &self,
        ctx: &mut dyn RenderContext,
    ) -> Result<Vec<String>, RetrievalError> {
        let script = format!(
            "Array.from(document.querySelectorAll({})).map((el) => el.outerHTML)",
            js_string(&self.container)
        );
        let value = ctx.execute_js(&script).await?;
        let fragments: Vec<String> = serde_json::from_value(value)
            .map_err(|e| anyhow::anyhow!("fragment collection returned non-array: {e}"))?;
        Ok(fragments)
    }

    async fn document_height(&self, ctx: &mut dyn RenderContext) -> Result<u64, RetrievalError> {
        let value = ctx.execute_js("document.body.scrollHeight").await?;
        value
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("scrollHeight returned non-number: {value}").into())
    }

    async fn element_present(
        &self,
        ctx: &mut dyn RenderContext,
        selector: &str,
    ) -> Result<bool, RetrievalError> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        let value = ctx.execute_js(&script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// A block marker counts only when the redirect introduced it; the
    /// search URL itself may legitimately contain e.g. "login" as a
    /// keyword.
    fn redirect_marker(&self, final_url: &str) -> Option<String> {
        let lowered = final_url.to_lowercase();
        let requested = self.url.to_lowercase();
        self.cfg
            .block_markers
            .iter()
            .find(|marker| {
                let m = marker.to_lowercase();
                lowered.contains(&m) && !requested.contains(&m)
            })
            .cloned()
    }
}

/// Quote a CSS selector as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSelector, PolicyConfig};
    use crate::renderer::NavigateError;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted render context: serves a height sequence and a fragment
    /// list, and records how often it is closed.
    struct StubContext {
        final_url: String,
        heights: Mutex<Vec<u64>>,
        fragments: Vec<String>,
        scrolls: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderContext for StubContext {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<String, NavigateError> {
            Ok(self.final_url.clone())
        }

        async fn execute_js(&self, script: &str) -> AnyResult<serde_json::Value> {
            if script.contains("scrollHeight") && script.starts_with("document.body") {
                let mut heights = self.heights.lock().unwrap();
                let h = if heights.len() > 1 {
                    heights.remove(0)
                } else {
                    heights[0]
                };
                return Ok(serde_json::json!(h));
            }
            if script.starts_with("window.scrollTo") {
                self.scrolls.fetch_add(1, Ordering::SeqCst);
                return Ok(serde_json::Value::Null);
            }
            if script.contains("querySelector(") && script.ends_with("!== null") {
                return Ok(serde_json::json!(false));
            }
            if script.contains("outerHTML") {
                return Ok(serde_json::json!(self.fragments));
            }
            Ok(serde_json::Value::Null)
        }

        async fn close(self: Box<Self>) -> AnyResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubRenderer {
        final_url: String,
        heights: Vec<u64>,
        fragments: Vec<String>,
        scrolls: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        active: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for StubRenderer {
        async fn new_context(&self, _user_agent: &str) -> AnyResult<Box<dyn RenderContext>> {
            self.active.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubContext {
                final_url: self.final_url.clone(),
                heights: Mutex::new(self.heights.clone()),
                fragments: self.fragments.clone(),
                scrolls: Arc::clone(&self.scrolls),
                closes: Arc::clone(&self.closes),
            }))
        }

        async fn shutdown(&self) -> AnyResult<()> {
            Ok(())
        }

        fn active_contexts(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }
    }

    fn schema() -> SelectorSchema {
        SelectorSchema {
            container: "div.post".to_string(),
            user_name: FieldSelector::text(".author"),
            profile_url: FieldSelector::attr("a", "href"),
            posted_date: FieldSelector::text(".when"),
            post_content: FieldSelector::text(".body"),
            post_url: FieldSelector::attr("a", "href"),
            expand: None,
            challenge: None,
        }
    }

    fn fast_cfg() -> RetrieverConfig {
        RetrieverConfig {
            nav_timeout_ms: 1000,
            settle_ms: 1,
            max_scrolls: 12,
            block_markers: vec!["authwall".to_string(), "login".to_string()],
        }
    }

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy::new(PolicyConfig {
            pacing_min_ms: 1,
            pacing_max_ms: 2,
            max_retries: 0,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            user_agents: vec!["test/1.0".to_string()],
        })
    }

    fn retriever(stub: StubRenderer) -> (Retriever, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let scrolls = Arc::clone(&stub.scrolls);
        let closes = Arc::clone(&stub.closes);
        let r = Retriever::new(
            Arc::new(stub),
            "https://feed.example/search?q=rust".to_string(),
            &schema(),
            fast_cfg(),
            fast_policy(),
        );
        (r, scrolls, closes)
    }

    fn stub(final_url: &str, heights: Vec<u64>, fragments: Vec<String>) -> StubRenderer {
        StubRenderer {
            final_url: final_url.to_string(),
            heights,
            fragments,
            scrolls: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            active: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_scroll_stops_on_stalled_height() {
        let s = stub(
            "https://feed.example/search?q=rust",
            vec![100, 250, 400, 400],
            vec!["<div class=\"post\">a</div>".to_string()],
        );
        let (r, scrolls, closes) = retriever(s);

        let fragments = r.retrieve(&CancelFlag::new()).await.unwrap();
        assert_eq!(fragments.len(), 1);
        // Heights 100→250→400→400: the repeat ends the loop well before
        // the max-scroll bound.
        assert_eq!(scrolls.load(Ordering::SeqCst), 3);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scroll_bound_caps_growing_page() {
        let heights: Vec<u64> = (0..40).map(|i| 100 + i * 50).collect();
        let s = stub("https://feed.example/search?q=rust", heights, vec![]);
        let (r, scrolls, _) = retriever(s);

        r.retrieve(&CancelFlag::new()).await.unwrap();
        assert_eq!(scrolls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_block_redirect_is_blocked_and_closes_once() {
        let s = stub(
            "https://feed.example/authwall?from=search",
            vec![100],
            vec![],
        );
        let (r, _, closes) = retriever(s);

        let err = r.retrieve(&CancelFlag::new()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Blocked { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_marker_in_search_url_is_not_a_block() {
        // The query legitimately contains "login"; same URL comes back.
        let s = stub(
            "https://feed.example/search?q=login+page+developer",
            vec![100, 100],
            vec![],
        );
        let scrolls = Arc::clone(&s.scrolls);
        let r = Retriever::new(
            Arc::new(s),
            "https://feed.example/search?q=login+page+developer".to_string(),
            &schema(),
            fast_cfg(),
            fast_policy(),
        );
        r.retrieve(&CancelFlag::new()).await.unwrap();
        assert!(scrolls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let s = stub("https://feed.example/search", vec![100], vec![]);
        let (r, _, closes) = retriever(s);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = r.retrieve(&cancel).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Cancelled));
        // Cancelled before a context was opened: nothing to close.
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
