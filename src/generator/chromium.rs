//! Headless Chromium renderer built on chromiumoxide.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::Page;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use super::{CaptureOptions, RenderError, RenderTarget, Renderer};

const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// Shared headless browser; every capture runs in its own tab.
pub struct ChromiumRenderer {
    browser: Browser,
}

impl ChromiumRenderer {
    /// Launches a headless browser and drives its CDP event loop on a
    /// background task.
    pub async fn launch() -> Result<Self, RenderError> {
        let opts = CaptureOptions::default();
        let config = BrowserConfig::builder()
            .window_size(opts.viewport.0, opts.viewport.1)
            .arg("--hide-scrollbars")
            .build()
            .map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            let errors = drive_events(&mut handler).await;
            warn!(errors, "browser handler loop ended");
        });

        Ok(Self { browser })
    }
}

/// Polls the CDP event stream until it ends. Individual event errors are
/// logged and skipped; only stream exhaustion stops the loop. Returns the
/// number of errors seen.
async fn drive_events<S, E>(events: &mut S) -> usize
where
    S: Stream<Item = Result<(), E>> + Unpin,
    E: std::fmt::Display,
{
    let mut errors = 0;
    while let Some(event) = events.next().await {
        if let Err(e) = event {
            errors += 1;
            debug!("browser handler event error: {e}");
        }
    }
    errors
}

/// Closes the tab even when the capture future is dropped on timeout.
struct TabGuard(Option<Page>);

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Some(page) = self.0.take() {
            tokio::spawn(async move {
                page.close().await.ok();
            });
        }
    }
}

/// Unhides the element (some pages hide their preview card) and reports
/// whether it exists.
fn unhide_script(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(function() {{
            var el = document.querySelector({quoted});
            if (el) {{
                el.style.visibility = '';
                el.style.display = 'block';
                return true;
            }}
            return false;
        }})()"#
    )
}

fn visible_script(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(function() {{
            var el = document.querySelector({quoted});
            if (!el) return false;
            var style = window.getComputedStyle(el);
            var rect = el.getBoundingClientRect();
            return style.visibility !== 'hidden' && style.display !== 'none'
                && rect.width > 0 && rect.height > 0;
        }})()"#
    )
}

async fn evaluate_bool(page: &Page, script: String) -> Result<bool, RenderError> {
    page.evaluate(script)
        .await
        .map_err(|e| RenderError::Navigation(e.to_string()))?
        .into_value::<bool>()
        .map_err(|e| RenderError::Navigation(e.to_string()))
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn capture(
        &self,
        target: &RenderTarget,
        selector: &str,
        opts: &CaptureOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;
        let _guard = TabGuard(Some(page.clone()));

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(opts.viewport.0),
            i64::from(opts.viewport.1),
            opts.device_scale_factor,
            false,
        ))
        .await
        .map_err(|e| RenderError::Navigation(e.to_string()))?;

        match target {
            RenderTarget::Url(url) => {
                page.goto(url.as_str())
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?;
            }
            RenderTarget::Html(html) => {
                page.set_content(html.as_str())
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?;
            }
        }

        if !evaluate_bool(&page, unhide_script(selector)).await? {
            return Err(RenderError::MissingSelector(selector.to_string()));
        }

        // Bounded by the caller's deadline.
        while !evaluate_bool(&page, visible_script(selector)).await? {
            tokio::time::sleep(VISIBILITY_POLL).await;
        }
        tokio::time::sleep(opts.settle_delay).await;

        let element = page
            .find_element(selector)
            .await
            .map_err(|_| RenderError::MissingSelector(selector.to_string()))?;
        element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))
    }
}
