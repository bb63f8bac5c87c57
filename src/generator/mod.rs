//! Link Preview Generation
//!
//! Screenshots a page element through a pluggable [`Renderer`]. When the
//! element is missing, a fallback preview is synthesized from the page's
//! title and description and rendered through an embedded HTML template.

#[cfg(feature = "render")]
mod chromium;
mod metadata;
mod template;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "render")]
pub use chromium::ChromiumRenderer;
pub use metadata::{parse_metadata, HttpMetadataFetcher, MetadataError, MetadataFetcher, PageMetadata};
pub use template::{render_template, TemplateError, DEFAULT_TEMPLATE, TEMPLATE_SELECTOR};

// == Render Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The selector matched no element on the rendered page
    #[error("selector not found: {0}")]
    MissingSelector(String),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("screenshot failed: {0}")]
    Capture(String),

    /// Built without a render backend
    #[error("no render backend available")]
    Unavailable,
}

// == Generate Error ==
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Recoverable: the pipeline retries with the fallback template
    #[error("selector not found: {0}")]
    MissingSelector(String),

    #[error("render failed: {0}")]
    Render(RenderError),

    #[error("metadata fetch failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("template failed: {0}")]
    Template(#[from] TemplateError),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RenderError> for GenerateError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::MissingSelector(selector) => GenerateError::MissingSelector(selector),
            other => GenerateError::Render(other),
        }
    }
}

// == Render Target ==
/// What the renderer should load before capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    Url(String),
    /// Inline HTML document
    Html(String),
}

// == Capture Options ==
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Logical viewport in CSS pixels
    pub viewport: (u32, u32),
    /// Device pixel ratio; output images are `viewport * scale` pixels
    pub device_scale_factor: f64,
    /// Pause after the element becomes visible, for web fonts to load
    pub settle_delay: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            viewport: (1200, 630),
            device_scale_factor: 2.0,
            settle_delay: Duration::from_secs(1),
        }
    }
}

// == Renderer ==
/// Render engine capability: load a target, make `selector` visible, wait
/// for it, and return a PNG of just that element.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Fails with [`RenderError::MissingSelector`] when nothing matches.
    async fn capture(
        &self,
        target: &RenderTarget,
        selector: &str,
        opts: &CaptureOptions,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Renderer used when the crate is built without a browser backend.
#[derive(Debug, Default)]
pub struct UnavailableRenderer;

#[async_trait]
impl Renderer for UnavailableRenderer {
    async fn capture(&self, _: &RenderTarget, _: &str, _: &CaptureOptions) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Unavailable)
    }
}

// == Screenshot Generator ==
/// Produces raw PNG screenshots for validated URLs.
#[derive(Clone)]
pub struct ScreenshotGenerator {
    renderer: Arc<dyn Renderer>,
    metadata: Arc<dyn MetadataFetcher>,
    template: String,
    options: CaptureOptions,
}

impl ScreenshotGenerator {
    pub fn new(renderer: Arc<dyn Renderer>, metadata: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            renderer,
            metadata,
            template: DEFAULT_TEMPLATE.to_string(),
            options: CaptureOptions::default(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Screenshots the element matching `selector` on the live page.
    pub async fn capture(&self, url: &str, selector: &str) -> Result<Vec<u8>, GenerateError> {
        debug!(url, selector, "capturing screenshot");
        let target = RenderTarget::Url(url.to_string());
        Ok(self.renderer.capture(&target, selector, &self.options).await?)
    }

    /// Renders the fallback template filled with the page's metadata and
    /// screenshots its preview container.
    ///
    /// Every failure here is terminal; a missing container in the template
    /// is reported as a render failure rather than `MissingSelector`.
    pub async fn capture_with_template(&self, url: &str) -> Result<Vec<u8>, GenerateError> {
        let metadata = self.metadata.fetch(url).await?;
        debug!(url, title = %metadata.title, description = %metadata.description, "capturing with template");

        let html = render_template(&self.template, &metadata, url)?;
        self.renderer
            .capture(&RenderTarget::Html(html), TEMPLATE_SELECTOR, &self.options)
            .await
            .map_err(GenerateError::Render)
    }
}
