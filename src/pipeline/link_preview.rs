//! Link preview namespace: element screenshots with a template fallback.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use super::{Artifact, Pipeline, PipelineStats};
use crate::error::AppError;
use crate::generator::{GenerateError, ScreenshotGenerator};

pub const DEFAULT_SELECTOR: &str = "#link-preview";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A single `#id` or `.class`; anything richer is rejected.
static SELECTOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[#.][a-zA-Z0-9_-]+$").expect("selector pattern compiles"));

pub fn is_valid_selector(selector: &str) -> bool {
    SELECTOR_PATTERN.is_match(selector)
}

pub struct LinkPreviewService {
    pipeline: Pipeline,
    generator: ScreenshotGenerator,
    default_selector: String,
    timeout: Duration,
}

impl LinkPreviewService {
    pub fn new(pipeline: Pipeline, generator: ScreenshotGenerator) -> Self {
        Self {
            pipeline,
            generator,
            default_selector: DEFAULT_SELECTOR.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_default_selector(mut self, selector: impl Into<String>) -> Self {
        self.default_selector = selector.into();
        self
    }

    /// Deadline for one generation, fallback included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn stats(&self) -> PipelineStats {
        self.pipeline.stats().await
    }

    /// Serves a preview of `url`, screenshotting the element matching
    /// `selector` (or the default selector when absent or empty).
    pub async fn preview(&self, url: Option<&str>, selector: Option<&str>) -> Result<Artifact, AppError> {
        let target = self.pipeline.authorize(url).await?;

        let selector = match selector.filter(|s| !s.is_empty()) {
            None => self.default_selector.as_str(),
            Some(s) if is_valid_selector(s) => s,
            Some(s) => {
                warn!(url = %target.url, selector = s, status = 400, "invalid selector");
                return Err(AppError::InvalidSelector);
            }
        };

        let artifact = self
            .pipeline
            .serve(&target, || self.generate(&target.url, selector))
            .await?;
        Ok(artifact)
    }

    async fn generate(&self, url: &str, selector: &str) -> Result<Vec<u8>, GenerateError> {
        tokio::time::timeout(self.timeout, self.capture_or_fallback(url, selector))
            .await
            .map_err(|_| GenerateError::Timeout(self.timeout))?
    }

    /// At most one fallback attempt per request.
    async fn capture_or_fallback(&self, url: &str, selector: &str) -> Result<Vec<u8>, GenerateError> {
        match self.generator.capture(url, selector).await {
            Err(GenerateError::MissingSelector(_)) => {
                info!(url, selector, "selector not found, attempting with default template");
                self.pipeline.stats.write().await.record_fallback();
                self.generator.capture_with_template(url).await
            }
            result => result,
        }
    }

    pub async fn invalidate(&self, url: &str) -> Result<(), AppError> {
        self.pipeline.invalidate(url).await
    }
}
