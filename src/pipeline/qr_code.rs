//! QR code namespace.

use std::sync::Arc;

use super::{Artifact, Pipeline, PipelineStats};
use crate::error::AppError;
use crate::generator::GenerateError;
use crate::qr::QrEncoder;

pub struct QrCodeService {
    pipeline: Pipeline,
    encoder: Arc<dyn QrEncoder>,
}

impl QrCodeService {
    pub fn new(pipeline: Pipeline, encoder: Arc<dyn QrEncoder>) -> Self {
        Self { pipeline, encoder }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn stats(&self) -> PipelineStats {
        self.pipeline.stats().await
    }

    /// Serves a QR code encoding the canonical form of `url`.
    pub async fn qr_code(&self, url: Option<&str>) -> Result<Artifact, AppError> {
        let target = self.pipeline.authorize(url).await?;

        let encoder = self.encoder.clone();
        let data = target.url.clone();
        let artifact = self
            .pipeline
            .serve(&target, || async move {
                tokio::task::spawn_blocking(move || encoder.encode(&data))
                    .await
                    .map_err(|e| GenerateError::Encode(e.to_string()))?
            })
            .await?;
        Ok(artifact)
    }

    pub async fn invalidate(&self, url: &str) -> Result<(), AppError> {
        self.pipeline.invalidate(url).await
    }
}
