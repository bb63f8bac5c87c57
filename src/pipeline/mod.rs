//! Request Pipeline
//!
//! Shared request flow for every artifact namespace:
//!
//! authorize -> cache lookup -> hit: serve + record access
//!                           -> miss: generate -> serve + record creation
//!                                    -> detached: compress -> cache write
//!
//! The client gets the generated bytes before compression and the cache
//! write run; those happen on a detached task admitted by the
//! [`CompressionThrottle`]. Cache and compression failures are logged and
//! never fail a request.

mod link_preview;
mod qr_code;
mod stats;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::auth::{canonicalize, AuthError, AuthorizedUrl, DomainAuthorizer};
use crate::cache::{ArtifactStore, CacheError};
use crate::compress::CompressionThrottle;
use crate::error::AppError;
use crate::generator::GenerateError;
use crate::registry::UsageLog;

pub use link_preview::{LinkPreviewService, DEFAULT_SELECTOR};
pub use qr_code::QrCodeService;
pub use stats::PipelineStats;

// == Artifact ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Cache,
    Generated,
}

/// Image bytes ready to be served.
#[derive(Debug)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub source: ArtifactSource,
    /// Detached compress-and-store task, present for freshly generated
    /// artifacts when caching is enabled. Dropping the handle does not
    /// cancel the task.
    pub persist: Option<JoinHandle<()>>,
}

// == Pipeline ==
pub struct Pipeline {
    namespace: &'static str,
    authorizer: DomainAuthorizer,
    store: Arc<dyn ArtifactStore>,
    cache_enabled: bool,
    throttle: CompressionThrottle,
    usage: Arc<dyn UsageLog>,
    stats: Arc<RwLock<PipelineStats>>,
}

impl Pipeline {
    // == Constructor ==
    /// Creates a pipeline with caching enabled.
    pub fn new(
        namespace: &'static str,
        authorizer: DomainAuthorizer,
        store: Arc<dyn ArtifactStore>,
        throttle: CompressionThrottle,
        usage: Arc<dyn UsageLog>,
    ) -> Self {
        Self {
            namespace,
            authorizer,
            store,
            cache_enabled: true,
            throttle,
            usage,
            stats: Arc::new(RwLock::new(PipelineStats::new())),
        }
    }

    /// With caching disabled the store is never read or written; generation
    /// and serving are unaffected.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn usage(&self) -> &Arc<dyn UsageLog> {
        &self.usage
    }

    pub async fn stats(&self) -> PipelineStats {
        self.stats.read().await.clone()
    }

    // == Authorize ==
    /// Validates the `url` query parameter and checks its domain.
    pub async fn authorize(&self, user_url: Option<&str>) -> Result<AuthorizedUrl, AuthError> {
        let result = match user_url {
            Some(url) => self.authorizer.validate_and_authorize(url).await,
            None => Err(AuthError::MissingUrl),
        };
        if let Err(e) = &result {
            warn!(
                namespace = self.namespace,
                url = user_url.unwrap_or_default(),
                error = %e,
                "URL validation failed"
            );
        }
        result
    }

    // == Lookup ==
    /// Cache lookup that never fails: I/O errors are logged and treated as
    /// a miss.
    async fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let store = self.store.clone();
        let owned_key = key.to_string();
        let result = blocking(move || store.find(&owned_key)).await;

        let mut stats = self.stats.write().await;
        match result {
            Ok(Some(bytes)) => {
                stats.record_hit();
                Some(bytes)
            }
            Ok(None) => {
                stats.record_miss();
                None
            }
            Err(e) => {
                stats.record_lookup_error();
                error!(namespace = self.namespace, url = key, error = %e, "error during cache lookup");
                None
            }
        }
    }

    // == Serve ==
    /// Serves `target` from the cache, or generates it with `generate`.
    ///
    /// A generated artifact is returned as soon as it exists; compression
    /// and the cache write continue on a detached task.
    pub async fn serve<F, Fut>(&self, target: &AuthorizedUrl, generate: F) -> Result<Artifact, GenerateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, GenerateError>>,
    {
        if self.cache_enabled {
            if let Some(bytes) = self.lookup(&target.url).await {
                info!(
                    namespace = self.namespace,
                    url = %target.url,
                    hostname = %target.hostname,
                    status = 200,
                    "cached artifact served"
                );
                self.record_access(&target.url).await;
                return Ok(Artifact {
                    bytes,
                    source: ArtifactSource::Cache,
                    persist: None,
                });
            }
        }

        let bytes = match generate().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    namespace = self.namespace,
                    url = %target.url,
                    hostname = %target.hostname,
                    error = %e,
                    status = 500,
                    "artifact generation failed"
                );
                return Err(e);
            }
        };
        // Spawned before any further await so a dropped request still persists.
        let persist = self
            .cache_enabled
            .then(|| self.persist_in_background(target.url.clone(), bytes.clone()));
        self.stats.write().await.record_generated();

        info!(
            namespace = self.namespace,
            url = %target.url,
            hostname = %target.hostname,
            status = 200,
            "new artifact generated"
        );
        self.record_creation(&target.url).await;

        Ok(Artifact {
            bytes,
            source: ArtifactSource::Generated,
            persist,
        })
    }

    // == Persist ==
    /// Spawns the compress-and-store task. It holds no reference to the
    /// request and runs to completion even if the client disconnects.
    fn persist_in_background(&self, key: String, png: Vec<u8>) -> JoinHandle<()> {
        let namespace = self.namespace;
        let store = self.store.clone();
        let throttle = self.throttle.clone();
        let stats = self.stats.clone();

        tokio::spawn(async move {
            let original_len = png.len();
            let data = match throttle.compress(png.clone()).await {
                Ok(compressed) => {
                    info!(
                        namespace,
                        from = original_len,
                        to = compressed.len(),
                        percent = (compressed.len() * 100).checked_div(original_len).unwrap_or(100),
                        "PNG compressed"
                    );
                    compressed
                }
                Err(e) => {
                    error!(namespace, url = %key, error = %e, "PNG compression failed");
                    stats.write().await.record_compression_failure();
                    png
                }
            };

            let write_key = key.clone();
            match blocking(move || store.write(&write_key, &data)).await {
                Ok(()) => stats.write().await.record_stored(),
                Err(e) => {
                    error!(namespace, url = %key, error = %e, "error writing to cache");
                    stats.write().await.record_store_failure();
                }
            }
        })
    }

    // == Usage ==
    async fn record_creation(&self, url: &str) {
        if let Err(e) = self.usage.record_created(url).await {
            error!(namespace = self.namespace, url, error = %e, "failed to record artifact creation");
        }
    }

    /// Records a cache hit, registering the URL first if it was unknown.
    async fn record_access(&self, url: &str) {
        match self.usage.record_accessed(url).await {
            Ok(true) => {}
            Ok(false) => self.record_creation(url).await,
            Err(e) => {
                error!(namespace = self.namespace, url, error = %e, "failed to record artifact access");
            }
        }
    }

    // == Invalidate ==
    /// Deletes the cached artifact for `user_url`. Fails if nothing is cached.
    pub async fn invalidate(&self, user_url: &str) -> Result<(), AppError> {
        let key = canonicalize(user_url)?.to_string();
        let store = self.store.clone();
        blocking(move || store.delete(&key)).await?;
        Ok(())
    }
}

/// Runs blocking cache I/O off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
}
