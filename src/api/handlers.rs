//! API Handlers
//!
//! HTTP request handlers for each preview server endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::DomainAuthorizer;
use crate::cache::DiskCache;
use crate::compress::CompressionThrottle;
use crate::config::{CacheSettings, Config};
use crate::error::Result;
use crate::generator::{MetadataFetcher, Renderer, ScreenshotGenerator};
use crate::github::{GithubService, RepoFetcher};
use crate::models::{HealthResponse, NamespaceStats, PreviewQuery, QrCodeQuery, StatsResponse};
use crate::pipeline::{Artifact, LinkPreviewService, Pipeline, QrCodeService};
use crate::qr::{PngQrEncoder, QrEncoder};
use crate::registry::{DomainRegistry, InMemoryUsageLog};
use crate::tasks::PruneTarget;

/// Served artifacts are immutable for a given URL.
const CACHE_CONTROL: &str = "max-age=31536000, immutable";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub link_previews: Arc<LinkPreviewService>,
    pub qr_codes: Arc<QrCodeService>,
    pub github: Arc<GithubService>,
}

impl AppState {
    /// Creates a new AppState from the namespace services.
    pub fn new(link_previews: LinkPreviewService, qr_codes: QrCodeService, github: GithubService) -> Self {
        Self {
            link_previews: Arc::new(link_previews),
            qr_codes: Arc::new(qr_codes),
            github: Arc::new(github),
        }
    }

    /// Wires every namespace from configuration. The image namespaces share
    /// the registry and one compression throttle; each namespace gets its
    /// own cache root.
    pub fn from_config(
        config: &Config,
        registry: Arc<dyn DomainRegistry>,
        renderer: Arc<dyn Renderer>,
        metadata: Arc<dyn MetadataFetcher>,
        github: Arc<dyn RepoFetcher>,
    ) -> Self {
        Self::with_encoder(config, registry, renderer, metadata, github, Arc::new(PngQrEncoder::default()))
    }

    pub fn with_encoder(
        config: &Config,
        registry: Arc<dyn DomainRegistry>,
        renderer: Arc<dyn Renderer>,
        metadata: Arc<dyn MetadataFetcher>,
        github: Arc<dyn RepoFetcher>,
        encoder: Arc<dyn QrEncoder>,
    ) -> Self {
        let authorizer = DomainAuthorizer::new(registry);
        let throttle = CompressionThrottle::for_available_parallelism();

        let disk_cache = |settings: &CacheSettings, root: PathBuf| {
            DiskCache::new(root)
                .with_ttl(settings.ttl)
                .with_max_size(settings.max_size_bytes)
        };
        let pipeline = |namespace: &'static str, settings: &CacheSettings, root: PathBuf| {
            Pipeline::new(
                namespace,
                authorizer.clone(),
                Arc::new(disk_cache(settings, root)),
                throttle.clone(),
                Arc::new(InMemoryUsageLog::new()),
            )
            .with_cache_enabled(settings.enabled)
        };

        let link_previews = LinkPreviewService::new(
            pipeline("link-previews", &config.link_preview_cache, config.link_preview_cache_dir()),
            ScreenshotGenerator::new(renderer, metadata),
        )
        .with_default_selector(config.default_selector.clone())
        .with_timeout(config.screenshot_timeout);

        let qr_codes = QrCodeService::new(
            pipeline("qr-codes", &config.qr_code_cache, config.qr_code_cache_dir()),
            encoder,
        );

        let github = GithubService::new(
            Arc::new(disk_cache(&config.github_cache, config.github_cache_dir())),
            github,
        )
        .with_cache_enabled(config.github_cache.enabled);

        Self::new(link_previews, qr_codes, github)
    }

    /// Usage logs of every image namespace, plus the stores of every
    /// namespace whose cache is enabled.
    pub fn prune_targets(&self) -> Vec<PruneTarget> {
        let mut targets: Vec<PruneTarget> = [self.link_previews.pipeline(), self.qr_codes.pipeline()]
            .into_iter()
            .map(|p| PruneTarget {
                namespace: p.namespace(),
                store: p.cache_enabled().then(|| p.store().clone()),
                usage: Some(p.usage().clone()),
            })
            .collect();
        if self.github.cache_enabled() {
            targets.push(PruneTarget {
                namespace: "github",
                store: Some(self.github.store().clone()),
                usage: None,
            });
        }
        targets
    }
}

fn png_response(artifact: Artifact) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// Handler for GET /link-preview/v1?url=...&sel=...
pub async fn link_preview_handler(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response> {
    let artifact = state
        .link_previews
        .preview(query.url.as_deref(), query.sel.as_deref())
        .await?;
    Ok(png_response(artifact))
}

/// Handler for GET /qrcode/v1?url=...
pub async fn qr_code_handler(
    State(state): State<AppState>,
    Query(query): Query<QrCodeQuery>,
) -> Result<Response> {
    let artifact = state.qr_codes.qr_code(query.url.as_deref()).await?;
    Ok(png_response(artifact))
}

/// Handler for GET /github/v1/:user/:repo/:type
pub async fn github_handler(
    State(state): State<AppState>,
    Path((user, repo, field)): Path<(String, String, String)>,
) -> Result<Response> {
    let value = state.github.repo_field(&user, &repo, &field).await?;
    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], value).into_response())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        link_previews: NamespaceStats::new(
            state.link_previews.pipeline().cache_enabled(),
            state.link_previews.stats().await,
        ),
        qr_codes: NamespaceStats::new(
            state.qr_codes.pipeline().cache_enabled(),
            state.qr_codes.stats().await,
        ),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
