//! API Routes
//!
//! Configures the Axum router with all preview server endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    github_handler, health_handler, link_preview_handler, qr_code_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: previews are embedded from any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/link-preview/v1", get(link_preview_handler))
        .route("/qrcode/v1", get(qr_code_handler))
        .route("/github/v1/:user/:repo/:type", get(github_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::generator::{HttpMetadataFetcher, UnavailableRenderer};
    use crate::github::HttpRepoFetcher;
    use crate::registry::InMemoryDomainRegistry;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn create_test_app(dir: &TempDir) -> Router {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let state = AppState::from_config(
            &config,
            Arc::new(InMemoryDomainRegistry::new()),
            Arc::new(UnavailableRenderer),
            Arc::new(HttpMetadataFetcher::new(Duration::from_secs(1)).unwrap()),
            Arc::new(HttpRepoFetcher::new(Duration::from_secs(1)).unwrap()),
        );
        create_router(state)
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        assert_eq!(status_of(create_test_app(&dir), "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let dir = TempDir::new().unwrap();
        assert_eq!(status_of(create_test_app(&dir), "/stats").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_url_unauthorized() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            status_of(create_test_app(&dir), "/link-preview/v1").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(create_test_app(&dir), "/qrcode/v1").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_github_rejects_bad_params_offline() {
        let dir = TempDir::new().unwrap();
        for uri in [
            "/github/v1/chimbori/butterfly/license",
            "/github/v1/chimbori/bad%20repo/stars",
            "/github/v1/chim$bori/butterfly/stars",
        ] {
            assert_eq!(status_of(create_test_app(&dir), uri).await, StatusCode::BAD_REQUEST, "{uri}");
        }
        assert_eq!(
            status_of(create_test_app(&dir), "/github/v1/chimbori/butterfly").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = TempDir::new().unwrap();
        for uri in ["/link-preview/v2?url=chimbori.com", "/qrcode", "/"] {
            assert_eq!(status_of(create_test_app(&dir), uri).await, StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
