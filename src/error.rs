//! Error types for the preview server
//!
//! Every request failure funnels into [`AppError`], which maps itself onto an
//! HTTP status with a short plain-text body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::generator::GenerateError;
use crate::github::GithubError;

// == App Error Enum ==
#[derive(Error, Debug)]
pub enum AppError {
    /// URL missing, malformed, or on an unauthorized domain
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid selector")]
    InvalidSelector,

    #[error(transparent)]
    Generation(#[from] GenerateError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Github(#[from] GithubError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Registry(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidSelector => StatusCode::BAD_REQUEST,
            AppError::Generation(_) | AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Github(e) => e.status(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

// == Result Type Alias ==
pub type Result<T> = std::result::Result<T, AppError>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RenderError;
    use crate::registry::RegistryError;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(AuthError::MissingUrl).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::InvalidUrl).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(AuthError::DomainNotAuthorized("evil.com".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::InvalidSelector.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(AuthError::Registry(RegistryError::Unavailable("down".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(GenerateError::Render(RenderError::Unavailable)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(GenerateError::Timeout(Duration::from_secs(20))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(GithubError::Status(403)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(GithubError::FieldNotFound("stars".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(AppError::from(AuthError::MissingUrl).to_string(), "missing url");
        assert_eq!(AppError::InvalidSelector.to_string(), "invalid selector");
        assert_eq!(
            AppError::from(AuthError::DomainNotAuthorized("evil.com".into())).to_string(),
            "domain evil.com not authorized"
        );
    }
}
