//! Domain Authorization
//!
//! Canonicalizes user-supplied URLs and gates them on the domain registry.
//! Unknown hostnames are registered as unauthorized on first sight so
//! operators can triage real traffic later.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

use crate::registry::{DomainRegistry, RegistryError};

// == Auth Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing url")]
    MissingUrl,

    #[error("invalid url")]
    InvalidUrl,

    #[error("domain {0} not authorized")]
    DomainNotAuthorized(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// == Canonicalize ==
/// Parses a user-supplied URL, defaulting the scheme to `https://`.
///
/// Only `http` and `https` URLs with a host are accepted.
pub fn canonicalize(user_url: &str) -> Result<Url, AuthError> {
    if user_url.is_empty() {
        return Err(AuthError::MissingUrl);
    }

    let candidate = if user_url.contains("://") {
        user_url.to_string()
    } else {
        format!("https://{user_url}")
    };

    let url = Url::parse(&candidate).map_err(|_| AuthError::InvalidUrl)?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(AuthError::InvalidUrl),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AuthError::InvalidUrl);
    }
    Ok(url)
}

/// Registry key for the URL's host. IPv6 literals are stored without
/// their URL brackets.
fn hostname(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}

// == Authorized URL ==
/// A canonical URL whose hostname passed the registry check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedUrl {
    /// Canonical URL string, also used as the cache key
    pub url: String,
    pub hostname: String,
}

// == Domain Authorizer ==
#[derive(Clone)]
pub struct DomainAuthorizer {
    registry: Arc<dyn DomainRegistry>,
}

impl DomainAuthorizer {
    pub fn new(registry: Arc<dyn DomainRegistry>) -> Self {
        Self { registry }
    }

    /// Canonicalizes `user_url` and checks its hostname against the registry.
    ///
    /// On rejection the hostname is registered as unauthorized (a no-op if
    /// it is already known) before `DomainNotAuthorized` is returned.
    pub async fn validate_and_authorize(&self, user_url: &str) -> Result<AuthorizedUrl, AuthError> {
        let url = canonicalize(user_url)?;
        let hostname = hostname(&url);

        if self.registry.is_authorized(&hostname).await? {
            return Ok(AuthorizedUrl {
                url: url.to_string(),
                hostname,
            });
        }

        debug!(hostname = %hostname, "registering unauthorized domain for triage");
        self.registry.insert_unauthorized(&hostname).await?;
        Err(AuthError::DomainNotAuthorized(hostname))
    }
}
