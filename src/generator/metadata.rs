//! Page metadata used to populate the fallback preview.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; Linkshot/1.0)";
const DATA_HTML_PREFIX: &str = "data:text/html,";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(StatusCode),
}

/// Title and description of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError>;
}

/// Extracts metadata from an HTML document.
///
/// `og:title` wins over `<title>`; the description only comes from
/// `og:description`. Both are trimmed.
pub fn parse_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let og = |property: &str| -> Option<String> {
        let selector = Selector::parse(&format!(r#"meta[property="{property}"]"#)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    };

    let document_title = || -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    };

    let title = og("og:title")
        .filter(|t| !t.is_empty())
        .or_else(document_title)
        .unwrap_or_default();
    let description = og("og:description").unwrap_or_default();

    PageMetadata {
        title: title.trim().to_string(),
        description: description.trim().to_string(),
    }
}

/// Fetches pages over HTTP(S). `data:text/html,` URLs are parsed in place.
pub struct HttpMetadataFetcher {
    http: Client,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MetadataError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| MetadataError::Client(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        if let Some(html) = url.strip_prefix(DATA_HTML_PREFIX) {
            return Ok(parse_metadata(html));
        }

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(MetadataError::Status(response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        debug!(url, bytes = body.len(), "fetched page for metadata");
        Ok(parse_metadata(&body))
    }
}
