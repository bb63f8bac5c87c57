//! Request DTOs for the preview server API
//!
//! Both artifact endpoints take their input from the query string. Fields
//! are optional so that a missing `url` reaches the authorizer and gets the
//! same 401 as an invalid one.

use serde::Deserialize;

/// Query for `GET /link-preview/v1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    /// Page to preview; the scheme defaults to `https://`
    pub url: Option<String>,
    /// CSS selector (`#id` or `.class`) of the element to capture
    pub sel: Option<String>,
}

/// Query for `GET /qrcode/v1`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QrCodeQuery {
    pub url: Option<String>,
}
