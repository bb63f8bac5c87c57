//! API Module
//!
//! HTTP handlers and routing for the preview server.
//!
//! # Endpoints
//! - `GET /link-preview/v1?url=...&sel=...` - PNG screenshot of a page element
//! - `GET /qrcode/v1?url=...` - PNG QR code for a URL
//! - `GET /stats` - Per-namespace pipeline counters
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
