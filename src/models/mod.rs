//! Request and Response models for the preview server API
//!
//! Query-string DTOs for the artifact endpoints and JSON bodies for the
//! operational endpoints.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{PreviewQuery, QrCodeQuery};
pub use responses::{HealthResponse, NamespaceStats, StatsResponse};
