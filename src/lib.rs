//! Linkshot - link preview and QR code image server
//!
//! Screenshots a designated element of an authorized web page (falling back
//! to a templated card built from the page's metadata) or encodes the URL as
//! a QR code, and caches every artifact in a sharded on-disk store. A small
//! GitHub proxy serves live repository counts from the same cache layer.

pub mod api;
pub mod auth;
pub mod cache;
pub mod compress;
pub mod config;
pub mod error;
pub mod generator;
pub mod github;
pub mod models;
pub mod pipeline;
pub mod qr;
pub mod registry;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::AppError;
pub use tasks::spawn_maintenance_task;
