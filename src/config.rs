//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::DEFAULT_SELECTOR;
use crate::tasks::Retention;

const ONE_GIB: u64 = 1024 * 1024 * 1024;

/// Per-namespace cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Entries older than this are ignored; zero disables expiry
    pub ttl: Duration,
    /// Prune target in bytes; zero means unbounded
    pub max_size_bytes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::ZERO,
            max_size_bytes: ONE_GIB,
        }
    }
}

impl CacheSettings {
    fn from_env(prefix: &str, defaults: Self) -> Self {
        Self {
            enabled: parse_var(&format!("{prefix}_CACHE_ENABLED")).unwrap_or(defaults.enabled),
            ttl: parse_var(&format!("{prefix}_CACHE_TTL_SECS"))
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            max_size_bytes: parse_var(&format!("{prefix}_CACHE_MAX_SIZE_BYTES"))
                .unwrap_or(defaults.max_size_bytes),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Root for all on-disk state
    pub data_dir: PathBuf,
    pub debug: bool,
    pub link_preview_cache: CacheSettings,
    /// Deadline for one link preview generation, fallback included
    pub screenshot_timeout: Duration,
    pub default_selector: String,
    pub qr_code_cache: CacheSettings,
    /// Raw GitHub API responses; expires after an hour by default
    pub github_cache: CacheSettings,
    /// Deadline for one GitHub API request
    pub github_timeout: Duration,
    pub maintenance_interval: Duration,
    /// Unauthorized domains untouched for longer than this are purged
    pub domain_retention: Duration,
    /// Usage records unused for longer than this are purged
    pub usage_retention: Duration,
    /// Seed entries for the domain registry
    pub authorized_domains: Vec<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 9999)
    /// - `DATA_DIR` - Data directory (default: ./data)
    /// - `DEBUG` - Debug logging (default: false)
    /// - `LINK_PREVIEW_CACHE_ENABLED` / `_TTL_SECS` / `_MAX_SIZE_BYTES`
    /// - `SCREENSHOT_TIMEOUT_SECS` - Generation deadline (default: 20)
    /// - `DEFAULT_SELECTOR` - Selector when none is given (default: #link-preview)
    /// - `QR_CODE_CACHE_ENABLED` / `_TTL_SECS` / `_MAX_SIZE_BYTES`
    /// - `GITHUB_CACHE_ENABLED` / `_TTL_SECS` / `_MAX_SIZE_BYTES` (TTL default: 1 hour)
    /// - `GITHUB_TIMEOUT_SECS` - GitHub API deadline (default: 10)
    /// - `MAINTENANCE_INTERVAL_SECS` - Maintenance frequency (default: 7200)
    /// - `DOMAIN_RETENTION_SECS` - Unauthorized domain retention (default: 7 days)
    /// - `USAGE_RETENTION_SECS` - Usage record retention (default: 30 days)
    /// - `AUTHORIZED_DOMAINS` - Comma-separated list, `*.` prefix includes subdomains
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            debug: parse_var("DEBUG").unwrap_or(defaults.debug),
            link_preview_cache: CacheSettings::from_env("LINK_PREVIEW", defaults.link_preview_cache.clone()),
            screenshot_timeout: parse_var("SCREENSHOT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.screenshot_timeout),
            default_selector: env::var("DEFAULT_SELECTOR")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.default_selector),
            qr_code_cache: CacheSettings::from_env("QR_CODE", defaults.qr_code_cache.clone()),
            github_cache: CacheSettings::from_env("GITHUB", defaults.github_cache.clone()),
            github_timeout: parse_var("GITHUB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.github_timeout),
            maintenance_interval: parse_var("MAINTENANCE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.maintenance_interval),
            domain_retention: parse_var("DOMAIN_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.domain_retention),
            usage_retention: parse_var("USAGE_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.usage_retention),
            authorized_domains: env::var("AUTHORIZED_DOMAINS")
                .map(|v| parse_domain_list(&v))
                .unwrap_or_default(),
        }
    }

    pub fn link_preview_cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache").join("link-previews")
    }

    /// Both purge windows the maintenance task applies.
    pub fn retention(&self) -> Retention {
        Retention {
            domains: self.domain_retention,
            usage: self.usage_retention,
        }
    }

    pub fn qr_code_cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache").join("qr-codes")
    }

    pub fn github_cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache").join("github")
    }

    /// Human-readable warnings about disabled or risky settings.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, cache) in [
            ("link preview", &self.link_preview_cache),
            ("QR code", &self.qr_code_cache),
            ("GitHub", &self.github_cache),
        ] {
            if !cache.enabled {
                warnings.push(format!("{name} cache is disabled"));
            } else if cache.max_size_bytes == 0 {
                warnings.push(format!("{name} cache has no size limit"));
            }
        }
        if self.screenshot_timeout.is_zero() {
            warnings.push("screenshot timeout is zero; every link preview will time out".to_string());
        }
        if self.authorized_domains.is_empty() {
            warnings.push("no authorized domains configured; every request will be rejected".to_string());
        }
        warnings
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 9999,
            data_dir: PathBuf::from("./data"),
            debug: false,
            link_preview_cache: CacheSettings::default(),
            screenshot_timeout: Duration::from_secs(20),
            default_selector: DEFAULT_SELECTOR.to_string(),
            qr_code_cache: CacheSettings::default(),
            github_cache: CacheSettings {
                ttl: Duration::from_secs(60 * 60),
                ..CacheSettings::default()
            },
            github_timeout: Duration::from_secs(10),
            maintenance_interval: Duration::from_secs(2 * 60 * 60),
            domain_retention: Duration::from_secs(7 * 24 * 60 * 60),
            usage_retention: Duration::from_secs(30 * 24 * 60 * 60),
            authorized_domains: Vec::new(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(!config.debug);
        assert_eq!(config.link_preview_cache, CacheSettings::default());
        assert_eq!(config.link_preview_cache.max_size_bytes, ONE_GIB);
        assert_eq!(config.screenshot_timeout, Duration::from_secs(20));
        assert_eq!(config.default_selector, "#link-preview");
        assert_eq!(config.maintenance_interval, Duration::from_secs(7200));
    }

    #[test]
    fn test_cache_dirs() {
        let config = Config {
            data_dir: PathBuf::from("/srv/linkshot"),
            ..Config::default()
        };
        assert_eq!(
            config.link_preview_cache_dir(),
            PathBuf::from("/srv/linkshot/cache/link-previews")
        );
        assert_eq!(config.qr_code_cache_dir(), PathBuf::from("/srv/linkshot/cache/qr-codes"));
        assert_eq!(config.github_cache_dir(), PathBuf::from("/srv/linkshot/cache/github"));
    }

    #[test]
    fn test_parse_domain_list() {
        assert_eq!(
            parse_domain_list(" Chimbori.com, *.tungare.name,,"),
            vec!["chimbori.com".to_string(), "*.tungare.name".to_string()]
        );
        assert!(parse_domain_list("").is_empty());
    }

    #[test]
    fn test_warnings() {
        let mut config = Config {
            authorized_domains: vec!["chimbori.com".into()],
            ..Config::default()
        };
        assert!(config.warnings().is_empty());

        config.qr_code_cache.enabled = false;
        config.link_preview_cache.max_size_bytes = 0;
        let warnings = config.warnings();
        assert!(warnings.contains(&"QR code cache is disabled".to_string()));
        assert!(warnings.contains(&"link preview cache has no size limit".to_string()));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for var in [
            "SERVER_PORT",
            "DATA_DIR",
            "DEBUG",
            "LINK_PREVIEW_CACHE_ENABLED",
            "LINK_PREVIEW_CACHE_TTL_SECS",
            "LINK_PREVIEW_CACHE_MAX_SIZE_BYTES",
            "SCREENSHOT_TIMEOUT_SECS",
            "DEFAULT_SELECTOR",
            "QR_CODE_CACHE_ENABLED",
            "QR_CODE_CACHE_TTL_SECS",
            "QR_CODE_CACHE_MAX_SIZE_BYTES",
            "GITHUB_CACHE_ENABLED",
            "GITHUB_CACHE_TTL_SECS",
            "GITHUB_CACHE_MAX_SIZE_BYTES",
            "GITHUB_TIMEOUT_SECS",
            "MAINTENANCE_INTERVAL_SECS",
            "DOMAIN_RETENTION_SECS",
            "USAGE_RETENTION_SECS",
            "AUTHORIZED_DOMAINS",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.qr_code_cache, CacheSettings::default());
        assert_eq!(config.github_cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.github_timeout, Duration::from_secs(10));
        assert_eq!(config.domain_retention, Duration::from_secs(604_800));
        assert_eq!(config.usage_retention, Duration::from_secs(2_592_000));
        assert!(config.authorized_domains.is_empty());
    }
}
