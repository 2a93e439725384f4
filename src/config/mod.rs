use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub i18n: I18nConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Externally visible base URL, reported at startup
    #[serde(default)]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            public_url: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// How long a session stays valid, in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Admin account created on startup when missing
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Password for the bootstrap admin; no admin is created when unset
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Mark the session cookie `Secure` (disable for plain-HTTP local development)
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            admin_email: default_admin_email(),
            admin_password: None,
            cookie_name: default_cookie_name(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

fn default_session_days() -> i64 {
    30
}

fn default_admin_email() -> String {
    "admin@nailmatch.local".to_string()
}

fn default_cookie_name() -> String {
    "nailmatch_session".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory for uploaded images (default: <data_dir>/uploads)
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Maximum accepted file size in bytes (default: 8 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    /// Hosts that may serve work/reference images besides our own uploads
    #[serde(default = "default_remote_image_hosts")]
    pub remote_image_hosts: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_bytes: default_max_upload_bytes(),
            allowed_content_types: default_allowed_content_types(),
            remote_image_hosts: default_remote_image_hosts(),
        }
    }
}

impl UploadConfig {
    /// Resolve the upload directory against the data directory
    pub fn resolve_dir(&self, data_dir: &Path) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| data_dir.join("uploads"))
    }
}

fn default_max_upload_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_remote_image_hosts() -> Vec<String> {
    vec![
        "utfs.io".to_string(),
        "images.unsplash.com".to_string(),
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct I18nConfig {
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            locales: default_locales(),
        }
    }
}

fn default_locale() -> String {
    "pl".to_string()
}

fn default_locales() -> Vec<String> {
    vec!["pl".to_string(), "en".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// City slug used when a location cannot be resolved
    #[serde(default = "default_city")]
    pub default_city: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            default_city: default_city(),
        }
    }
}

fn default_city() -> String {
    "warszawa".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests per window for general API endpoints
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    /// Requests per window for login/register
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Requests per window for image uploads
    #[serde(default = "default_upload_requests")]
    pub upload_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP` instead of the peer
    /// address. Only safe behind a reverse proxy that sets these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            upload_requests_per_window: default_upload_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_api_requests() -> u32 {
    120
}

fn default_auth_requests() -> u32 {
    20
}

fn default_upload_requests() -> u32 {
    30
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Apply `NAILMATCH_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("NAILMATCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("NAILMATCH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("NAILMATCH_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Ok(password) = std::env::var("NAILMATCH_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(password);
        }
        if let Ok(level) = std::env::var("NAILMATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(trust) = std::env::var("NAILMATCH_TRUST_PROXY_HEADERS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.rate_limit.trust_proxy_headers = trust;
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            uploads: UploadConfig::default(),
            i18n: I18nConfig::default(),
            geo: GeoConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.uploads.resolve_dir(&self.server.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.i18n.default_locale, "pl");
        assert_eq!(config.geo.default_city, "warszawa");
        assert!(config.auth.admin_password.is_none());
        assert_eq!(config.upload_dir(), PathBuf::from("./data/uploads"));
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8081

            [uploads]
            max_bytes = 1024
            remote_image_hosts = ["cdn.example.com"]

            [rate_limit]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.uploads.max_bytes, 1024);
        assert_eq!(config.uploads.remote_image_hosts, vec!["cdn.example.com"]);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.auth_requests_per_window, 20);
        assert!(!config.rate_limit.trust_proxy_headers);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("[server\nport = ").is_err());
    }
}
