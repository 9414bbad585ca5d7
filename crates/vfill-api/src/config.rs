//! API configuration.

use std::path::PathBuf;

/// Upload body limit: 500 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 500 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Root served under `/static`; uploads and outputs live below it
    pub static_dir: PathBuf,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP upload rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Take the client IP from `X-Forwarded-For`/`X-Real-IP` (only behind a proxy)
    pub trust_proxy_headers: bool,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 2,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            trust_proxy_headers: false,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_SIZE),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<PathBuf>) -> Self {
        self.static_dir = static_dir.into();
        self
    }

    /// Where uploaded sources are stored.
    pub fn uploads_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }

    /// Where `<stem>_vertical.mp4` outputs are written.
    pub fn output_dir(&self) -> PathBuf {
        self.static_dir.join("output")
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dirs() {
        let config = ApiConfig::default().with_static_dir("/srv/static");
        assert_eq!(config.uploads_dir(), PathBuf::from("/srv/static/uploads"));
        assert_eq!(config.output_dir(), PathBuf::from("/srv/static/output"));
        assert_eq!(config.max_body_size, 500 * 1024 * 1024);
        assert!(!config.is_production());
        assert!(!config.trust_proxy_headers);
    }
}
