//! Outpainting client configuration.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
pub const DEFAULT_MODEL: &str = "stability-ai/stable-diffusion-3.5-large";

/// Configuration for the outpainting client and its retry policy.
#[derive(Clone)]
pub struct OutpaintConfig {
    /// Replicate API token; `None` runs every job on the local fallback
    pub api_token: Option<String>,
    /// Base URL of the Replicate API
    pub base_url: String,
    /// Model in `owner/name` form
    pub model: String,
    /// Bound on one attempt (create, poll and download)
    pub request_timeout: Duration,
    /// Total attempts per frame, including the first
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt
    pub initial_backoff: Duration,
    /// Delay between prediction status polls
    pub poll_interval: Duration,
    /// Classifier-free guidance scale
    pub cfg: f64,
    /// Diffusion steps
    pub num_inference_steps: u32,
    /// How far the model may depart from the seeded canvas (0-1)
    pub prompt_strength: f64,
}

impl Default for OutpaintConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            cfg: 4.5,
            num_inference_steps: 20,
            prompt_strength: 0.85,
        }
    }
}

impl OutpaintConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_token: std::env::var("REPLICATE_API_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            base_url: std::env::var("REPLICATE_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: std::env::var("REPLICATE_MODEL").unwrap_or(defaults.model),
            request_timeout: Duration::from_secs(
                std::env::var("OUTPAINT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("OUTPAINT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries)
                .max(1),
            ..defaults
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_token.is_some()
    }

    /// Prediction endpoint for the configured model.
    pub fn predictions_url(&self) -> String {
        format!("{}/v1/models/{}/predictions", self.base_url, self.model)
    }
}

impl fmt::Debug for OutpaintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutpaintConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OutpaintConfig::default();
        assert!(!config.has_credentials());
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.predictions_url(),
            "https://api.replicate.com/v1/models/stability-ai/stable-diffusion-3.5-large/predictions"
        );
    }

    #[test]
    fn test_max_retries_has_floor_of_one() {
        assert_eq!(OutpaintConfig::default().with_max_retries(0).max_retries, 1);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = OutpaintConfig::default().with_token("r8_secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("r8_secret"));
        assert!(debug.contains("redacted"));
    }
}
