//! Outpainting client error types.

use thiserror::Error;

pub type OutpaintResult<T> = Result<T, OutpaintError>;

/// How the caller should react to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Worth another attempt after backoff
    Transient,
    /// Credentials or credit are gone; stop calling for the rest of the job
    QuotaExhausted,
    /// This request will not succeed; fall back for this frame only
    Rejected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::QuotaExhausted => "quota_exhausted",
            FailureKind::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum OutpaintError {
    #[error("No API token configured")]
    MissingCredentials,

    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl OutpaintError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body);
        if mentions_insufficient_credit(body) {
            return OutpaintError::QuotaExhausted(message);
        }
        match status {
            402 => OutpaintError::QuotaExhausted(message),
            401 | 403 => OutpaintError::Unauthorized { status, message },
            429 => OutpaintError::RateLimited(message),
            500..=599 => OutpaintError::ServiceUnavailable { status, message },
            _ => OutpaintError::Rejected { status, message },
        }
    }

    /// Map the error text of a failed prediction.
    pub fn from_prediction_error(message: &str) -> Self {
        if mentions_insufficient_credit(message) {
            OutpaintError::QuotaExhausted(truncate(message))
        } else {
            OutpaintError::PredictionFailed(truncate(message))
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            OutpaintError::MissingCredentials
            | OutpaintError::Unauthorized { .. }
            | OutpaintError::QuotaExhausted(_) => FailureKind::QuotaExhausted,
            OutpaintError::RateLimited(_)
            | OutpaintError::ServiceUnavailable { .. }
            | OutpaintError::Timeout(_)
            | OutpaintError::Network(_) => FailureKind::Transient,
            OutpaintError::Rejected { .. }
            | OutpaintError::PredictionFailed(_)
            | OutpaintError::InvalidOutput(_)
            | OutpaintError::Json(_)
            | OutpaintError::Image(_) => FailureKind::Rejected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

fn mentions_insufficient_credit(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("insufficient credit") || lower.contains("insufficient_credit")
}

/// Bodies can be whole HTML error pages.
fn truncate(text: &str) -> String {
    const MAX: usize = 300;
    let text = text.trim();
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
