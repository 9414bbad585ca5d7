//! Extension provenance tags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path produced a frame's top/bottom extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStatus {
    /// Returned by the remote outpainting service
    AiGenerated,
    /// Produced locally by the mirror-and-blur transform
    FallbackGenerated,
    /// Blended from the neighbouring sampled frames
    Interpolated,
}

impl ExtensionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionStatus::AiGenerated => "ai_generated",
            ExtensionStatus::FallbackGenerated => "fallback_generated",
            ExtensionStatus::Interpolated => "interpolated",
        }
    }
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sampled frame was served by the local fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradeReason {
    /// No API credentials configured for the job
    NoCredentials,
    /// Quota or credit exhaustion was observed during the job
    QuotaExhausted,
    /// All attempts failed with transient errors
    RetriesExhausted { attempts: u32, last_error: String },
    /// The service rejected the request outright
    Rejected { message: String },
}

impl DegradeReason {
    /// Whether this reason reflects a problem with the AI service rather than
    /// a deliberate fallback-only configuration.
    pub fn is_service_degradation(&self) -> bool {
        !matches!(self, DegradeReason::NoCredentials)
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::NoCredentials => write!(f, "no API credentials configured"),
            DegradeReason::QuotaExhausted => write!(f, "outpainting quota exhausted"),
            DegradeReason::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "gave up after {} attempts: {}", attempts, last_error),
            DegradeReason::Rejected { message } => write!(f, "request rejected: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ExtensionStatus::FallbackGenerated).unwrap(),
            "\"fallback_generated\""
        );
        assert_eq!(ExtensionStatus::Interpolated.to_string(), "interpolated");
    }

    #[test]
    fn test_degrade_reason_tagging() {
        let json = serde_json::to_value(DegradeReason::RetriesExhausted {
            attempts: 3,
            last_error: "timeout".to_string(),
        })
        .unwrap();
        assert_eq!(json["reason"], "retries_exhausted");
        assert_eq!(json["attempts"], 3);
        assert!(!DegradeReason::NoCredentials.is_service_degradation());
        assert!(DegradeReason::QuotaExhausted.is_service_degradation());
    }
}
