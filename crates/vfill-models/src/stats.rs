//! Per-job statistics surfaced to the caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ExtensionStatus;

/// Counters collected over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStats {
    /// Frames decoded from the source (equals frames encoded)
    pub total_frames: u64,
    /// Frames submitted to the outpainting adapter
    pub sampled_frames: u64,
    /// Frames whose extension came from the AI service
    pub ai_generated: u64,
    /// Frames whose extension came from the local fallback
    pub fallback_generated: u64,
    /// Frames whose extension was interpolated
    pub interpolated: u64,
    /// Outbound requests made to the outpainting service
    pub api_calls: u64,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: u64,
    /// True when the AI service degraded and fallback output was used
    pub degraded: bool,
    /// Human-readable warnings (deduplicated)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobStats {
    /// Count one frame's extension under its status tag.
    pub fn record(&mut self, status: ExtensionStatus) {
        match status {
            ExtensionStatus::AiGenerated => self.ai_generated += 1,
            ExtensionStatus::FallbackGenerated => self.fallback_generated += 1,
            ExtensionStatus::Interpolated => self.interpolated += 1,
        }
    }

    /// Add a warning unless an identical one is already present.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    /// Number of frames that received an extension.
    pub fn extended_frames(&self) -> u64 {
        self.ai_generated + self.fallback_generated + self.interpolated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_warn() {
        let mut stats = JobStats::default();
        stats.record(ExtensionStatus::AiGenerated);
        stats.record(ExtensionStatus::Interpolated);
        stats.record(ExtensionStatus::Interpolated);
        stats.warn("fallback used");
        stats.warn("fallback used");

        assert_eq!(stats.ai_generated, 1);
        assert_eq!(stats.interpolated, 2);
        assert_eq!(stats.extended_frames(), 3);
        assert_eq!(stats.warnings.len(), 1);
    }
}
