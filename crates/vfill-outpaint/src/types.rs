//! Replicate prediction request/response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /v1/models/{owner}/{name}/predictions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub input: PredictionInput,
}

/// Model input for an image-to-image outpaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    pub prompt: String,
    /// Seed canvas as a `data:image/png;base64,...` URI
    pub image: String,
    pub cfg: f64,
    pub num_inference_steps: u32,
    pub prompt_strength: f64,
    pub aspect_ratio: String,
    pub output_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub cancel: Option<String>,
}

/// A prediction as returned by create and get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    /// A file URL, or a list of them, depending on the model
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: PredictionUrls,
}

impl Prediction {
    /// First output file URL.
    pub fn output_url(&self) -> Option<&str> {
        match self.output.as_ref()? {
            Value::String(url) => Some(url.as_str()),
            Value::Array(items) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    pub fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => format!("prediction {} ended as {:?}", self.id, self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_url_shapes() {
        let single: Prediction = serde_json::from_value(json!({
            "id": "p1", "status": "succeeded", "output": "https://files/out.png"
        }))
        .unwrap();
        assert_eq!(single.output_url(), Some("https://files/out.png"));

        let list: Prediction = serde_json::from_value(json!({
            "id": "p2", "status": "succeeded", "output": ["https://files/a.png", "https://files/b.png"],
            "urls": {"get": "https://api/predictions/p2"}
        }))
        .unwrap();
        assert_eq!(list.output_url(), Some("https://files/a.png"));
        assert_eq!(list.urls.get.as_deref(), Some("https://api/predictions/p2"));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
    }
}
