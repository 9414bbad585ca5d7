//! Replicate HTTP client.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{ImageOutputFormat, RgbImage};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::backend::{OutpaintBackend, OutpaintRequest};
use crate::config::OutpaintConfig;
use crate::error::{OutpaintError, OutpaintResult};
use crate::types::{Prediction, PredictionInput, PredictionRequest, PredictionStatus};

const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for Replicate's prediction API.
pub struct ReplicateClient {
    http: Client,
    token: String,
    config: OutpaintConfig,
}

impl ReplicateClient {
    /// Create a new client. Fails without an API token.
    pub fn new(config: OutpaintConfig) -> OutpaintResult<Self> {
        let token = config
            .api_token
            .clone()
            .ok_or(OutpaintError::MissingCredentials)?;

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("vfill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(OutpaintError::Network)?;

        Ok(Self {
            http,
            token,
            config,
        })
    }

    /// Ask the service to stop a prediction this client gave up on.
    async fn cancel_prediction(&self, frame_index: u64, url: &str) {
        let sent = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .timeout(CANCEL_TIMEOUT)
            .send()
            .await;
        match sent {
            Ok(response) if response.status().is_success() => {
                debug!(frame = frame_index, "Cancelled abandoned prediction");
            }
            Ok(response) => {
                warn!(frame = frame_index, status = %response.status(), "Prediction cancel refused");
            }
            Err(e) => warn!(frame = frame_index, "Prediction cancel failed: {}", e),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> OutpaintResult<Self> {
        Self::new(OutpaintConfig::from_env())
    }

    pub fn config(&self) -> &OutpaintConfig {
        &self.config
    }

    /// Create and poll one prediction. `cancel_url` is filled as soon as the
    /// service reports one.
    async fn run_prediction(
        &self,
        request: &OutpaintRequest,
        cancel_url: &mut Option<String>,
    ) -> OutpaintResult<RgbImage> {
        let canvas = request.canvas.clone();
        let png = tokio::task::spawn_blocking(move || encode_png(&canvas))
            .await
            .map_err(|e| OutpaintError::InvalidOutput(format!("PNG encode task failed: {}", e)))??;

        let body = PredictionRequest {
            input: PredictionInput {
                prompt: request.prompt.clone(),
                image: format!("data:image/png;base64,{}", BASE64.encode(png)),
                cfg: self.config.cfg,
                num_inference_steps: self.config.num_inference_steps,
                prompt_strength: self.config.prompt_strength,
                aspect_ratio: "9:16".to_string(),
                output_format: "png".to_string(),
            },
        };

        let url = self.config.predictions_url();
        debug!(frame = request.frame_index, "Creating prediction at {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let mut prediction: Prediction = check_status(response).await?.json().await?;
        cancel_url.clone_from(&prediction.urls.cancel);

        while !prediction.status.is_terminal() {
            let poll_url = prediction.urls.get.clone().ok_or_else(|| {
                OutpaintError::InvalidOutput(format!(
                    "prediction {} is {:?} without a poll URL",
                    prediction.id, prediction.status
                ))
            })?;
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .http
                .get(&poll_url)
                .bearer_auth(&self.token)
                .send()
                .await?;
            prediction = check_status(response).await?.json().await?;
            debug!(
                frame = request.frame_index,
                prediction = %prediction.id,
                status = ?prediction.status,
                "Polled prediction"
            );
        }

        match prediction.status {
            PredictionStatus::Succeeded => {}
            _ => return Err(OutpaintError::from_prediction_error(&prediction.error_message())),
        }

        let output_url = prediction.output_url().ok_or_else(|| {
            OutpaintError::InvalidOutput(format!("prediction {} has no output", prediction.id))
        })?;
        let bytes = self.fetch_output(output_url).await?;

        tokio::task::spawn_blocking(move || decode_image(&bytes))
            .await
            .map_err(|e| OutpaintError::InvalidOutput(format!("image decode task failed: {}", e)))?
    }

    async fn fetch_output(&self, url: &str) -> OutpaintResult<Vec<u8>> {
        if let Some(data) = url.strip_prefix("data:") {
            let (_, encoded) = data
                .split_once(";base64,")
                .ok_or_else(|| OutpaintError::InvalidOutput("unsupported data URI".to_string()))?;
            return BASE64
                .decode(encoded)
                .map_err(|e| OutpaintError::InvalidOutput(format!("bad base64 output: {}", e)));
        }

        let response = self.http.get(url).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl OutpaintBackend for ReplicateClient {
    async fn outpaint(&self, request: &OutpaintRequest) -> OutpaintResult<RgbImage> {
        let timeout = self.config.request_timeout;
        let mut cancel_url = None;
        let outcome =
            tokio::time::timeout(timeout, self.run_prediction(request, &mut cancel_url)).await;
        let result = match outcome {
            Ok(Err(OutpaintError::Network(e))) if e.is_timeout() => {
                Err(OutpaintError::Timeout(timeout.as_secs()))
            }
            Ok(result) => return result,
            Err(_) => {
                warn!(frame = request.frame_index, "Outpaint attempt timed out after {:?}", timeout);
                Err(OutpaintError::Timeout(timeout.as_secs()))
            }
        };

        if let Some(url) = cancel_url {
            self.cancel_prediction(request.frame_index, &url).await;
        }
        result
    }

    fn name(&self) -> &str {
        "replicate"
    }
}

async fn check_status(response: Response) -> OutpaintResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(OutpaintError::from_status(status.as_u16(), &body))
}

fn encode_png(image: &RgbImage) -> OutpaintResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

fn decode_image(bytes: &[u8]) -> OutpaintResult<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| OutpaintError::InvalidOutput(format!("undecodable image: {}", e)))?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_token() {
        assert!(matches!(
            ReplicateClient::new(OutpaintConfig::default()),
            Err(OutpaintError::MissingCredentials)
        ));
        assert!(ReplicateClient::new(OutpaintConfig::default().with_token("t")).is_ok());
    }

    #[test]
    fn test_png_round_trip_preserves_size() {
        let image = RgbImage::from_pixel(9, 16, image::Rgb([1, 2, 3]));
        let decoded = decode_image(&encode_png(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_garbage_output_is_rejected() {
        let err = decode_image(b"<html>not an image</html>").unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Rejected);
    }
}
