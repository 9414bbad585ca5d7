//! Replicate client tests against a mock HTTP server.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageOutputFormat, Rgb, RgbImage};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vfill_outpaint::{
    FailureKind, OutpaintBackend, OutpaintConfig, OutpaintError, OutpaintRequest, ReplicateClient,
};

const PREDICTIONS: &str = "/v1/models/stability-ai/stable-diffusion-3.5-large/predictions";

fn client_for(server: &MockServer) -> ReplicateClient {
    let mut config = OutpaintConfig::default()
        .with_token("test-token")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5));
    config.poll_interval = Duration::from_millis(10);
    ReplicateClient::new(config).unwrap()
}

fn request() -> OutpaintRequest {
    OutpaintRequest {
        frame_index: 7,
        canvas: Arc::new(RgbImage::from_pixel(18, 32, Rgb([10, 20, 30]))),
        prompt: "sky above, grass below".to_string(),
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_synchronous_prediction_downloads_output() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .and(header("authorization", "Bearer test-token"))
        .and(header("prefer", "wait"))
        .and(body_partial_json(json!({
            "input": {"prompt": "sky above, grass below", "aspect_ratio": "9:16", "cfg": 4.5}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": [format!("{}/files/out.png", server.uri())]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/out.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(36, 64)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let image = client_for(&server).outpaint(&request()).await.unwrap();
    assert_eq!(image.dimensions(), (36, 64));
    assert_eq!(image.get_pixel(0, 0), &Rgb([200, 100, 50]));
}

#[tokio::test]
async fn test_polls_until_prediction_completes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p2",
            "status": "starting",
            "urls": {"get": format!("{}/v1/predictions/p2", server.uri())}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/predictions/p2"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p2",
            "status": "succeeded",
            "output": format!("{}/files/p2.png", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/p2.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(9, 16)))
        .mount(&server)
        .await;

    let image = client_for(&server).outpaint(&request()).await.unwrap();
    assert_eq!(image.dimensions(), (9, 16));
}

async fn error_kind_for(status: u16, body: &str) -> FailureKind {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;

    client_for(&server)
        .outpaint(&request())
        .await
        .unwrap_err()
        .kind()
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    assert_eq!(error_kind_for(402, "Payment required").await, FailureKind::QuotaExhausted);
    assert_eq!(error_kind_for(401, "Unauthenticated").await, FailureKind::QuotaExhausted);
    assert_eq!(error_kind_for(429, "Too many requests").await, FailureKind::Transient);
    assert_eq!(error_kind_for(502, "Bad gateway").await, FailureKind::Transient);
    assert_eq!(error_kind_for(422, "Invalid input").await, FailureKind::Rejected);
    assert_eq!(
        error_kind_for(400, r#"{"detail": "You have insufficient credit to run this model."}"#).await,
        FailureKind::QuotaExhausted
    );
}

#[tokio::test]
async fn test_failed_prediction_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p3",
            "status": "failed",
            "error": "NSFW content detected"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).outpaint(&request()).await.unwrap_err();
    assert!(matches!(err, OutpaintError::PredictionFailed(_)));
    assert_eq!(err.kind(), FailureKind::Rejected);
}

#[tokio::test]
async fn test_undecodable_output_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p4",
            "status": "succeeded",
            "output": format!("{}/files/broken.png", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/broken.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a png"))
        .mount(&server)
        .await;

    let err = client_for(&server).outpaint(&request()).await.unwrap_err();
    assert!(matches!(err, OutpaintError::InvalidOutput(_)));
}

#[tokio::test]
async fn test_slow_service_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(
            ResponseTemplate::new(201)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"id": "p5", "status": "starting"})),
        )
        .mount(&server)
        .await;

    let config = OutpaintConfig::default()
        .with_token("test-token")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));
    let client = ReplicateClient::new(config).unwrap();

    let err = client.outpaint(&request()).await.unwrap_err();
    assert!(matches!(err, OutpaintError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_timed_out_prediction_is_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p6",
            "status": "starting",
            "urls": {
                "get": format!("{}/v1/predictions/p6", server.uri()),
                "cancel": format!("{}/v1/predictions/p6/cancel", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/p6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p6",
            "status": "processing"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/predictions/p6/cancel"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p6",
            "status": "canceled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = OutpaintConfig::default()
        .with_token("test-token")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(300));
    config.poll_interval = Duration::from_millis(20);
    let client = ReplicateClient::new(config).unwrap();

    let err = client.outpaint(&request()).await.unwrap_err();
    assert!(matches!(err, OutpaintError::Timeout(_)));
    server.verify().await;
}

#[tokio::test]
async fn test_finished_prediction_is_not_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICTIONS))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p7",
            "status": "failed",
            "error": "bad input",
            "urls": {"cancel": format!("{}/v1/predictions/p7/cancel", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/predictions/p7/cancel"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server).outpaint(&request()).await.unwrap_err();
    assert!(matches!(err, OutpaintError::PredictionFailed(_)));
    server.verify().await;
}
