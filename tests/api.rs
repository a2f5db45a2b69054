//! HTTP API tests with in-memory detectors and recognizers

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum_test::TestServer;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use tower::ServiceExt;

use thai_id_ocr_server::config::Config;
use thai_id_ocr_server::detection::{
    CardLocalizer, DetectionError, DetectionParams, FieldLocalizer, ObjectDetector, RawDetection,
};
use thai_id_ocr_server::entity::{EntityMapper, MappingPolicy};
use thai_id_ocr_server::imaging::encode_png;
use thai_id_ocr_server::ocr::{FieldReader, LanguageHint, OcrError, OcrProvider, TextRecognizer};
use thai_id_ocr_server::pipeline::Pipeline;
use thai_id_ocr_server::routes;
use thai_id_ocr_server::state::AppState;

const BOUNDARY: &str = "thai-id-test-boundary";

struct FixedDetector {
    detections: Vec<RawDetection>,
    labels: Vec<String>,
}

impl FixedDetector {
    fn new(detections: Vec<RawDetection>, labels: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            detections,
            labels: labels.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[async_trait]
impl ObjectDetector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn detect(
        &self,
        _image: &RgbImage,
        _params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        Ok(self.detections.clone())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Answers with one fixed string per language hint
struct ScriptedRecognizer;

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn read(&self, _region: &RgbImage, language: LanguageHint) -> Result<String, OcrError> {
        Ok(match language {
            LanguageHint::Mixed => "1 2345 67890 12 3\n",
            LanguageHint::English => "MR JOHN SMITH",
            LanguageHint::Thai => " พุทธ\x0c",
        }
        .to_string())
    }
}

fn raw(bbox: [f32; 4], class_id: usize, confidence: f32) -> RawDetection {
    RawDetection {
        bbox,
        class_id,
        confidence,
    }
}

fn pipeline(card: Vec<RawDetection>) -> Pipeline {
    let fields = vec![
        raw([5.0, 5.0, 100.0, 20.0], 0, 0.9),
        raw([5.0, 30.0, 150.0, 45.0], 1, 0.8),
        raw([5.0, 60.0, 80.0, 75.0], 2, 0.7),
    ];

    Pipeline::new(
        CardLocalizer::new(FixedDetector::new(card, &["card"]), DetectionParams::default()),
        FieldLocalizer::new(
            FixedDetector::new(fields, &["id_card", "en_name", "religion"]),
            DetectionParams::default(),
        ),
        FieldReader::new(Arc::new(ScriptedRecognizer)),
        EntityMapper::new(MappingPolicy::Cleanup),
    )
}

async fn ready_state() -> AppState {
    AppState::with_pipeline(Config::default(), pipeline(vec![raw([10.0, 10.0, 190.0, 110.0], 0, 0.95)])).await
}

fn card_png() -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(200, 120, Rgb([220, 220, 220]))).unwrap()
}

fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn post_upload(state: AppState, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let response = routes::app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn extracts_entities_from_card_photo() {
    let body = multipart_body("file", "card.png", &card_png());
    let (status, json) = post_upload(ready_state().await, "/ocr/thai-id", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "id_card": "1234567890123",
            "en_prefix": "MR",
            "en_firstname": "JOHN",
            "en_lastname": "SMITH",
            "religion": "พุทธ",
        })
    );
}

#[tokio::test]
async fn all_extraction_routes_share_handler() {
    for uri in ["/ocr/thai-id/", "/upload"] {
        let body = multipart_body("file", "card.png", &card_png());
        let (status, json) = post_upload(ready_state().await, uri, body).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(json["id_card"], "1234567890123");
    }
}

#[tokio::test]
async fn no_card_is_bad_request() {
    let state = AppState::with_pipeline(Config::default(), pipeline(vec![])).await;
    let body = multipart_body("file", "blank.png", &card_png());
    let (status, json) = post_upload(state, "/ocr/thai-id", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "card_not_found");
    assert_eq!(json["message"], "Could not detect an ID card in the image.");
}

#[tokio::test]
async fn missing_file_field_is_bad_request() {
    let body = multipart_body("photo", "card.png", &card_png());
    let (status, json) = post_upload(ready_state().await, "/ocr/thai-id", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn undecodable_image_is_bad_request() {
    let body = multipart_body("file", "card.jpg", b"definitely not a jpeg");
    let (status, json) = post_upload(ready_state().await, "/ocr/thai-id", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn missing_models_is_service_unavailable() {
    let state = AppState::without_pipeline(Config::default(), "card model missing".to_string());
    let body = multipart_body("file", "card.png", &card_png());
    let (status, json) = post_upload(state, "/ocr/thai-id", body).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "service_unavailable");
    assert_eq!(json["message"], "card model missing");
}

async fn post_raw(state: AppState, content_type: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/ocr/thai-id")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from("{}"))
        .unwrap();

    let response = routes::app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn non_multipart_body_is_json_bad_request() {
    let (status, json) = post_raw(ready_state().await, "application/json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn missing_models_checked_before_body() {
    let state = AppState::without_pipeline(Config::default(), "card model missing".to_string());
    let (status, json) = post_raw(state, "application/json").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "service_unavailable");
}

#[tokio::test]
async fn health_reports_model_status() {
    let server = TestServer::new(routes::app(ready_state().await)).unwrap();
    let response = server.get("/health").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "thai-id-ocr-server");
    assert_eq!(json["models_loaded"], true);

    let state = AppState::without_pipeline(Config::default(), "not built".to_string());
    let server = TestServer::new(routes::app(state)).unwrap();
    let json: Value = server.get("/health").await.json();
    assert_eq!(json["models_loaded"], false);
}
