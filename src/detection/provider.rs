//! Detector backends
//!
//! Defines the detector trait and the remote (HTTP sidecar) implementation.
//! The in-process ONNX implementation lives in `onnx.rs` behind the `onnx`
//! feature.

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::types::{DetectionError, DetectionParams, RawDetection};
use crate::imaging;

/// Object detector trait
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Check if the backend can serve requests
    async fn is_available(&self) -> bool;

    /// Run detection on an image
    async fn detect(
        &self,
        image: &RgbImage,
        params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError>;

    /// Label for a class index
    fn class_name(&self, class_id: usize) -> Option<&str>;
}

/// Request body sent to the detection sidecar
#[derive(Debug, Serialize)]
struct RemoteDetectRequest<'a> {
    /// Base64-encoded PNG
    image: &'a str,
    confidence: f32,
    iou: f32,
}

/// Response body returned by the detection sidecar
#[derive(Debug, Deserialize)]
struct RemoteDetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

/// Detector served over HTTP by a model sidecar
///
/// The sidecar receives `{"image": <base64 png>, "confidence", "iou"}` and
/// answers `{"detections": [{"box": [x1, y1, x2, y2], "class_id", "confidence"}]}`.
pub struct RemoteDetector {
    client: reqwest::Client,
    url: String,
    labels: Vec<String>,
}

impl RemoteDetector {
    pub fn new(url: &str, labels: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            labels,
        }
    }
}

#[async_trait]
impl ObjectDetector for RemoteDetector {
    fn name(&self) -> &str {
        &self.url
    }

    async fn is_available(&self) -> bool {
        // Any HTTP answer means the sidecar is up
        self.client.get(&self.url).send().await.is_ok()
    }

    async fn detect(
        &self,
        image: &RgbImage,
        params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        use base64::Engine;

        let png = imaging::encode_png(image)
            .map_err(|e| DetectionError::ImageError(format!("Failed to encode image: {}", e)))?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(png);

        let request = RemoteDetectRequest {
            image: &image_base64,
            confidence: params.confidence,
            iou: params.iou,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DetectionError::ApiError(format!("Failed to call detector: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::ApiError(format!(
                "Detector returned {}: {}",
                status, body
            )));
        }

        let result: RemoteDetectResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(result
            .detections
            .into_iter()
            .filter(|d| d.confidence >= params.confidence)
            .collect())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Mock detector for testing
#[cfg(test)]
pub struct MockDetector {
    pub detections: Vec<RawDetection>,
    pub labels: Vec<String>,
    pub available: bool,
    /// Dimensions of every image passed to `detect`, and whether it was gray
    pub calls: parking_lot::Mutex<Vec<((u32, u32), bool)>>,
}

#[cfg(test)]
impl MockDetector {
    pub fn new(detections: Vec<RawDetection>, labels: &[&str]) -> Self {
        Self {
            detections,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            available: true,
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ObjectDetector for MockDetector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn detect(
        &self,
        image: &RgbImage,
        params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let gray = image.pixels().all(|p| p[0] == p[1] && p[1] == p[2]);
        self.calls.lock().push((image.dimensions(), gray));
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= params.confidence)
            .cloned()
            .collect())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}
