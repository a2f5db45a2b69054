//! OCR Providers
//!
//! Defines the recognizer trait and implementations for different OCR backends.

use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::types::{LanguageHint, OcrError, OcrProvider};
use crate::imaging;

/// Text recognizer trait
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider is available
    async fn is_available(&self) -> bool;

    /// Read the text in an image region
    ///
    /// An empty string means nothing was recognized.
    async fn read(&self, region: &RgbImage, language: LanguageHint) -> Result<String, OcrError>;
}

/// Tesseract configuration
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Path to tesseract executable (default: "tesseract" - uses PATH)
    pub tesseract_path: String,
    /// Page segmentation mode (default: 7, single text line)
    pub psm: u8,
    /// OCR engine mode (default: 3, whatever is available)
    pub oem: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            psm: 7,
            oem: 3,
        }
    }
}

/// Tesseract OCR provider
///
/// Streams the region through `tesseract stdin stdout` so no temp files are
/// shared between requests.
pub struct TesseractProvider {
    config: TesseractConfig,
}

impl TesseractProvider {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn command(&self, language: LanguageHint) -> Command {
        let mut cmd = Command::new(&self.config.tesseract_path);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(language.tesseract_code())
            .arg("--oem")
            .arg(self.config.oem.to_string())
            .arg("--psm")
            .arg(self.config.psm.to_string());
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl TextRecognizer for TesseractProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        let result = Command::new(&self.config.tesseract_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        matches!(result, Ok(status) if status.success())
    }

    async fn read(&self, region: &RgbImage, language: LanguageHint) -> Result<String, OcrError> {
        let png = imaging::encode_png(region)
            .map_err(|e| OcrError::ImageError(format!("Failed to encode region: {}", e)))?;

        let mut child = self
            .command(language)
            .spawn()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to spawn tesseract: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&png).await {
                let _ = child.kill().await;
                return Err(OcrError::ProcessingError(format!(
                    "Failed to write to tesseract stdin: {}",
                    e
                )));
            }
            // Closing stdin signals end of input
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(|e| {
            OcrError::ProcessingError(format!("Failed to wait for tesseract: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Ollama vision model provider
pub struct OllamaProvider {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn prompt(language: LanguageHint) -> String {
        format!(
            "This image is a single field cropped from a Thai national ID card. \
             The text is in {}. Return only the text exactly as written, nothing else.",
            language.display_name()
        )
    }
}

#[async_trait]
impl TextRecognizer for OllamaProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Ollama
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn read(&self, region: &RgbImage, language: LanguageHint) -> Result<String, OcrError> {
        use base64::Engine;

        let png = imaging::encode_png(region)
            .map_err(|e| OcrError::ImageError(format!("Failed to encode region: {}", e)))?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(png);

        let request = serde_json::json!({
            "model": self.model,
            "prompt": Self::prompt(language),
            "images": [image_base64],
            "stream": false
        });

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to call Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(result["response"].as_str().unwrap_or("").to_string())
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    /// Text returned for every region
    pub response: String,
    pub available: bool,
    /// Region sizes and hints seen by `read`
    pub calls: parking_lot::Mutex<Vec<((u32, u32), LanguageHint)>>,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            available: true,
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl TextRecognizer for MockProvider {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn read(&self, region: &RgbImage, language: LanguageHint) -> Result<String, OcrError> {
        self.calls.lock().push((region.dimensions(), language));
        Ok(self.response.clone())
    }
}
