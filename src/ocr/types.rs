//! OCR Types
//!
//! Language hints, provider kinds and errors for field recognition.

use serde::{Deserialize, Serialize};

/// OCR provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OcrProvider {
    /// Tesseract OCR (local)
    Tesseract,
    /// Ollama vision model (local neural reader)
    Ollama,
    /// Pool of per-language readers
    ReaderPool,
}

impl Default for OcrProvider {
    fn default() -> Self {
        Self::Tesseract
    }
}

/// Script the recognizer should optimize for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageHint {
    Thai,
    English,
    /// Thai and English together
    Mixed,
}

impl LanguageHint {
    pub const ALL: [LanguageHint; 3] = [Self::Thai, Self::English, Self::Mixed];

    /// Tesseract traineddata selector
    pub fn tesseract_code(&self) -> &'static str {
        match self {
            Self::Thai => "tha",
            Self::English => "eng",
            Self::Mixed => "tha+eng",
        }
    }

    /// Human-readable language name for prompting neural readers
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Thai => "Thai",
            Self::English => "English",
            Self::Mixed => "Thai and English",
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("Failed to prepare image region: {0}")]
    ImageError(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}
