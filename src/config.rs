//! Configuration management for the Thai ID OCR server

use std::env;
use std::path::PathBuf;

use crate::detection::DetectionParams;
use crate::entity::MappingPolicy;
use crate::ocr::{OcrProvider, TesseractConfig};
use crate::vocabulary::FIELD_LABELS;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub detector: DetectorConfig,
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
    /// `None` allows any origin
    pub cors_allow_origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorBackend {
    /// Detection sidecar reached over HTTP
    Remote,
    /// YOLO ONNX models run in-process
    Onnx,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub backend: DetectorBackend,
    pub card_url: String,
    pub field_url: String,
    pub card_model_path: PathBuf,
    pub field_model_path: PathBuf,
    pub card_labels: Vec<String>,
    pub field_labels: Vec<String>,
    pub card: DetectionParams,
    pub field: DetectionParams,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub backend: OcrProvider,
    pub tesseract: TesseractConfig,
    pub ollama_url: String,
    pub ollama_model: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: MappingPolicy,
    pub keep_id_spacing: bool,
    /// Debug artifacts are skipped when unset
    pub debug_output_dir: Option<PathBuf>,
    pub heif_convert_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_upload_mb: 20,
                cors_allow_origin: None,
            },
            detector: DetectorConfig {
                backend: DetectorBackend::Remote,
                card_url: "http://localhost:8500/detect/card".to_string(),
                field_url: "http://localhost:8500/detect/fields".to_string(),
                card_model_path: PathBuf::from("models/card.onnx"),
                field_model_path: PathBuf::from("models/fields.onnx"),
                card_labels: vec!["card".to_string()],
                field_labels: FIELD_LABELS.iter().map(|s| s.to_string()).collect(),
                card: DetectionParams::default(),
                field: DetectionParams::default(),
            },
            ocr: OcrConfig {
                backend: OcrProvider::Tesseract,
                tesseract: TesseractConfig::default(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
            },
            pipeline: PipelineConfig {
                policy: MappingPolicy::Cleanup,
                keep_id_spacing: false,
                debug_output_dir: Some(PathBuf::from("output_logs")),
                heif_convert_path: "heif-convert".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let card = DetectionParams {
            confidence: parse_or(&var, "CARD_CONFIDENCE", defaults.detector.card.confidence)?,
            iou: parse_or(&var, "CARD_IOU", defaults.detector.card.iou)?,
        };
        let field = DetectionParams {
            confidence: parse_or(&var, "FIELD_CONFIDENCE", defaults.detector.field.confidence)?,
            iou: parse_or(&var, "FIELD_IOU", defaults.detector.field.iou)?,
        };

        let detector_backend = match var("DETECTOR_BACKEND").as_deref() {
            None | Some("") | Some("remote") => DetectorBackend::Remote,
            Some("onnx") => DetectorBackend::Onnx,
            Some(other) => return Err(invalid("DETECTOR_BACKEND", other)),
        };

        let ocr_backend = match var("OCR_BACKEND").as_deref() {
            None | Some("") | Some("tesseract") => OcrProvider::Tesseract,
            Some("reader-pool") | Some("ollama") => OcrProvider::ReaderPool,
            Some(other) => return Err(invalid("OCR_BACKEND", other)),
        };

        let policy = match var("ENTITY_POLICY") {
            None => defaults.pipeline.policy,
            Some(value) if value.is_empty() => defaults.pipeline.policy,
            Some(value) => value
                .parse::<MappingPolicy>()
                .map_err(|_| invalid("ENTITY_POLICY", &value))?,
        };

        // An empty DEBUG_OUTPUT_DIR turns artifacts off
        let debug_output_dir = match var("DEBUG_OUTPUT_DIR") {
            None => defaults.pipeline.debug_output_dir,
            Some(dir) if dir.is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir)),
        };

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(&var, "SERVER_PORT", defaults.server.port)?,
                max_upload_mb: parse_or(&var, "MAX_UPLOAD_MB", defaults.server.max_upload_mb)?,
                cors_allow_origin: var("CORS_ALLOW_ORIGIN").filter(|v| !v.is_empty() && v != "*"),
            },
            detector: DetectorConfig {
                backend: detector_backend,
                card_url: var("CARD_DETECTOR_URL").unwrap_or(defaults.detector.card_url),
                field_url: var("FIELD_DETECTOR_URL").unwrap_or(defaults.detector.field_url),
                card_model_path: var("CARD_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.detector.card_model_path),
                field_model_path: var("FIELD_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.detector.field_model_path),
                card_labels: var("CARD_LABELS")
                    .map(|v| split_list(&v))
                    .unwrap_or(defaults.detector.card_labels),
                field_labels: var("FIELD_LABELS")
                    .map(|v| split_list(&v))
                    .unwrap_or(defaults.detector.field_labels),
                card,
                field,
            },
            ocr: OcrConfig {
                backend: ocr_backend,
                tesseract: TesseractConfig {
                    tesseract_path: var("TESSERACT_PATH")
                        .unwrap_or(defaults.ocr.tesseract.tesseract_path),
                    psm: parse_or(&var, "TESSERACT_PSM", defaults.ocr.tesseract.psm)?,
                    oem: defaults.ocr.tesseract.oem,
                },
                ollama_url: var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
            pipeline: PipelineConfig {
                policy,
                keep_id_spacing: parse_bool(&var, "ID_KEEP_SPACING", defaults.pipeline.keep_id_spacing)?,
                debug_output_dir,
                heif_convert_path: var("HEIF_CONVERT_PATH")
                    .unwrap_or(defaults.pipeline.heif_convert_path),
            },
        })
    }

    /// Upload body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value.parse().map_err(|_| invalid(name, &value)),
    }
}

fn parse_bool<F>(var: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.to_lowercase()).as_deref() {
        None | Some("") => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(other) => Err(invalid(name, other)),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
