//! Application state management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{Config, DetectorBackend, DetectorConfig, OcrConfig};
use crate::detection::{CardLocalizer, DetectionError, FieldLocalizer, ObjectDetector, RemoteDetector};
use crate::entity::EntityMapper;
use crate::ocr::{FieldReader, OcrProvider, ReaderPool, TesseractProvider, TextRecognizer};
use crate::pipeline::{ArtifactWriter, Pipeline, PipelineError};
use crate::upload::UploadConfig;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to load detector: {0}")]
    Detector(#[from] DetectionError),

    #[error("Detector backend '{0}' requires building with the `{0}` feature")]
    FeatureDisabled(&'static str),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    upload: UploadConfig,
    pipeline: Option<Arc<Pipeline>>,
    ready: AtomicBool,
    init_error: Option<String>,
}

impl AppState {
    /// Build the pipeline described by `config`
    ///
    /// Never fails: a pipeline that cannot be built leaves the service up and
    /// answering 503 until restarted with a working configuration.
    pub async fn from_config(config: Config) -> Self {
        match build_pipeline(&config) {
            Ok(pipeline) => Self::with_pipeline(config, pipeline).await,
            Err(e) => {
                tracing::error!("Failed to build extraction pipeline: {}", e);
                Self::without_pipeline(config, e.to_string())
            }
        }
    }

    /// Wrap an already-built pipeline
    pub async fn with_pipeline(config: Config, pipeline: Pipeline) -> Self {
        let ready = match pipeline.check_ready().await {
            Ok(()) => {
                tracing::info!("Models loaded, pipeline ready");
                true
            }
            Err(e) => {
                tracing::warn!("Pipeline not ready yet: {}. Will retry per request", e);
                false
            }
        };

        Self::build(config, Some(Arc::new(pipeline)), ready, None)
    }

    /// State with no pipeline; extraction requests get 503
    pub fn without_pipeline(config: Config, reason: String) -> Self {
        Self::build(config, None, false, Some(reason))
    }

    fn build(config: Config, pipeline: Option<Arc<Pipeline>>, ready: bool, init_error: Option<String>) -> Self {
        let upload = UploadConfig {
            heif_convert_path: config.pipeline.heif_convert_path.clone(),
            temp_dir: None,
        };

        Self {
            inner: Arc::new(AppStateInner {
                config,
                upload,
                pipeline,
                ready: AtomicBool::new(ready),
                init_error,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the upload staging configuration
    pub fn upload_config(&self) -> &UploadConfig {
        &self.inner.upload
    }

    /// Whether the last readiness check passed
    pub fn models_loaded(&self) -> bool {
        self.inner.ready.load(Ordering::Relaxed)
    }

    /// The pipeline, once every backend has reported ready
    pub async fn ready_pipeline(&self) -> Result<Arc<Pipeline>, PipelineError> {
        let Some(pipeline) = &self.inner.pipeline else {
            let reason = self
                .inner
                .init_error
                .clone()
                .unwrap_or_else(|| "pipeline was not built".to_string());
            return Err(PipelineError::ModelUnavailable(reason));
        };

        if !self.models_loaded() {
            pipeline.check_ready().await?;
            self.inner.ready.store(true, Ordering::Relaxed);
            tracing::info!("Models became available");
        }

        Ok(pipeline.clone())
    }
}

/// Construct detectors, recognizer and mapper from configuration
pub fn build_pipeline(config: &Config) -> Result<Pipeline, StateError> {
    let (card_detector, field_detector) = build_detectors(&config.detector)?;
    let recognizer = build_recognizer(&config.ocr);

    let mapper = EntityMapper::new(config.pipeline.policy)
        .with_id_spacing(config.pipeline.keep_id_spacing);

    tracing::info!(
        card_detector = card_detector.name(),
        field_detector = field_detector.name(),
        ocr = ?recognizer.provider_type(),
        policy = ?config.pipeline.policy,
        "Building extraction pipeline"
    );

    Ok(Pipeline::new(
        CardLocalizer::new(card_detector, config.detector.card),
        FieldLocalizer::new(field_detector, config.detector.field),
        FieldReader::new(recognizer),
        mapper,
    )
    .with_artifacts(ArtifactWriter::new(config.pipeline.debug_output_dir.clone())))
}

type DetectorPair = (Arc<dyn ObjectDetector>, Arc<dyn ObjectDetector>);

fn build_detectors(config: &DetectorConfig) -> Result<DetectorPair, StateError> {
    match config.backend {
        DetectorBackend::Remote => Ok((
            Arc::new(RemoteDetector::new(&config.card_url, config.card_labels.clone())),
            Arc::new(RemoteDetector::new(&config.field_url, config.field_labels.clone())),
        )),
        DetectorBackend::Onnx => load_onnx_detectors(config),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx_detectors(config: &DetectorConfig) -> Result<DetectorPair, StateError> {
    use crate::detection::OnnxDetector;

    let card = OnnxDetector::load(&config.card_model_path, config.card_labels.clone())?;
    let fields = OnnxDetector::load(&config.field_model_path, config.field_labels.clone())?;
    Ok((Arc::new(card), Arc::new(fields)))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_detectors(_config: &DetectorConfig) -> Result<DetectorPair, StateError> {
    Err(StateError::FeatureDisabled("onnx"))
}

fn build_recognizer(config: &OcrConfig) -> Arc<dyn TextRecognizer> {
    match config.backend {
        OcrProvider::Tesseract => Arc::new(TesseractProvider::new(config.tesseract.clone())),
        OcrProvider::Ollama | OcrProvider::ReaderPool => {
            Arc::new(ReaderPool::ollama(&config.ollama_url, &config.ollama_model))
        }
    }
}
