//! Pipeline orchestrator
//!
//! Runs card localization, field localization, OCR and entity mapping for one
//! image.

use std::fmt;
use std::time::Instant;

use image::RgbImage;

use super::artifacts::ArtifactWriter;
use crate::detection::{CardLocalizer, DetectionError, FieldLocalizer};
use crate::entity::{EntityMap, EntityMapper};
use crate::ocr::{FieldReader, OcrError};

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Models are not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Could not detect an ID card in the image.")]
    CardNotFound,

    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
}

/// Pipeline progress, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    CardDetected,
    CardNotFound,
    FieldsDetected,
    TextRead,
    EntitiesMapped,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::CardDetected => "card_detected",
            Self::CardNotFound => "card_not_found",
            Self::FieldsDetected => "fields_detected",
            Self::TextRead => "text_read",
            Self::EntitiesMapped => "entities_mapped",
        };
        f.write_str(name)
    }
}

/// The loaded extraction pipeline
///
/// Built once at startup and shared read-only between requests.
pub struct Pipeline {
    card_localizer: CardLocalizer,
    field_localizer: FieldLocalizer,
    reader: FieldReader,
    mapper: EntityMapper,
    artifacts: ArtifactWriter,
}

impl Pipeline {
    pub fn new(
        card_localizer: CardLocalizer,
        field_localizer: FieldLocalizer,
        reader: FieldReader,
        mapper: EntityMapper,
    ) -> Self {
        Self {
            card_localizer,
            field_localizer,
            reader,
            mapper,
            artifacts: ArtifactWriter::disabled(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn artifacts(&self) -> &ArtifactWriter {
        &self.artifacts
    }

    /// Check that every backend can serve requests
    pub async fn check_ready(&self) -> Result<(), PipelineError> {
        let card = self.card_localizer.detector();
        if !card.is_available().await {
            return Err(PipelineError::ModelUnavailable(format!(
                "card detector {} is not available",
                card.name()
            )));
        }

        let fields = self.field_localizer.detector();
        if !fields.is_available().await {
            return Err(PipelineError::ModelUnavailable(format!(
                "field detector {} is not available",
                fields.name()
            )));
        }

        let ocr = self.reader.recognizer();
        if !ocr.is_available().await {
            return Err(PipelineError::ModelUnavailable(format!(
                "{:?} OCR backend is not available",
                ocr.provider_type()
            )));
        }

        Ok(())
    }

    /// Extract the ID card fields from `image`
    ///
    /// `key` names the debug artifacts for this run.
    pub async fn process(&self, image: &RgbImage, key: &str) -> Result<EntityMap, PipelineError> {
        let started = Instant::now();
        let mut stage = Stage::Start;
        tracing::debug!(key, %stage, width = image.width(), height = image.height(), "Pipeline started");

        let localization = self.card_localizer.locate(image).await?;
        self.artifacts
            .write_card_overlay(
                key,
                image,
                &localization.candidates,
                localization.card.as_ref().map(|c| &c.detection),
            )
            .await;

        let Some(card) = localization.card else {
            stage = Stage::CardNotFound;
            tracing::info!(key, %stage, candidates = localization.candidates.len(), "No ID card detected");
            return Err(PipelineError::CardNotFound);
        };
        stage = Stage::CardDetected;
        tracing::debug!(
            key,
            %stage,
            confidence = card.detection.confidence,
            width = card.image.width(),
            height = card.image.height(),
            "Card cropped"
        );

        let fields = self.field_localizer.locate(&card.image).await?;
        self.artifacts
            .write_field_overlay(key, &card.image, &fields.fields)
            .await;
        stage = Stage::FieldsDetected;
        tracing::debug!(key, %stage, fields = fields.fields.len(), "Fields located");

        let raw_text = self.reader.read_fields(&card.image, &fields.fields).await?;
        stage = Stage::TextRead;
        tracing::debug!(key, %stage, fields = raw_text.len(), "Fields read");

        let entities = self.mapper.map(&raw_text);
        stage = Stage::EntitiesMapped;

        self.artifacts.write_snapshot(key, &entities).await;

        tracing::info!(
            key,
            %stage,
            entities = entities.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline complete"
        );

        Ok(entities)
    }
}
