//! Field reader
//!
//! Runs OCR over each detected field of a card crop.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbImage;

use super::provider::TextRecognizer;
use super::types::OcrError;
use crate::detection::{BoundingBox, Detection};
use crate::{imaging, vocabulary};

/// Label to recognized text, empty results omitted
pub type RawTextMap = BTreeMap<String, String>;

/// Reads field regions with the configured recognizer
pub struct FieldReader {
    recognizer: Arc<dyn TextRecognizer>,
}

impl FieldReader {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    pub fn recognizer(&self) -> &Arc<dyn TextRecognizer> {
        &self.recognizer
    }

    /// Read every field in `fields` from `card`
    ///
    /// Fields without a label, with a box that leaves no pixels on the card,
    /// or whose text cleans up to nothing are left out of the result.
    pub async fn read_fields(
        &self,
        card: &RgbImage,
        fields: &[Detection],
    ) -> Result<RawTextMap, OcrError> {
        let (width, height) = card.dimensions();
        let mut extracted = RawTextMap::new();

        for field in fields {
            let Some(label) = field.label.as_deref() else {
                continue;
            };

            let bbox = &field.bbox;
            let Some(bbox) = BoundingBox::clip(
                [bbox.x1 as f32, bbox.y1 as f32, bbox.x2 as f32, bbox.y2 as f32],
                width,
                height,
            ) else {
                tracing::debug!(label, "Skipping empty field region");
                continue;
            };

            let region = imaging::crop(card, &bbox);
            let language = vocabulary::language_for(label);
            let text = self.recognizer.read(&region, language).await?;
            let cleaned = clean_text(&text);

            if cleaned.is_empty() {
                tracing::debug!(label, "No text recognized");
                continue;
            }

            tracing::debug!(label, text = %cleaned, "Read field");
            extracted.insert(label.to_string(), cleaned);
        }

        Ok(extracted)
    }
}

/// Trim and drop line breaks and form feeds
pub fn clean_text(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\x0c'))
        .collect()
}
