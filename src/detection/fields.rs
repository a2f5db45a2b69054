//! Field localization
//!
//! Finds the named text fields on a cropped card, keeping one box per label.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbImage;

use super::provider::ObjectDetector;
use super::types::{BoundingBox, Detection, DetectionError, DetectionParams, RawDetection};

/// Wraps the field detector
pub struct FieldLocalizer {
    detector: Arc<dyn ObjectDetector>,
    params: DetectionParams,
}

/// Result of a field localization pass
#[derive(Debug, Default)]
pub struct FieldLocalization {
    /// Best detection per label, in reading order
    pub fields: Vec<Detection>,
    /// Number of boxes the detector reported before deduplication
    pub raw_count: usize,
}

impl FieldLocalizer {
    pub fn new(detector: Arc<dyn ObjectDetector>, params: DetectionParams) -> Self {
        Self { detector, params }
    }

    pub fn detector(&self) -> &Arc<dyn ObjectDetector> {
        &self.detector
    }

    /// Locate the labelled fields on a card crop
    pub async fn locate(&self, card: &RgbImage) -> Result<FieldLocalization, DetectionError> {
        let raw = self.detector.detect(card, self.params).await?;
        let (width, height) = card.dimensions();

        let labelled = raw.iter().map(|d| (self.label_for(d), d));
        let fields = best_per_label(labelled, width, height);

        tracing::info!(
            raw = raw.len(),
            unique = fields.len(),
            "Found {} raw text fields, filtered down to {} unique fields",
            raw.len(),
            fields.len()
        );

        Ok(FieldLocalization {
            fields,
            raw_count: raw.len(),
        })
    }

    fn label_for(&self, detection: &RawDetection) -> String {
        match self.detector.class_name(detection.class_id) {
            Some(name) => canonical_label(name).to_string(),
            None => format!("class_{}", detection.class_id),
        }
    }
}

/// Map detector label spellings onto the field vocabulary
pub fn canonical_label(label: &str) -> &str {
    match label {
        "date_of_expity_th" => "date_of_expiry_th",
        "date_of_expity_en" => "date_of_expiry_en",
        other => other,
    }
}

/// Keep the highest-confidence detection for each label and sort the
/// survivors top-to-bottom, then left-to-right.
///
/// A later detection replaces the kept one only when its confidence is
/// strictly greater. Winners are clipped afterwards; a winner that clips to
/// zero area drops its label rather than falling back to a weaker box.
pub fn best_per_label<'a, I>(detections: I, width: u32, height: u32) -> Vec<Detection>
where
    I: IntoIterator<Item = (String, &'a RawDetection)>,
{
    let mut best: BTreeMap<String, &'a RawDetection> = BTreeMap::new();

    for (label, raw) in detections {
        let replace = match best.get(&label) {
            Some(kept) => raw.confidence > kept.confidence,
            None => true,
        };

        if replace {
            best.insert(label, raw);
        }
    }

    let mut fields: Vec<Detection> = best
        .into_iter()
        .filter_map(|(label, raw)| {
            let Some(bbox) = BoundingBox::clip(raw.bbox, width, height) else {
                tracing::debug!(label = %label, "Best box lies outside the card");
                return None;
            };
            Some(Detection {
                bbox,
                label: Some(label),
                confidence: raw.confidence,
            })
        })
        .collect();
    sort_reading_order(&mut fields);
    fields
}

/// Stable sort by (y1, x1)
pub fn sort_reading_order(fields: &mut [Detection]) {
    fields.sort_by_key(|d| (d.bbox.y1, d.bbox.x1));
}
