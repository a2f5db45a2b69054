//! Card localization
//!
//! Finds the ID card in a full photo and crops it out.

use std::sync::Arc;

use image::RgbImage;

use super::provider::ObjectDetector;
use super::types::{BoundingBox, Detection, DetectionError, DetectionParams, RawDetection};
use crate::imaging;

/// Result of a card localization pass
#[derive(Debug)]
pub struct CardLocalization {
    /// Card crop, `None` when no usable card box was found
    pub card: Option<CroppedCard>,
    /// Every box the detector reported, clipped (for the debug overlay)
    pub candidates: Vec<Detection>,
}

/// Card crop with its location in the source image
#[derive(Debug)]
pub struct CroppedCard {
    pub image: RgbImage,
    pub detection: Detection,
}

/// Wraps the card detector
pub struct CardLocalizer {
    detector: Arc<dyn ObjectDetector>,
    params: DetectionParams,
}

impl CardLocalizer {
    pub fn new(detector: Arc<dyn ObjectDetector>, params: DetectionParams) -> Self {
        Self { detector, params }
    }

    pub fn detector(&self) -> &Arc<dyn ObjectDetector> {
        &self.detector
    }

    /// Locate the card in `image`
    ///
    /// Detection runs on a grayscale copy; the crop is cut from the original
    /// color image.
    pub async fn locate(&self, image: &RgbImage) -> Result<CardLocalization, DetectionError> {
        let normalized = imaging::grayscale_rgb(image);
        let raw = self.detector.detect(&normalized, self.params).await?;
        let (width, height) = image.dimensions();

        tracing::debug!(boxes = raw.len(), "Card detector returned");

        let candidates = raw
            .iter()
            .filter_map(|d| {
                BoundingBox::clip(d.bbox, width, height).map(|bbox| Detection {
                    bbox,
                    label: None,
                    confidence: d.confidence,
                })
            })
            .collect();

        let card = select_best(&raw)
            .and_then(|best| {
                BoundingBox::clip(best.bbox, width, height).map(|bbox| Detection {
                    bbox,
                    label: None,
                    confidence: best.confidence,
                })
            })
            .map(|detection| CroppedCard {
                image: imaging::crop(image, &detection.bbox),
                detection,
            });

        Ok(CardLocalization { card, candidates })
    }
}

/// Pick the highest-confidence detection.
///
/// Ties go to the earliest detection in model output order.
pub fn select_best(detections: &[RawDetection]) -> Option<&RawDetection> {
    detections.iter().fold(None, |best, d| match best {
        Some(b) if d.confidence <= b.confidence => Some(b),
        _ => Some(d),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::provider::MockDetector;
    use image::Rgb;

    fn raw(bbox: [f32; 4], confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            class_id: 0,
            confidence,
        }
    }

    #[test]
    fn test_select_best_max_confidence() {
        let detections = vec![
            raw([0.0, 0.0, 1.0, 1.0], 0.4),
            raw([1.0, 1.0, 2.0, 2.0], 0.9),
            raw([2.0, 2.0, 3.0, 3.0], 0.7),
        ];
        assert_eq!(select_best(&detections).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_select_best_tie_keeps_first() {
        let detections = vec![
            raw([0.0, 0.0, 1.0, 1.0], 0.8),
            raw([5.0, 5.0, 6.0, 6.0], 0.8),
        ];
        assert_eq!(select_best(&detections).unwrap().bbox[0], 0.0);
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(&[]).is_none());
    }

    #[tokio::test]
    async fn test_locate_crops_color_image() {
        let detector = Arc::new(MockDetector::new(
            vec![
                raw([10.0, 10.0, 60.0, 40.0], 0.5),
                raw([-20.0, 5.0, 90.0, 45.0], 0.95),
            ],
            &["card"],
        ));
        let localizer = CardLocalizer::new(detector.clone(), DetectionParams::default());

        let image = RgbImage::from_pixel(80, 50, Rgb([200, 40, 40]));
        let result = localizer.locate(&image).await.unwrap();

        let card = result.card.expect("card should be found");
        assert_eq!(card.image.dimensions(), (80, 40));
        assert_eq!(card.detection.confidence, 0.95);
        // Crop keeps the original colors
        assert_eq!(*card.image.get_pixel(0, 0), Rgb([200, 40, 40]));
        assert_eq!(result.candidates.len(), 2);

        // The detector saw a grayscale copy of the full frame
        let calls = detector.calls.lock();
        assert_eq!(calls.as_slice(), &[((80, 50), true)]);
    }

    #[tokio::test]
    async fn test_locate_no_boxes() {
        let detector = Arc::new(MockDetector::new(vec![], &["card"]));
        let localizer = CardLocalizer::new(detector, DetectionParams::default());

        let image = RgbImage::new(32, 32);
        let result = localizer.locate(&image).await.unwrap();
        assert!(result.card.is_none());
        assert!(result.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_locate_degenerate_box() {
        let detector = Arc::new(MockDetector::new(
            vec![raw([100.0, 100.0, 150.0, 150.0], 0.9)],
            &["card"],
        ));
        let localizer = CardLocalizer::new(detector, DetectionParams::default());

        let image = RgbImage::new(32, 32);
        let result = localizer.locate(&image).await.unwrap();
        assert!(result.card.is_none());
    }

    #[tokio::test]
    async fn test_locate_below_threshold() {
        let detector = Arc::new(MockDetector::new(
            vec![raw([0.0, 0.0, 10.0, 10.0], 0.1)],
            &["card"],
        ));
        let localizer = CardLocalizer::new(detector, DetectionParams::default());

        let result = localizer.locate(&RgbImage::new(16, 16)).await.unwrap();
        assert!(result.card.is_none());
    }
}
