//! Detection types
//!
//! Boxes and detections shared by the card and field localizers.

use serde::{Deserialize, Serialize};

/// Pixel-space box in image coordinates, always non-empty and inside the
/// image it was clipped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Clip raw model coordinates to a `width` x `height` image.
    ///
    /// Coordinates are truncated to integers the same way the detector's
    /// `xyxy` output is cast. Returns `None` when the clipped region has
    /// zero area.
    pub fn clip(raw: [f32; 4], width: u32, height: u32) -> Option<Self> {
        let clamp = |v: f32, max: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as u32).min(max)
            }
        };

        let x1 = clamp(raw[0], width);
        let y1 = clamp(raw[1], height);
        let x2 = clamp(raw[2], width);
        let y2 = clamp(raw[3], height);

        if x2 > x1 && y2 > y1 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Raw detector output, before clipping and label lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Corner coordinates `[x1, y1, x2, y2]` in input pixels
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    /// Class index into the detector's name table
    #[serde(default)]
    pub class_id: usize,
    /// Detector score in [0, 1]
    pub confidence: f32,
}

/// A located region, labelled for field detections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub confidence: f32,
}

/// Thresholds forwarded to a detector call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Minimum confidence for a box to be reported
    pub confidence: f32,
    /// Overlap threshold for duplicate suppression
    pub iou: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.25,
        }
    }
}

/// Detection error types
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Detector not available: {0}")]
    NotAvailable(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Image error: {0}")]
    ImageError(String),
}
