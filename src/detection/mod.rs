//! Detection Module
//!
//! Card and field localization on top of pluggable object detectors.
//!
//! Supports multiple backends:
//! - Remote detection sidecar (JSON over HTTP)
//! - YOLO ONNX models run in-process (`onnx` feature)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use thai_id_ocr_server::detection::{CardLocalizer, DetectionParams, RemoteDetector};
//!
//! let detector = Arc::new(RemoteDetector::new("http://localhost:8500/detect/card", vec!["card".into()]));
//! let localizer = CardLocalizer::new(detector, DetectionParams::default());
//!
//! let result = localizer.locate(&image).await?;
//! if let Some(card) = result.card {
//!     // card.image is the cropped card
//! }
//! ```

mod card;
mod fields;
#[cfg(feature = "onnx")]
mod onnx;
mod provider;
mod types;

pub use card::{select_best, CardLocalization, CardLocalizer, CroppedCard};
pub use fields::{best_per_label, canonical_label, sort_reading_order, FieldLocalization, FieldLocalizer};
pub use provider::{ObjectDetector, RemoteDetector};
pub use types::{BoundingBox, Detection, DetectionError, DetectionParams, RawDetection};

#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;

#[cfg(test)]
pub use provider::MockDetector;
