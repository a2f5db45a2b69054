//! In-process YOLO detector on ONNX Runtime
//!
//! Expects an exported YOLOv8-style model: one `[1, 3, S, S]` float input and
//! one `[1, 4 + classes, anchors]` output holding `cx, cy, w, h` followed by
//! per-class scores.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{imageops::FilterType, Rgb, RgbImage};
use ndarray::ArrayView2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;

use super::provider::ObjectDetector;
use super::types::{DetectionError, DetectionParams, RawDetection};

const DEFAULT_INPUT_SIZE: u32 = 640;
const LETTERBOX_FILL: u8 = 114;

/// YOLO detector running in-process
///
/// Inference runs on the blocking thread pool, so the detector works on both
/// current-thread and multi-thread runtimes.
pub struct OnnxDetector {
    name: String,
    labels: Vec<String>,
    model: Arc<YoloModel>,
}

/// Loaded session shared with blocking inference tasks
struct YoloModel {
    // ort runs sessions through `&mut`
    session: Mutex<Session>,
    output_name: String,
    input_size: u32,
}

impl OnnxDetector {
    /// Load a model file
    pub fn load(model_path: &Path, labels: Vec<String>) -> Result<Self, DetectionError> {
        tracing::info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| DetectionError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectionError::ModelLoad(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| DetectionError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| DetectionError::ModelLoad(format!("{}: {}", model_path.display(), e)))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| DetectionError::ModelLoad("Model has no outputs".to_string()))?;

        let input_size = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .and_then(|shape| shape.get(2).copied())
            .filter(|&side| side > 0)
            .map(|side| side as u32)
            .unwrap_or(DEFAULT_INPUT_SIZE);

        tracing::info!(
            input_size,
            output = %output_name,
            classes = labels.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            name: model_path.display().to_string(),
            labels,
            model: Arc::new(YoloModel {
                session: Mutex::new(session),
                output_name,
                input_size,
            }),
        })
    }
}

impl YoloModel {
    fn infer(
        &self,
        image: &RgbImage,
        params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let letterbox = Letterbox::fit(image, self.input_size);
        let side = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, side, side], letterbox.to_chw()))
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let (shape, data) = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| DetectionError::Inference(e.to_string()))?;
            let (shape, data) = outputs[self.output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectionError::Inference(e.to_string()))?;
            (shape.to_vec(), data.to_vec())
        };

        if shape.len() != 3 || shape[1] < 5 {
            return Err(DetectionError::Inference(format!(
                "Unexpected output shape {:?}",
                shape
            )));
        }

        let rows = shape[1] as usize;
        let anchors = shape[2] as usize;
        let predictions = ArrayView2::from_shape((rows, anchors), &data)
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let column = predictions.column(anchor);
            let (class_id, confidence) = column
                .iter()
                .skip(4)
                .enumerate()
                .fold((0, f32::MIN), |(best_id, best), (id, &score)| {
                    if score > best {
                        (id, score)
                    } else {
                        (best_id, best)
                    }
                });

            if confidence < params.confidence {
                continue;
            }

            let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
            candidates.push(RawDetection {
                bbox: letterbox.unmap([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]),
                class_id,
                confidence,
            });
        }

        Ok(non_max_suppression(candidates, params.iou))
    }
}

#[async_trait]
impl ObjectDetector for OnnxDetector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn detect(
        &self,
        image: &RgbImage,
        params: DetectionParams,
    ) -> Result<Vec<RawDetection>, DetectionError> {
        let model = Arc::clone(&self.model);
        let image = image.clone();
        tokio::task::spawn_blocking(move || model.infer(&image, params))
            .await
            .map_err(|e| DetectionError::Inference(format!("Inference task failed: {}", e)))?
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Aspect-preserving resize onto a square, padded canvas
struct Letterbox {
    canvas: RgbImage,
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(image: &RgbImage, side: u32) -> Self {
        let (width, height) = image.dimensions();
        let scale = (side as f32 / width.max(1) as f32).min(side as f32 / height.max(1) as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, side);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, side);

        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(side, side, Rgb([LETTERBOX_FILL; 3]));
        let pad_x = (side - new_w) / 2;
        let pad_y = (side - new_h) / 2;
        image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

        Self {
            canvas,
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        }
    }

    /// Planar RGB floats in [0, 1]
    fn to_chw(&self) -> Vec<f32> {
        let (w, h) = self.canvas.dimensions();
        let plane = (w * h) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (i, pixel) in self.canvas.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }
        data
    }

    /// Map canvas coordinates back onto the source image
    fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
        [
            (bbox[0] - self.pad_x) / self.scale,
            (bbox[1] - self.pad_y) / self.scale,
            (bbox[2] - self.pad_x) / self.scale,
            (bbox[3] - self.pad_y) / self.scale,
        ]
    }
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Per-class greedy NMS, highest score first
fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], class_id: usize, confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            class_id,
            confidence,
        }
    }

    #[test]
    fn test_model_can_move_to_blocking_pool() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<YoloModel>();
        assert_send_sync::<OnnxDetector>();
    }

    #[tokio::test]
    async fn test_missing_model_fails_to_load() {
        let result = OnnxDetector::load(Path::new("/nonexistent/card.onnx"), vec!["card".to_string()]);
        assert!(matches!(result, Err(DetectionError::ModelLoad(_))));
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        let half = iou(&a, &[5.0, 0.0, 15.0, 10.0]);
        assert!((half - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_same_class_only() {
        let kept = non_max_suppression(
            vec![
                det([0.0, 0.0, 10.0, 10.0], 0, 0.6),
                det([1.0, 1.0, 10.0, 10.0], 0, 0.9),
                det([1.0, 1.0, 10.0, 10.0], 1, 0.5),
            ],
            0.25,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn test_letterbox_roundtrip() {
        let image = RgbImage::new(320, 160);
        let letterbox = Letterbox::fit(&image, 640);
        assert_eq!(letterbox.scale, 2.0);
        assert_eq!(letterbox.pad_y, 160.0);

        let mapped = letterbox.unmap([0.0, 160.0, 640.0, 480.0]);
        assert_eq!(mapped, [0.0, 0.0, 320.0, 160.0]);
        assert_eq!(letterbox.to_chw().len(), 640 * 640 * 3);
    }
}
