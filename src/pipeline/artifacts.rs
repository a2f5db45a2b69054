//! Debug artifacts
//!
//! Annotated detection images and a JSON snapshot of each result. Writing is
//! best effort: failures are logged and never reach the caller.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detection::Detection;
use crate::entity::EntityMap;

const CARD_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const BEST_CARD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 3;

const FIELD_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([0, 160, 0]),
    Rgb([0, 0, 255]),
    Rgb([230, 160, 0]),
    Rgb([200, 0, 200]),
    Rgb([0, 170, 170]),
];

/// Error writing an artifact
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Writes debug artifacts into a directory, or does nothing when disabled
#[derive(Debug, Clone, Default)]
pub struct ArtifactWriter {
    dir: Option<PathBuf>,
}

impl ArtifactWriter {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn card_overlay_path(&self, key: &str) -> Option<PathBuf> {
        self.path_for(key, "_1_card_detection.jpg")
    }

    pub fn field_overlay_path(&self, key: &str) -> Option<PathBuf> {
        self.path_for(key, "_2_text_detections.jpg")
    }

    pub fn snapshot_path(&self, key: &str) -> Option<PathBuf> {
        self.path_for(key, "_data.json")
    }

    fn path_for(&self, key: &str, suffix: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}{}", key, suffix)))
    }

    /// Full photo with every card candidate, best one highlighted
    pub async fn write_card_overlay(
        &self,
        key: &str,
        image: &RgbImage,
        candidates: &[Detection],
        best: Option<&Detection>,
    ) {
        let Some(path) = self.card_overlay_path(key) else {
            return;
        };

        let mut canvas = image.clone();
        let candidates = candidates.to_vec();
        let best = best.cloned();
        let result = run_blocking(move || {
            for candidate in &candidates {
                draw_box(&mut canvas, candidate, CARD_COLOR);
            }
            if let Some(best) = &best {
                draw_box(&mut canvas, best, BEST_CARD_COLOR);
            }
            save_image(&canvas, &path)
        })
        .await;

        report("card detection overlay", result);
    }

    /// Card crop with the kept field boxes
    pub async fn write_field_overlay(&self, key: &str, card: &RgbImage, fields: &[Detection]) {
        let Some(path) = self.field_overlay_path(key) else {
            return;
        };

        let mut canvas = card.clone();
        let fields = fields.to_vec();
        let result = run_blocking(move || {
            for field in &fields {
                let color = field
                    .label
                    .as_deref()
                    .map(label_color)
                    .unwrap_or(FIELD_COLORS[0]);
                draw_box(&mut canvas, field, color);
            }
            save_image(&canvas, &path)
        })
        .await;

        report("field detection overlay", result);
    }

    /// Pretty-printed JSON of the final result
    pub async fn write_snapshot(&self, key: &str, entities: &EntityMap) {
        let Some(path) = self.snapshot_path(key) else {
            return;
        };

        let result = async {
            let json = serde_json::to_string_pretty(entities)?;
            ensure_parent(&path).await?;
            tokio::fs::write(&path, json).await?;
            Ok::<_, ArtifactError>(path)
        }
        .await;

        report("JSON snapshot", result);
    }
}

/// Load a JSON snapshot written by [`ArtifactWriter::write_snapshot`]
pub async fn read_snapshot(path: &Path) -> Result<EntityMap, ArtifactError> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

/// Derive the artifact key from an uploaded file name.
///
/// Uses the file stem with any directory part removed; characters outside
/// `[A-Za-z0-9._-]` become `_`.
pub fn artifact_key(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or("");
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let key: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if key.is_empty() || key.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        key
    }
}

fn label_color(label: &str) -> Rgb<u8> {
    let index = label.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    FIELD_COLORS[index % FIELD_COLORS.len()]
}

fn draw_box(canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
    let bbox = &detection.bbox;
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width().saturating_sub(inset * 2);
        let height = bbox.height().saturating_sub(inset * 2);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bbox.x1 + inset) as i32, (bbox.y1 + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn save_image(canvas: &RgbImage, path: &Path) -> Result<PathBuf, ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;
    Ok(path.to_path_buf())
}

async fn ensure_parent(path: &Path) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn run_blocking<F>(f: F) -> Result<PathBuf, ArtifactError>
where
    F: FnOnce() -> Result<PathBuf, ArtifactError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn report(kind: &str, result: Result<PathBuf, ArtifactError>) {
    match result {
        Ok(path) => tracing::debug!("Saved {} to {:?}", kind, path),
        Err(e) => tracing::warn!("Failed to save {}: {}", kind, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use tempfile::TempDir;

    fn detection(label: Option<&str>, x1: u32, y1: u32, x2: u32, y2: u32) -> Detection {
        Detection {
            bbox: BoundingBox { x1, y1, x2, y2 },
            label: label.map(str::to_string),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_artifact_key() {
        assert_eq!(artifact_key("card_photo.jpg"), "card_photo");
        assert_eq!(artifact_key("IMG 0001.HEIC"), "IMG_0001");
        assert_eq!(artifact_key("../../etc/passwd"), "passwd");
        assert_eq!(artifact_key("C:\\Users\\me\\scan.png"), "scan");
        assert_eq!(artifact_key("บัตร.jpg"), "____");
        assert_eq!(artifact_key(""), "upload");
        assert_eq!(artifact_key(".."), "upload");
    }

    #[test]
    fn test_disabled_writer_has_no_paths() {
        let writer = ArtifactWriter::disabled();
        assert!(writer.snapshot_path("x").is_none());
        assert!(writer.card_overlay_path("x").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(Some(temp_dir.path().to_path_buf()));

        let mut entities = EntityMap::new();
        entities.insert("id_card".to_string(), "1234056789".to_string());
        entities.insert("first_name_th".to_string(), "สมชาย".to_string());
        entities.insert("en_lastname".to_string(), "VAN DAMME".to_string());

        writer.write_snapshot("card", &entities).await;

        let path = writer.snapshot_path("card").unwrap();
        assert_eq!(path, temp_dir.path().join("card_data.json"));

        // Thai text is stored as UTF-8, not escaped
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("สมชาย"));

        let loaded = read_snapshot(&path).await.unwrap();
        assert_eq!(loaded, entities);
    }

    #[tokio::test]
    async fn test_overlays_written() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(Some(temp_dir.path().join("logs")));

        let image = RgbImage::new(120, 80);
        let card = detection(None, 10, 10, 110, 70);
        writer
            .write_card_overlay("photo", &image, std::slice::from_ref(&card), Some(&card))
            .await;

        let fields = vec![
            detection(Some("id_card"), 5, 5, 60, 15),
            detection(Some("religion"), 1, 1, 2, 2),
        ];
        writer
            .write_field_overlay("photo", &RgbImage::new(100, 60), &fields)
            .await;

        let overlay = image::open(writer.card_overlay_path("photo").unwrap()).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (120, 80));
        assert!(writer.field_overlay_path("photo").unwrap().exists());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the directory should be
        let blocker = temp_dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();

        let writer = ArtifactWriter::new(Some(blocker));
        writer.write_snapshot("x", &EntityMap::new()).await;
        writer
            .write_field_overlay("x", &RgbImage::new(4, 4), &[])
            .await;
    }
}
