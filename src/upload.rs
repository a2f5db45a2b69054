//! Upload staging
//!
//! Each upload gets its own temporary directory, removed when the
//! [`StagedUpload`] is dropped. HEIC/HEIF photos are transcoded to PNG with
//! `heif-convert` before decoding.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use image::RgbImage;
use tempfile::TempDir;
use tokio::process::Command;

/// HEIF brands found in the `ftyp` box of iPhone-style photos
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported or corrupt image: {0}")]
    InvalidImage(String),

    #[error("HEIC conversion failed: {0}")]
    Transcode(String),

    #[error("HEIC converter unavailable: {0}")]
    ConverterUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Upload staging configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Path to heif-convert executable (default: "heif-convert" - uses PATH)
    pub heif_convert_path: String,
    /// Parent for per-request directories (default: system temp)
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            heif_convert_path: "heif-convert".to_string(),
            temp_dir: None,
        }
    }
}

/// An uploaded file staged on disk for the lifetime of one request
#[derive(Debug)]
pub struct StagedUpload {
    // Dropping the TempDir removes every staged file
    dir: TempDir,
    path: PathBuf,
    heif: bool,
}

impl StagedUpload {
    /// Write `data` into a fresh request-scoped directory
    pub async fn stage(
        data: &[u8],
        file_name: &str,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        if data.is_empty() {
            return Err(UploadError::Empty);
        }

        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("thai-id-");
            builder
        };
        let dir = match &config.temp_dir {
            Some(root) => {
                tokio::fs::create_dir_all(root).await?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let heif = is_heif(file_name, data);
        let path = dir
            .path()
            .join(if heif { "upload.heic" } else { "upload.img" });
        tokio::fs::write(&path, data).await?;

        tracing::debug!(
            path = %path.display(),
            bytes = data.len(),
            heif,
            "Staged upload"
        );

        Ok(Self { dir, path, heif })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn is_heif(&self) -> bool {
        self.heif
    }

    /// Decode the staged file into an RGB image
    pub async fn decode(&self, config: &UploadConfig) -> Result<RgbImage, UploadError> {
        let raster = if self.heif {
            self.transcode_heif(config).await?
        } else {
            self.path.clone()
        };

        tokio::task::spawn_blocking(move || decode_file(&raster))
            .await
            .map_err(|e| UploadError::Internal(format!("Decode task failed: {}", e)))?
    }

    async fn transcode_heif(&self, config: &UploadConfig) -> Result<PathBuf, UploadError> {
        let output_path = self.dir.path().join("converted.png");
        tracing::info!("HEIC file detected, converting to PNG");

        let output = Command::new(&config.heif_convert_path)
            .arg(&self.path)
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                UploadError::ConverterUnavailable(format!("Failed to run heif-convert: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UploadError::Transcode(stderr.trim().to_string()));
        }

        Ok(output_path)
    }
}

fn decode_file(path: &Path) -> Result<RgbImage, UploadError> {
    let image = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;
    Ok(image.into_rgb8())
}

/// Whether an upload is HEIC/HEIF, by extension or by its `ftyp` brand
pub fn is_heif(file_name: &str, data: &[u8]) -> bool {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".heic") || lower.ends_with(".heif") {
        return true;
    }

    data.len() >= 12
        && &data[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &data[8..12] == brand.as_slice())
}
