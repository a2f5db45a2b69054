//! OCR Module
//!
//! Reads the text inside detected ID card fields.
//!
//! Supports multiple backends:
//! - Tesseract (local, requires installation, per-language traineddata)
//! - A reader pool of neural readers, one per language hint (Ollama vision
//!   models)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use thai_id_ocr_server::ocr::{FieldReader, TesseractConfig, TesseractProvider};
//!
//! let reader = FieldReader::new(Arc::new(TesseractProvider::new(TesseractConfig::default())));
//! let raw_text = reader.read_fields(&card, &fields).await?;
//! ```

mod pool;
mod provider;
mod reader;
mod types;

pub use pool::ReaderPool;
pub use provider::{OllamaProvider, TesseractConfig, TesseractProvider, TextRecognizer};
pub use reader::{clean_text, FieldReader, RawTextMap};
pub use types::{LanguageHint, OcrError, OcrProvider};

#[cfg(test)]
pub use provider::MockProvider;
