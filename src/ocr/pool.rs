//! Reader pool
//!
//! One neural reader per language hint, loaded once and picked per field.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use super::provider::{OllamaProvider, TextRecognizer};
use super::types::{LanguageHint, OcrError, OcrProvider};

/// Dispatches each read to the reader registered for its language hint
pub struct ReaderPool {
    readers: HashMap<LanguageHint, Arc<dyn TextRecognizer>>,
}

impl ReaderPool {
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Register the reader used for `language`
    pub fn with_reader(mut self, language: LanguageHint, reader: Arc<dyn TextRecognizer>) -> Self {
        self.readers.insert(language, reader);
        self
    }

    /// Thai, English and mixed readers backed by one Ollama vision model
    pub fn ollama(base_url: &str, model: &str) -> Self {
        LanguageHint::ALL
            .iter()
            .fold(Self::new(), |pool, &language| {
                pool.with_reader(language, Arc::new(OllamaProvider::new(base_url, model)))
            })
    }

    fn reader(&self, language: LanguageHint) -> Result<&Arc<dyn TextRecognizer>, OcrError> {
        self.readers.get(&language).ok_or_else(|| {
            OcrError::ProviderNotAvailable(format!("No reader registered for {:?}", language))
        })
    }
}

impl Default for ReaderPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextRecognizer for ReaderPool {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::ReaderPool
    }

    /// Available when every language has a live reader
    async fn is_available(&self) -> bool {
        for language in LanguageHint::ALL {
            match self.readers.get(&language) {
                Some(reader) if reader.is_available().await => {}
                _ => return false,
            }
        }
        true
    }

    async fn read(&self, region: &RgbImage, language: LanguageHint) -> Result<String, OcrError> {
        self.reader(language)?.read(region, language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::provider::MockProvider;

    #[tokio::test]
    async fn test_dispatch_by_language() {
        let thai = Arc::new(MockProvider::new("สมชาย"));
        let english = Arc::new(MockProvider::new("SOMCHAI"));
        let mixed = Arc::new(MockProvider::new("1 2345"));

        let pool = ReaderPool::new()
            .with_reader(LanguageHint::Thai, thai.clone())
            .with_reader(LanguageHint::English, english.clone())
            .with_reader(LanguageHint::Mixed, mixed.clone());

        let region = RgbImage::new(10, 4);
        assert_eq!(pool.read(&region, LanguageHint::Thai).await.unwrap(), "สมชาย");
        assert_eq!(pool.read(&region, LanguageHint::English).await.unwrap(), "SOMCHAI");
        assert_eq!(pool.read(&region, LanguageHint::Mixed).await.unwrap(), "1 2345");

        assert_eq!(thai.calls.lock().len(), 1);
        assert_eq!(english.calls.lock().len(), 1);
        assert_eq!(mixed.calls.lock().len(), 1);
        assert!(pool.is_available().await);
    }

    #[tokio::test]
    async fn test_missing_reader() {
        let pool = ReaderPool::new().with_reader(LanguageHint::Thai, Arc::new(MockProvider::new("x")));

        let result = pool.read(&RgbImage::new(4, 4), LanguageHint::English).await;
        assert!(matches!(result, Err(OcrError::ProviderNotAvailable(_))));
        assert!(!pool.is_available().await);
    }

    #[test]
    fn test_ollama_pool_covers_all_languages() {
        let pool = ReaderPool::ollama("http://localhost:11434", "llava");
        for language in LanguageHint::ALL {
            assert!(pool.reader(language).is_ok());
        }
    }
}
