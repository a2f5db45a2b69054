//! Thai ID OCR Server Library
//!
//! Extracts the printed fields of a Thai national ID card from a photo:
//! card detection, field detection, per-field OCR and entity cleanup, served
//! over HTTP.
//!
//! # Modules
//!
//! - `detection`: Card and field localization over pluggable detectors
//! - `ocr`: Text recognizers and the per-field reader
//! - `entity`: Raw text to cleaned entities
//! - `pipeline`: The request pipeline and its debug artifacts
//! - `routes`: HTTP surface

pub mod config;
pub mod detection;
pub mod entity;
pub mod error;
pub mod imaging;
pub mod ocr;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod upload;
pub mod vocabulary;
