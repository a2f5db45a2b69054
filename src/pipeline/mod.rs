//! Extraction pipeline
//!
//! `Start -> CardDetected | CardNotFound -> FieldsDetected -> TextRead -> EntitiesMapped`

mod artifacts;
mod orchestrator;

pub use artifacts::{artifact_key, read_snapshot, ArtifactError, ArtifactWriter};
pub use orchestrator::{Pipeline, PipelineError, Stage};
