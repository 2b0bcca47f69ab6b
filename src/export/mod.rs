//! Model export
//!
//! Fitted pipelines are written as self-describing JSON artifacts that can
//! be reloaded without the session that produced them.

mod artifact;

pub use artifact::{sanitize_name, ArtifactPersister, ModelArtifact, ARTIFACT_FORMAT_VERSION};
