//! Named, standalone copies of fitted pipelines on disk

use crate::error::{BuilderError, Result};
use crate::training::{FittedPipeline, ModelKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bumped whenever the envelope or pipeline layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk JSON envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub model_type: ModelKind,
    pub feature_columns: Vec<String>,
    pub classes: Vec<String>,
    pub pipeline: FittedPipeline,
}

/// Keep ASCII alphanumerics, `_` and `-`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Writes and reads artifacts under one models directory
#[derive(Debug, Clone)]
pub struct ArtifactPersister {
    models_dir: PathBuf,
}

impl ArtifactPersister {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path an artifact called `name` would be written to
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let safe_name = sanitize_name(name);
        if safe_name.is_empty() {
            return Err(BuilderError::InvalidInput(format!(
                "model_name '{}' has no usable characters (allowed: letters, digits, '_' and '-')",
                name
            )));
        }
        Ok(self.models_dir.join(format!("{}.json", safe_name)))
    }

    /// Serialize `pipeline` to `<models_dir>/<sanitized name>.json`,
    /// replacing any artifact of the same name
    pub fn save(&self, pipeline: &FittedPipeline, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.models_dir)?;

        let artifact = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            model_type: pipeline.model_type,
            feature_columns: pipeline.feature_columns(),
            classes: pipeline.labels.classes().to_vec(),
            pipeline: pipeline.clone(),
        };

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &artifact)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            model_type = %pipeline.model_type.as_str(),
            "Model artifact saved"
        );
        Ok(path)
    }

    /// Read an artifact back, rejecting unknown format versions
    pub fn load(path: impl AsRef<Path>) -> Result<ModelArtifact> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(BuilderError::SerializationError(format!(
                "{} has artifact format {}, expected {}",
                path.display(),
                artifact.format_version,
                ARTIFACT_FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }
}
