//! Cold start download of the model export and its label file.

use std::path::{Component, Path, PathBuf};

use log::info;

use crate::config::ServiceConfig;
use crate::error::{Result, ServeError};
use crate::storage::ObjectStore;
use crate::timer::Timer;

/// Local copies of the model artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    /// SavedModel export directory
    pub model_dir: PathBuf,

    /// Newline-delimited class names
    pub labels_path: PathBuf,
}

/// Relative path of `key` below `prefix`, if it names a file.
fn relative_path(prefix: &str, key: &str) -> Result<Option<PathBuf>> {
    let rel = match key.strip_prefix(prefix) {
        Some(rel) if !rel.is_empty() && !rel.ends_with('/') => rel,
        _ => return Ok(None),
    };

    let path = PathBuf::from(rel);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(ServeError::Artifact(format!(
            "model object '{}' escapes the model directory",
            key
        )));
    }

    Ok(Some(path))
}

/// Mirror every object under the model prefix into the scratch directory and
/// fetch the label file next to it.
pub async fn fetch_artifacts<S: ObjectStore>(
    store: &S,
    config: &ServiceConfig,
) -> Result<ArtifactPaths> {
    let t = Timer::start("Downloading model");

    let model_dir = config.model_dir();
    let mut files = 0;
    for key in store.list(&config.model_prefix).await? {
        if let Some(rel) = relative_path(&config.model_prefix, &key)? {
            store.download(&key, &model_dir.join(rel)).await?;
            files += 1;
        }
    }

    if files == 0 {
        return Err(ServeError::Artifact(format!(
            "no model objects under s3://{}/{}",
            config.bucket, config.model_prefix
        )));
    }

    let labels_path = config.labels_path();
    store.download(&config.labels_key, &labels_path).await?;

    info!("Fetched {} model files into {}", files, model_dir.display());
    t.stop();

    Ok(ArtifactPaths {
        model_dir,
        labels_path,
    })
}

/// Whether `dir` looks like a SavedModel export.
pub fn is_saved_model(dir: &Path) -> bool {
    dir.join("saved_model.pb").is_file() || dir.join("saved_model.pbtxt").is_file()
}
