use std::path::PathBuf;

use log::{debug, info};
use serde::Serialize;
use tokio::fs;

use crate::artifacts::{self, ArtifactPaths};
use crate::config::ServiceConfig;
use crate::error::{Result, ServeError};
use crate::labels::{LabelEncoder, Prediction};
use crate::model::{Classifier, TfClassifier};
use crate::obj_key::ObjKey;
use crate::preprocess;
use crate::storage::{ObjectStore, S3Store};
use crate::timer::Timer;

/// Answer to an upload URL request.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    pub obj_key: String,
    pub upload_url: String,
}

/// Process wide state: built once at cold start, then shared by reference
/// with every request handled by this process.
pub struct InferenceService<S, C> {
    config: ServiceConfig,
    store: S,
    classifier: C,
    labels: LabelEncoder,
}

impl InferenceService<S3Store, TfClassifier> {
    /// Fetch and load the model. Any error here leaves the process unable
    /// to serve and should abort it.
    pub async fn cold_start(config: ServiceConfig) -> Result<Self> {
        let store = S3Store::from_env(&config.bucket).await;
        let paths = artifacts::fetch_artifacts(&store, &config).await?;
        let (classifier, labels) = load_model(&paths)?;

        Ok(InferenceService::new(config, store, classifier, labels))
    }
}

/// Load the SavedModel and its label file from local storage.
pub fn load_model(paths: &ArtifactPaths) -> Result<(TfClassifier, LabelEncoder)> {
    if !artifacts::is_saved_model(&paths.model_dir) {
        return Err(ServeError::Artifact(format!(
            "{} is not a SavedModel export",
            paths.model_dir.display()
        )));
    }

    let classifier = TfClassifier::load(&paths.model_dir)?;
    let labels = LabelEncoder::from_file(&paths.labels_path)?;
    info!("Loaded model with {} classes", labels.len());

    Ok((classifier, labels))
}

impl<S: ObjectStore, C: Classifier> InferenceService<S, C> {
    pub fn new(config: ServiceConfig, store: S, classifier: C, labels: LabelEncoder) -> Self {
        InferenceService {
            config,
            store,
            classifier,
            labels,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Issue a fresh key and a URL the client can PUT the image to.
    pub async fn get_upload_url(&self) -> Result<UploadTicket> {
        let key = ObjKey::generate();
        let upload_url = self
            .store
            .presign_put(&self.config.user_media_key(&key), self.config.upload_url_expiry)
            .await?;

        Ok(UploadTicket {
            obj_key: key.to_string(),
            upload_url,
        })
    }

    /// Classify the image previously uploaded under `key`.
    pub async fn get_inference(&self, key: &ObjKey) -> Result<Prediction> {
        let path = self.fetch_image(key).await?;

        let t = Timer::start("Preprocessing image");
        let tensor =
            preprocess::tensor_from_file(&path, self.config.image_size, self.config.layout)?;
        t.stop();

        let t = Timer::start("Running session");
        let output = self.classifier.predict(&tensor)?;
        t.stop();

        self.labels.decode(&output)
    }

    /// Local copy of the uploaded image, downloaded on first use.
    ///
    /// Keys are never reused, so an existing file is trusted as is.
    async fn fetch_image(&self, key: &ObjKey) -> Result<PathBuf> {
        let path = self.config.user_media_dir().join(key.as_str());

        if fs::try_exists(&path).await? {
            debug!("Using cached image {}", path.display());
            return Ok(path);
        }

        let t = Timer::start("Fetching image");
        self.store
            .download(&self.config.user_media_key(key), &path)
            .await?;
        t.stop();

        Ok(path)
    }
}
