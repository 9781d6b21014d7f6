//! In-memory stand-ins for object storage and the model.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, ServeError};
use crate::model::Classifier;
use crate::preprocess::ImageTensor;
use crate::storage::{write_atomic, ObjectStore};

#[derive(Default)]
pub struct StubStore {
    objects: BTreeMap<String, Vec<u8>>,
    downloads: Mutex<Vec<String>>,
    offline: bool,
}

impl StubStore {
    pub fn with_object(mut self, key: &str, data: &[u8]) -> Self {
        self.objects.insert(key.to_owned(), data.to_vec());
        self
    }

    /// Every call fails as if the service were unreachable.
    pub fn offline() -> Self {
        StubStore {
            offline: true,
            ..StubStore::default()
        }
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(ServeError::Storage("connection refused".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for StubStore {
    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        self.check_online()?;
        self.downloads.lock().unwrap().push(key.to_owned());
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| ServeError::Storage(format!("NoSuchKey '{}'", key)))?;
        write_atomic(dest, data).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> Result<String> {
        self.check_online()?;
        Ok(format!(
            "https://stub.s3.local/{}?X-Amz-Expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

/// Returns the same output for any input, remembering input shapes.
pub struct StubClassifier {
    output: Vec<f32>,
    seen: Mutex<Vec<Vec<usize>>>,
}

impl StubClassifier {
    pub fn new(output: &[f32]) -> Self {
        StubClassifier {
            output: output.to_vec(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_shapes(&self) -> Vec<Vec<usize>> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for StubClassifier {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        self.seen.lock().unwrap().push(input.shape().to_vec());
        Ok(self.output.clone())
    }
}
