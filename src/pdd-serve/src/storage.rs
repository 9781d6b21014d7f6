//! Object storage access.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use log::debug;
use tokio::fs::{self, File};
use tokio::io::{self, AsyncRead, AsyncWriteExt};

use crate::error::{Result, ServeError};

/// The operations the service needs from object storage. All keys are
/// relative to one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `key` and store it at `dest`, creating parent directories.
    async fn download(&self, key: &str, dest: &Path) -> Result<()>;

    /// Every key under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// A URL allowing one PUT of `key` until it expires.
    async fn presign_put(&self, key: &str, expires_in: Duration) -> Result<String>;
}

/// S3 backed [`ObjectStore`].
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: &str) -> Self {
        S3Store {
            client,
            bucket: bucket.to_owned(),
        }
    }

    /// Client configured from the environment (Lambda role, profile, ...).
    pub async fn from_env(bucket: &str) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        S3Store::new(Client::new(&aws_config), bucket)
    }
}

fn storage_err<E>(what: &str, key: &str, err: E) -> ServeError
where
    E: std::error::Error,
{
    ServeError::Storage(format!("{} '{}': {}", what, key, DisplayErrorContext(err)))
}

/// Sibling path used while a download is in flight, so an interrupted write
/// never looks like a cached file.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream `reader` to `dest` through a temporary sibling file. Nothing is
/// left at either path if the stream fails.
pub(crate) async fn write_stream<R>(dest: &Path, reader: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = partial_path(dest);

    let written = async {
        let mut file = File::create(&tmp).await?;
        io::copy(reader, &mut file).await?;
        file.flush().await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }

    fs::rename(&tmp, dest).await?;
    Ok(())
}

/// Write `data` to `dest` through a temporary sibling file.
pub(crate) async fn write_atomic(dest: &Path, data: &[u8]) -> Result<()> {
    let mut reader = data;
    write_stream(dest, &mut reader).await
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, key: &str, dest: &Path) -> Result<()> {
        debug!("Downloading s3://{}/{} to {}", self.bucket, key, dest.display());

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_err("Could not get object", key, e))?;

        let mut body = object.body.into_async_read();
        write_stream(dest, &mut body).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| storage_err("Could not list", prefix, e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_owned)));
        }

        Ok(keys)
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| storage_err("Invalid presigning expiry for", key, e))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| storage_err("Could not presign", key, e))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, ReadBuf};

    /// Fails on first read, like a connection dropped mid-body.
    struct Reset;

    impl AsyncRead for Reset {
        fn poll_read(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    #[test]
    fn partial_path_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/user-media/abc")),
            PathBuf::from("/tmp/user-media/abc.part")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a/b/object");

        write_atomic(&dest, b"payload").await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn write_stream_copies_large_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cnn_model/variables/variables.data-00000-of-00001");
        let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

        let mut reader = &payload[..];
        write_stream(&dest, &mut reader).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), payload);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn interrupted_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("user-media/abc");
        let mut reader = (&b"first bytes"[..]).chain(Reset);

        let err = write_stream(&dest, &mut reader).await.unwrap_err();

        assert!(matches!(err, ServeError::Io(_)));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }
}
