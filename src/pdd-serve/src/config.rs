use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ServeError};
use crate::obj_key::ObjKey;

pub const S3_BUCKET: &str = "plantdiseasedetection";
pub const WRITE_DIR: &str = "/tmp/";
pub const USER_MEDIA_PREFIX: &str = "user-media/";
pub const MODEL_PREFIX: &str = "cnn_model/";
pub const LABELS_KEY: &str = "labels.txt";
pub const IMG_SIZE: u32 = 256;
pub const UPLOAD_URL_EXPIRY: Duration = Duration::from_secs(300);

/// Memory layout of the model input, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// `(1, height, width, 3)`
    #[default]
    ChannelsLast,
    /// `(1, 3, height, width)`
    ChannelsFirst,
}

impl FromStr for ChannelLayout {
    type Err = ServeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "channels_last" => Ok(ChannelLayout::ChannelsLast),
            "channels_first" => Ok(ChannelLayout::ChannelsFirst),
            other => Err(ServeError::Config(format!(
                "unknown channel layout '{}', expected channels_last or channels_first",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn square(side: u32) -> Self {
        ImageSize {
            width: side,
            height: side,
        }
    }
}

impl FromStr for ImageSize {
    type Err = ServeError;

    /// Accepts `256` or `224x224`.
    fn from_str(s: &str) -> Result<Self> {
        let parse_dim = |d: &str| -> Result<u32> {
            match d.trim().parse::<u32>() {
                Ok(v) if v > 0 => Ok(v),
                _ => Err(ServeError::Config(format!("invalid image size '{}'", s))),
            }
        };

        match s.split_once('x') {
            Some((w, h)) => Ok(ImageSize {
                width: parse_dim(w)?,
                height: parse_dim(h)?,
            }),
            None => parse_dim(s).map(ImageSize::square),
        }
    }
}

/// Everything the service needs to know about where things live.
///
/// Values are fixed once the process has started.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bucket holding both model artifacts and user uploads
    pub bucket: String,

    /// Local scratch storage
    pub scratch_dir: PathBuf,

    /// Remote prefix for uploaded images
    pub user_media_prefix: String,

    /// Remote prefix of the SavedModel export
    pub model_prefix: String,

    /// Remote key of the newline-delimited label file
    pub labels_key: String,

    /// Model input resolution
    pub image_size: ImageSize,

    pub layout: ChannelLayout,

    /// Lifetime of pre-signed upload URLs
    pub upload_url_expiry: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bucket: S3_BUCKET.to_owned(),
            scratch_dir: PathBuf::from(WRITE_DIR),
            user_media_prefix: USER_MEDIA_PREFIX.to_owned(),
            model_prefix: MODEL_PREFIX.to_owned(),
            labels_key: LABELS_KEY.to_owned(),
            image_size: ImageSize::square(IMG_SIZE),
            layout: ChannelLayout::default(),
            upload_url_expiry: UPLOAD_URL_EXPIRY,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `PDD_*` environment variables. Meant to be
    /// called once during cold start.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServiceConfig::default();

        if let Some(v) = lookup("PDD_BUCKET") {
            config.bucket = v;
        }
        if let Some(v) = lookup("PDD_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PDD_USER_MEDIA_PREFIX") {
            config.user_media_prefix = v;
        }
        if let Some(v) = lookup("PDD_MODEL_PREFIX") {
            config.model_prefix = v;
        }
        if let Some(v) = lookup("PDD_LABELS_KEY") {
            config.labels_key = v;
        }
        if let Some(v) = lookup("PDD_IMAGE_SIZE") {
            config.image_size = v.parse()?;
        }
        if let Some(v) = lookup("PDD_CHANNEL_LAYOUT") {
            config.layout = v.parse()?;
        }

        if config.bucket.is_empty() {
            return Err(ServeError::Config("bucket name is empty".to_owned()));
        }
        if config.model_prefix.trim_matches('/').is_empty() {
            return Err(ServeError::Config("model prefix is empty".to_owned()));
        }
        if !config.model_prefix.ends_with('/') {
            config.model_prefix.push('/');
        }

        Ok(config)
    }

    /// Where the SavedModel export is unpacked.
    pub fn model_dir(&self) -> PathBuf {
        self.scratch_dir.join(self.model_prefix.trim_end_matches('/'))
    }

    pub fn labels_path(&self) -> PathBuf {
        let file_name = Path::new(&self.labels_key)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(LABELS_KEY));
        self.scratch_dir.join(file_name)
    }

    /// Local cache directory for downloaded user images.
    pub fn user_media_dir(&self) -> PathBuf {
        self.scratch_dir.join(self.user_media_prefix.trim_end_matches('/'))
    }

    pub fn user_media_key(&self, key: &ObjKey) -> String {
        format!("{}{}", self.user_media_prefix, key)
    }
}
