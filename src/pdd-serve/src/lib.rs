//! Plant disease classification served over HTTP.
//!
//! Clients ask for a pre-signed upload URL, PUT their image to object
//! storage, then ask for the classification of the uploaded object. The
//! [`router`] is host independent; the Lambda and HTTP server binaries only
//! translate their requests into [`router::dispatch`] calls.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod obj_key;
pub mod preprocess;
pub mod response;
pub mod router;
pub mod service;
pub mod storage;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::{ChannelLayout, ImageSize, ServiceConfig};
pub use error::{Result, ServeError};
pub use labels::{LabelEncoder, Prediction};
pub use model::{Classifier, TfClassifier};
pub use obj_key::{is_valid_obj_key, ObjKey};
pub use response::{ApiResponse, CONTENT_TYPE_JSON};
pub use service::{InferenceService, UploadTicket};
pub use storage::{ObjectStore, S3Store};
pub use timer::Timer;
