//! Remote model store abstraction and the published-model handle.

/// Handle on the published model.
pub mod estimator;
/// Store trait and its local and in-memory backends.
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use estimator::VisaEstimator;
pub use store::{LocalBucketStore, MemoryModelStore, ModelStore};

/// Errors raised by model stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object under the key.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// Key is empty or escapes the bucket.
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    /// Filesystem failure.
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Cause.
        source: std::io::Error,
    },
    /// Stored bytes are not a model.
    #[error("object `{key}` is not a valid model: {source}")]
    Decode {
        /// Object key.
        key: String,
        /// Cause.
        source: serde_json::Error,
    },
    /// The published model failed to score the input.
    #[error("published model failed to predict: {0}")]
    Predict(String),
}
