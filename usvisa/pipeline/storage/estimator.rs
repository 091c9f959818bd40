use std::{path::Path, sync::Arc};

use parking_lot::Mutex;

use super::{ModelStore, StorageError};
use crate::{entity::estimator::VisaModel, frame::Frame};

/// Handle on the model published under one bucket/key.
///
/// The model is fetched on first use and cached for the handle's lifetime.
pub struct VisaEstimator {
    store: Arc<dyn ModelStore>,
    bucket_name: String,
    model_path: String,
    loaded: Mutex<Option<Arc<VisaModel>>>,
}

impl std::fmt::Debug for VisaEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisaEstimator")
            .field("bucket_name", &self.bucket_name)
            .field("model_path", &self.model_path)
            .finish_non_exhaustive()
    }
}

impl VisaEstimator {
    /// Creates a handle; nothing is fetched yet.
    pub fn new(
        store: Arc<dyn ModelStore>,
        bucket_name: impl Into<String>,
        model_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket_name: bucket_name.into(),
            model_path: model_path.into(),
            loaded: Mutex::new(None),
        }
    }

    /// Store key of the model.
    #[must_use]
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// Whether a model is published under the key.
    pub fn is_model_present(&self) -> Result<bool, StorageError> {
        self.store.exists(&self.bucket_name, &self.model_path)
    }

    /// Fetches and decodes the published model, bypassing the cache.
    pub fn load_model(&self) -> Result<VisaModel, StorageError> {
        let bytes = self.store.get_object(&self.bucket_name, &self.model_path)?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode {
            key: self.model_path.clone(),
            source,
        })
    }

    /// Uploads a serialized model file under the key and drops the cache.
    pub fn save_model(&self, from_file: &Path) -> Result<(), StorageError> {
        self.store
            .upload_file(from_file, &self.bucket_name, &self.model_path)?;
        *self.loaded.lock() = None;
        Ok(())
    }

    fn model(&self) -> Result<Arc<VisaModel>, StorageError> {
        let mut guard = self.loaded.lock();
        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(self.load_model()?);
        *guard = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Class codes predicted by the published model.
    pub fn predict(&self, frame: &Frame) -> Result<Vec<usize>, StorageError> {
        let model = self.model()?;
        model
            .predict(frame)
            .map_err(|err| StorageError::Predict(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::{LogisticParams, LogisticRegression},
        frame::Column,
        preprocessing::{Preprocessor, StandardScaler},
        preprocessing::column_transformer::ColumnStep,
        storage::MemoryModelStore,
    };
    use ndarray::array;
    use tempfile::tempdir;

    fn model_file(dir: &Path) -> std::path::PathBuf {
        let frame = Frame::from_columns([(
            "prevailing_wage",
            Column::Numeric(vec![-2.0, -1.0, 1.0, 2.0]),
        )])
        .unwrap();
        let preprocessor = Preprocessor::new()
            .with_step(
                "standard_scaler",
                ColumnStep::Standard(StandardScaler::new()),
                vec!["prevailing_wage".into()],
            )
            .fit(&frame)
            .unwrap();
        let x = array![[-2.0], [-1.0], [1.0], [2.0]];
        let classifier =
            LogisticRegression::fit(LogisticParams::default(), &x, &[0, 0, 1, 1]).unwrap();
        let path = dir.join("model.json");
        crate::utils::save_object(&path, &VisaModel::new(preprocessor, classifier)).unwrap();
        path
    }

    #[test]
    fn saves_loads_and_predicts() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryModelStore::new());
        let estimator = VisaEstimator::new(store.clone(), "bucket", "model-registry/model.json");
        assert!(!estimator.is_model_present().unwrap());
        assert!(matches!(
            estimator.predict(&Frame::new()),
            Err(StorageError::NotFound { .. })
        ));

        estimator.save_model(&model_file(dir.path())).unwrap();
        assert!(estimator.is_model_present().unwrap());
        let frame = Frame::from_columns([(
            "prevailing_wage",
            Column::Numeric(vec![-3.0, 3.0]),
        )])
        .unwrap();
        assert_eq!(estimator.predict(&frame).unwrap(), vec![0, 1]);
        assert_eq!(store.upload_count(), 1);
    }

    #[test]
    fn corrupt_model_reports_decode_error() {
        let store = Arc::new(MemoryModelStore::new());
        store.insert("bucket", "model.json", b"not json".to_vec());
        let estimator = VisaEstimator::new(store, "bucket", "model.json");
        assert!(matches!(
            estimator.load_model(),
            Err(StorageError::Decode { .. })
        ));
    }
}
