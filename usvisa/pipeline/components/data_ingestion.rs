use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde_json::json;

use crate::{
    constants::EXPORT_ID_COLUMN,
    entity::{artifact::DataIngestionArtifact, config::DataIngestionConfig},
    error::{PipelineResult, Stage, StageResultExt},
    frame::Frame,
    telemetry::PipelineTelemetry,
};

const STAGE: Stage = Stage::DataIngestion;

/// Shuffled train/test row indices; the test split holds
/// `round(n * test_ratio)` rows.
#[must_use]
pub fn train_test_split(rows: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..rows).collect();
    indices.shuffle(&mut SmallRng::seed_from_u64(seed));
    let test_len = ((rows as f64) * test_ratio).round() as usize;
    let train = indices.split_off(test_len.min(rows));
    (train, indices)
}

/// Copies the source export into the feature store and splits it.
#[derive(Debug)]
pub struct DataIngestion {
    config: DataIngestionConfig,
    telemetry: PipelineTelemetry,
}

impl DataIngestion {
    /// Creates the stage.
    #[must_use]
    pub const fn new(config: DataIngestionConfig, telemetry: PipelineTelemetry) -> Self {
        Self { config, telemetry }
    }

    /// Reads the export, drops the store's `_id` column and writes the
    /// feature store file.
    pub fn export_data_into_feature_store(&self) -> PipelineResult<Frame> {
        let mut frame = Frame::read_csv(&self.config.source_file_path).stage(STAGE)?;
        if frame.has_column(EXPORT_ID_COLUMN) {
            frame.remove_column(EXPORT_ID_COLUMN).stage(STAGE)?;
        }
        frame
            .write_csv(&self.config.feature_store_file_path)
            .stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "exported data into feature store",
            json!({
                "rows": frame.n_rows(),
                "columns": frame.n_cols(),
                "path": self.config.feature_store_file_path,
            }),
        );
        Ok(frame)
    }

    /// Writes the train and test CSV files.
    pub fn split_data_as_train_test(&self, frame: &Frame) -> PipelineResult<()> {
        let (train_idx, test_idx) = train_test_split(
            frame.n_rows(),
            self.config.train_test_split_ratio,
            self.config.seed,
        );
        frame
            .take_rows(&train_idx)
            .write_csv(&self.config.training_file_path)
            .stage(STAGE)?;
        frame
            .take_rows(&test_idx)
            .write_csv(&self.config.testing_file_path)
            .stage(STAGE)?;
        self.telemetry.info(
            STAGE,
            "performed train test split",
            json!({ "train_rows": train_idx.len(), "test_rows": test_idx.len() }),
        );
        Ok(())
    }

    /// Runs the stage.
    pub fn initiate_data_ingestion(&self) -> PipelineResult<DataIngestionArtifact> {
        let frame = self.export_data_into_feature_store()?;
        self.split_data_as_train_test(&frame)?;
        Ok(DataIngestionArtifact {
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        })
    }
}
