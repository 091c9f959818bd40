#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::module_name_repetitions
)]

//! US visa approval training pipeline: ingestion, schema validation, feature
//! transformation, classifier training, evaluation against the published
//! model and conditional publishing, plus single-application prediction.

/// Column names, artifact layout and defaults.
#[path = "../constants.rs"]
pub mod constants;

/// Stage identifiers and the pipeline error type.
#[path = "../error.rs"]
pub mod error;

/// Columnar in-memory table with CSV I/O.
#[path = "../frame/main.rs"]
pub mod frame;

/// Artifacts, configuration, schema and label mapping.
#[path = "../entity/main.rs"]
pub mod entity;

/// Encoders, power transform, scaler and the column transformer.
#[path = "../preprocessing/main.rs"]
pub mod preprocessing;

/// SMOTE oversampling followed by edited-nearest-neighbours cleaning.
#[path = "../resampling/main.rs"]
pub mod resampling;

/// Logistic regression, metrics and the candidate grid search.
#[path = "../classifier/main.rs"]
pub mod classifier;

/// Model store backends and the published-model handle.
#[path = "../storage/main.rs"]
pub mod storage;

/// Telemetry helpers for logging/event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// File helpers for YAML, JSON objects and numeric arrays.
#[path = "../utils.rs"]
pub mod utils;

/// Deterministic synthetic visa applications.
#[path = "../sample.rs"]
pub mod sample;

/// Pipeline stages.
#[path = "../components/main.rs"]
pub mod components;

/// Training and prediction entry points.
#[path = "../pipelines/main.rs"]
pub mod pipelines;

pub use entity::config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, Stage};
pub use pipelines::{PipelineOutcome, TrainPipeline, VisaClassifier, VisaData};
pub use telemetry::{PipelineTelemetry, PipelineTelemetryBuilder};
