//! Configuration, artifact and model records shared by the stages.

/// Artifact records passed from stage to stage.
pub mod artifact;
/// Run settings and per-stage configuration.
pub mod config;
/// Target mapping and the published model bundle.
pub mod estimator;
/// Dataset schema.
pub mod schema;
