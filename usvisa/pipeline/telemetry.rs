use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventKind, EventPublisher, PipelineEvent};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::{Handle, Runtime};
use uuid::Uuid;

use crate::error::Stage;

/// Builder configuring telemetry for a pipeline run.
pub struct PipelineTelemetryBuilder {
    module: String,
    run_id: Option<String>,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl PipelineTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            run_id: None,
            log_path: None,
            min_level: LogLevel::Info,
            event_publisher: None,
        }
    }

    /// Pins the run identifier. A fresh one is generated otherwise.
    #[must_use]
    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Assigns the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<PipelineTelemetry> {
        let logger = if let Some(path) = self.log_path {
            Some(JsonLogger::with_min_level(path, self.min_level)?)
        } else {
            None
        };
        let event = if let Some(publisher) = self.event_publisher {
            Some(EventHandle::new(publisher)?)
        } else {
            None
        };
        Ok(PipelineTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                run_id: self.run_id.unwrap_or_else(new_run_id),
                logger,
                event,
            }),
        })
    }
}

/// Generates a run identifier.
#[must_use]
pub fn new_run_id() -> String {
    format!("run-{}", Uuid::new_v4())
}

/// Telemetry handle shared by every stage of a run.
#[derive(Clone)]
pub struct PipelineTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for PipelineTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineTelemetry")
            .field("module", &self.inner.module)
            .field("run_id", &self.inner.run_id)
            .finish()
    }
}

impl Default for PipelineTelemetry {
    fn default() -> Self {
        Self::disabled("usvisa")
    }
}

struct TelemetryInner {
    module: String,
    run_id: String,
    logger: Option<JsonLogger>,
    event: Option<EventHandle>,
}

struct EventHandle {
    runtime: Runtime,
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandle {
    fn new(publisher: Arc<dyn EventPublisher>) -> Result<Self> {
        Ok(Self {
            runtime: Runtime::new()?,
            publisher,
        })
    }

    fn publish(&self, event: PipelineEvent) -> Result<()> {
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(&self.publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(event).await {
                    eprintln!("telemetry event publish failed: {err:?}");
                }
            });
            Ok(())
        } else {
            self.runtime.block_on(self.publisher.publish(event))
        }
    }
}

impl PipelineTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> PipelineTelemetryBuilder {
        PipelineTelemetryBuilder::new(module)
    }

    /// Telemetry that neither logs nor publishes.
    #[must_use]
    pub fn disabled(module: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                run_id: new_run_id(),
                logger: None,
                event: None,
            }),
        }
    }

    /// Identifier of the current run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    /// Logs a structured record, optionally tagged with a stage.
    pub fn log(
        &self,
        level: LogLevel,
        stage: Option<Stage>,
        message: &str,
        metadata: Value,
    ) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            if !logger.enabled(level) {
                return Ok(());
            }
            let mut record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            if let Some(stage) = stage {
                record = record.with_stage(stage.as_str());
            }
            record
                .metadata
                .insert("run_id".into(), Value::String(self.inner.run_id.clone()));
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Best-effort [`Self::log`]: a failed write goes to stderr.
    pub fn record(&self, level: LogLevel, stage: Option<Stage>, message: &str, metadata: Value) {
        if let Err(err) = self.log(level, stage, message, metadata) {
            eprintln!("telemetry log failed: {err:?}");
        }
    }

    /// Info-level stage log, best effort.
    pub fn info(&self, stage: Stage, message: &str, metadata: Value) {
        self.record(LogLevel::Info, Some(stage), message, metadata);
    }

    /// Warn-level stage log, best effort.
    pub fn warn(&self, stage: Stage, message: &str, metadata: Value) {
        self.record(LogLevel::Warn, Some(stage), message, metadata);
    }

    /// Best-effort [`Self::event`]: a failed publish goes to stderr.
    pub fn notify(&self, kind: EventKind, stage: Option<Stage>, payload: Value) {
        if let Err(err) = self.event(kind, stage, payload) {
            eprintln!("telemetry event {kind:?} failed: {err:?}");
        }
    }

    /// Emits an event via the configured bus.
    pub fn event(&self, kind: EventKind, stage: Option<Stage>, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            let event = PipelineEvent::new(
                &self.inner.run_id,
                &self.inner.module,
                kind,
                stage.map(|stage| stage.as_str().to_string()),
                payload,
            );
            handle.publish(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use tempfile::tempdir;

    #[test]
    fn telemetry_logs_and_emits() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("usvisa.log.jsonl");
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = PipelineTelemetry::builder("usvisa")
            .run_id("run-test")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .info(Stage::DataIngestion, "split complete", json!({ "train_rows": 8 }));
        telemetry
            .event(EventKind::StageCompleted, Some(Stage::DataIngestion), json!({}))
            .unwrap();

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("split complete"));
        assert!(content.contains("\"stage\":\"data_ingestion\""));
        assert!(content.contains("run-test"));
        let events = bus.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].run_id, "run-test");
        assert_eq!(events[0].stage.as_deref(), Some("data_ingestion"));
    }

    #[test]
    fn min_level_filters_debug() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("filtered.jsonl");
        let telemetry = PipelineTelemetry::builder("usvisa")
            .log_path(&log_path)
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Debug, None, "hidden", Value::Null)
            .unwrap();
        telemetry.warn(Stage::DataValidation, "drift detected", Value::Null);
        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("drift detected"));
    }

    #[test]
    fn disabled_telemetry_is_silent() {
        let telemetry = PipelineTelemetry::disabled("usvisa");
        assert!(telemetry.run_id().starts_with("run-"));
        telemetry
            .event(EventKind::ModelRejected, None, Value::Null)
            .unwrap();
    }
}
