#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Event bus abstractions for pipeline stage lifecycle notifications.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::broadcast};
use uuid::Uuid;

/// Kind of lifecycle notification emitted by the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A stage began executing.
    StageStarted,
    /// A stage produced its artifact.
    StageCompleted,
    /// A stage aborted the run.
    StageFailed,
    /// The evaluation gate accepted the trained model.
    ModelAccepted,
    /// The evaluation gate rejected the trained model.
    ModelRejected,
    /// The accepted model was uploaded to the store.
    ModelPublished,
}

/// Event record encoded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique identifier.
    pub id: String,
    /// Identifier of the pipeline run that emitted the event.
    pub run_id: String,
    /// Component producing the event.
    pub source: String,
    /// Lifecycle kind.
    pub kind: EventKind,
    /// Stage name, when the event is stage scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PipelineEvent {
    /// Creates an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        source: impl Into<String>,
        kind: EventKind,
        stage: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            run_id: run_id.into(),
            source: source.into(),
            kind,
            stage,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Event publisher interface.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an event.
    async fn publish(&self, event: PipelineEvent) -> Result<()>;
}

/// Event subscriber interface.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Returns a receiver that yields every event published after the call.
    async fn subscribe(&self) -> Result<broadcast::Receiver<PipelineEvent>>;
}

/// In-memory broadcast bus retaining a bounded backlog.
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    sender: broadcast::Sender<PipelineEvent>,
    capacity: usize,
    backlog: Arc<Mutex<VecDeque<PipelineEvent>>>,
}

impl MemoryEventBus {
    /// Creates a new bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Snapshot of retained events, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PipelineEvent> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Retained events of one kind, oldest first.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<PipelineEvent> {
        self.backlog
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventBus {
    async fn publish(&self, event: PipelineEvent) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            if backlog.len() == self.capacity {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }
        // No live subscribers is fine; the backlog still holds the event.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for MemoryEventBus {
    async fn subscribe(&self) -> Result<broadcast::Receiver<PipelineEvent>> {
        Ok(self.sender.subscribe())
    }
}

/// File-backed publisher appending JSON lines.
#[derive(Debug, Clone)]
pub struct FileEventPublisher {
    path: PathBuf,
}

impl FileEventPublisher {
    /// Creates a publisher that appends to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventPublisher for FileEventPublisher {
    async fn publish(&self, event: PipelineEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut data = serde_json::to_vec(&event)?;
        data.push(b'\n');
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::runtime::Runtime;

    fn stage_event(kind: EventKind) -> PipelineEvent {
        PipelineEvent::new(
            "run-1",
            "tester",
            kind,
            Some("data_ingestion".into()),
            serde_json::json!({ "rows": 10 }),
        )
    }

    #[test]
    fn publishes_and_receives() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = MemoryEventBus::new(16);
            let mut rx = bus.subscribe().await.unwrap();
            bus.publish(stage_event(EventKind::StageStarted)).await.unwrap();
            let event = rx.recv().await.unwrap();
            assert_eq!(event.kind, EventKind::StageStarted);
            assert_eq!(event.stage.as_deref(), Some("data_ingestion"));
        });
    }

    #[test]
    fn backlog_is_bounded() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let bus = MemoryEventBus::new(2);
            bus.publish(stage_event(EventKind::StageStarted)).await.unwrap();
            bus.publish(stage_event(EventKind::StageCompleted)).await.unwrap();
            bus.publish(stage_event(EventKind::ModelRejected)).await.unwrap();
            let kinds: Vec<_> = bus.snapshot().into_iter().map(|e| e.kind).collect();
            assert_eq!(kinds, vec![EventKind::StageCompleted, EventKind::ModelRejected]);
            assert_eq!(bus.of_kind(EventKind::ModelRejected).len(), 1);
        });
    }

    #[test]
    fn file_publisher_writes_events() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempdir().unwrap();
            let path = dir.path().join("events/run.jsonl");
            let publisher = FileEventPublisher::new(&path).unwrap();
            publisher
                .publish(stage_event(EventKind::ModelPublished))
                .await
                .unwrap();
            let content = std::fs::read_to_string(path).unwrap();
            assert!(content.contains("\"kind\":\"model_published\""));
        });
    }
}
