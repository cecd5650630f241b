//! Progress sinks

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::domain::{ProgressEvent, ProgressSink};

/// Forwards events into a bounded tokio channel
pub struct ChannelProgressSink {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        if self.sender.send(event).await.is_err() {
            debug!("Progress receiver dropped, discarding event");
        }
    }
}

/// Keeps every event in memory
#[derive(Default)]
pub struct VecProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl VecProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl ProgressSink for VecProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        self.events.lock().await.push(event);
    }
}

/// Logs each event at `info`
pub struct TracingProgressSink;

#[async_trait]
impl ProgressSink for TracingProgressSink {
    async fn emit(&self, event: ProgressEvent) {
        info!(
            analysis_id = %event.analysis_id,
            status = %event.status,
            progress = event.progress,
            step = %event.current_step,
            "{}",
            event.message
        );
    }
}

pub struct NoOpProgressSink;

#[async_trait]
impl ProgressSink for NoOpProgressSink {
    async fn emit(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use codescope_core::domain::analysis::{AnalysisId, AnalysisStatus};

    use super::*;

    fn event(progress: u8) -> ProgressEvent {
        ProgressEvent {
            analysis_id: AnalysisId::generate(),
            status: AnalysisStatus::Running,
            progress,
            current_step: "scan".into(),
            message: "Scanning".into(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut receiver) = ChannelProgressSink::channel(4);
        sink.emit(event(10)).await;
        sink.emit(event(20)).await;
        assert_eq!(receiver.recv().await.unwrap().progress, 10);
        assert_eq!(receiver.recv().await.unwrap().progress, 20);
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, receiver) = ChannelProgressSink::channel(1);
        drop(receiver);
        sink.emit(event(50)).await;
    }

    #[tokio::test]
    async fn test_vec_sink_records_in_order() {
        let sink = VecProgressSink::new();
        sink.emit(event(5)).await;
        sink.emit(event(100)).await;
        let progress: Vec<u8> = sink.events().await.iter().map(|e| e.progress).collect();
        assert_eq!(progress, vec![5, 100]);
    }
}
