//! Progress reporting contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use codescope_core::domain::analysis::{AnalysisId, AnalysisStatus};

/// One progress update for a running analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub analysis_id: AnalysisId,
    /// `running` while in flight, then the terminal status
    pub status: AnalysisStatus,
    /// Percentage in `0..=100`, non-decreasing within one run
    pub progress: u8,
    pub current_step: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Receiver of progress events for one or more runs
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}
