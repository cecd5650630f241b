//! Background dispatch of queued analyses onto a bounded worker pool

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use codescope_core::domain::analysis::{AnalysisId, IAnalysisRecordStore};

use crate::application::AnalysisOrchestrator;
use crate::domain::ProgressSink;

/// Runs analyses in the background, at most `max_concurrent_runs` at a time.
#[derive(Clone)]
pub struct AnalysisDispatcher {
    orchestrator: Arc<AnalysisOrchestrator>,
    analyses: Arc<dyn IAnalysisRecordStore>,
    progress: Arc<dyn ProgressSink>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    in_flight: Arc<Mutex<HashSet<AnalysisId>>>,
}

impl AnalysisDispatcher {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator>,
        analyses: Arc<dyn IAnalysisRecordStore>,
        progress: Arc<dyn ProgressSink>,
        max_concurrent_runs: usize,
    ) -> Self {
        let concurrency = max_concurrent_runs.max(1);
        Self {
            orchestrator,
            analyses,
            progress,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start `analysis_id` in the background once a worker slot frees up.
    ///
    /// Returns `None` when the analysis is already dispatched.
    pub async fn dispatch(&self, analysis_id: AnalysisId) -> Option<JoinHandle<()>> {
        if !self.in_flight.lock().await.insert(analysis_id) {
            debug!(analysis_id = %analysis_id, "Analysis already dispatched");
            return None;
        }

        let dispatcher = self.clone();
        Some(tokio::spawn(async move {
            match dispatcher.semaphore.clone().acquire_owned().await {
                Ok(_permit) => {
                    match dispatcher
                        .orchestrator
                        .run_analysis(analysis_id, dispatcher.progress.as_ref())
                        .await
                    {
                        Ok(status) => {
                            info!(analysis_id = %analysis_id, %status, "Analysis run finished")
                        }
                        Err(e) => {
                            warn!(analysis_id = %analysis_id, error = %e, "Analysis run failed")
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to acquire concurrency permit for analysis run");
                }
            }
            dispatcher.in_flight.lock().await.remove(&analysis_id);
        }))
    }

    /// Settle analyses a previous worker left running.
    pub async fn recover_interrupted(&self) {
        match self.orchestrator.recover_interrupted().await {
            Ok(0) => debug!("No interrupted analyses to recover"),
            Ok(recovered) => info!(recovered, "Recovered interrupted analyses"),
            Err(e) => error!(error = %e, "Failed to recover interrupted analyses"),
        }
    }

    /// Poll the store for queued analyses and dispatch them until `shutdown` fires.
    ///
    /// Interrupted analyses are recovered once before the first poll.
    pub fn spawn_queue_poller(
        &self,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            info!(
                concurrency = dispatcher.concurrency,
                interval_ms = poll_interval.as_millis() as u64,
                "Analysis queue poller started"
            );
            dispatcher.recover_interrupted().await;
            let mut ticker = tokio::time::interval(poll_interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => dispatcher.poll_once().await,
                }
            }

            info!("Analysis queue poller stopped");
        })
    }

    /// Dispatch every queued analysis visible right now.
    pub async fn poll_once(&self) {
        match self.analyses.find_queued(self.concurrency * 2).await {
            Ok(queued) => {
                for analysis in queued {
                    self.dispatch(analysis.id).await;
                }
            }
            Err(e) => error!(error = %e, "Failed to list queued analyses"),
        }
    }

    /// Wait until every dispatched run has finished.
    pub async fn drain(&self) {
        let permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        match self.semaphore.acquire_many(permits).await {
            Ok(_all) => debug!("All analysis runs drained"),
            Err(e) => error!(error = %e, "Failed to drain analysis runs"),
        }
    }

    /// Analyses dispatched and not yet finished
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}
