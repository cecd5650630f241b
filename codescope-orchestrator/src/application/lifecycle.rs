//! Status lifecycle controller for codebases, repositories and analyses.
//!
//! Every status change goes through [`LifecycleController`], which validates
//! it against the entity's state machine, persists it, and logs it. Analysis
//! transitions also land in the entity's audit trail.
//!
//! ```text
//! Orchestrator        LifecycleController        Record stores
//!     │                       │                        │
//!     ├─ start_analysis() ───►│── start (queued only) ►│
//!     ├─ claim_codebase() ───►│── claim (not held) ───►│
//!     ├─ mark_repository() ──►│── update_status ──────►│
//!     ├─ complete_analysis() ►│── complete ───────────►│
//!     ├─ release_codebase() ─►│── update_status ──────►│
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use codescope_core::domain::analysis::{
    Analysis, AnalysisResults, AnalysisStatus, AnalysisSummary, AnalysisTransition, Codebase,
    CodebaseStatus, IAnalysisRecordStore, ICodebaseRecordStore, IRepositoryRecordStore,
    Repository, RepositoryStatus, StoreError,
};

use super::errors::OrchestratorError;

/// Centralised status controller.
///
/// The orchestrator never mutates a status field directly; it calls this
/// controller, which keeps the in-memory entity and the store in step.
#[derive(Clone)]
pub struct LifecycleController {
    codebases: Arc<dyn ICodebaseRecordStore>,
    repositories: Arc<dyn IRepositoryRecordStore>,
    analyses: Arc<dyn IAnalysisRecordStore>,
}

impl LifecycleController {
    pub fn new(
        codebases: Arc<dyn ICodebaseRecordStore>,
        repositories: Arc<dyn IRepositoryRecordStore>,
        analyses: Arc<dyn IAnalysisRecordStore>,
    ) -> Self {
        Self {
            codebases,
            repositories,
            analyses,
        }
    }

    // ── Analysis ─────────────────────────────────────────────────────

    /// Claim a queued analysis for this worker.
    pub async fn start_analysis(&self, analysis: &mut Analysis) -> Result<(), OrchestratorError> {
        analysis.transition(AnalysisStatus::Running, Some("Worker started execution".into()))?;
        self.analyses
            .start(&analysis.id, last_transition(analysis)?)
            .await?;

        info!(analysis_id = %analysis.id, "Analysis transitioned to Running");
        Ok(())
    }

    pub async fn complete_analysis(
        &self,
        analysis: &mut Analysis,
        results: AnalysisResults,
        summary: AnalysisSummary,
    ) -> Result<(), OrchestratorError> {
        analysis.transition(
            AnalysisStatus::Completed,
            Some(format!("Completed with {} findings", results.findings_count)),
        )?;
        self.analyses
            .complete(
                &analysis.id,
                &results,
                &summary,
                last_transition(analysis)?,
            )
            .await?;
        analysis.results = Some(results);
        analysis.summary = Some(summary);

        info!(analysis_id = %analysis.id, "Analysis transitioned to Completed");
        Ok(())
    }

    pub async fn fail_analysis(
        &self,
        analysis: &mut Analysis,
        error: &str,
    ) -> Result<(), OrchestratorError> {
        analysis.transition(
            AnalysisStatus::Failed,
            Some(format!("Execution failed: {}", error)),
        )?;
        self.analyses
            .fail(&analysis.id, error, last_transition(analysis)?)
            .await?;
        analysis.error_message = Some(error.to_string());

        warn!(analysis_id = %analysis.id, error, "Analysis transitioned to Failed");
        Ok(())
    }

    pub async fn cancel_analysis(
        &self,
        analysis: &mut Analysis,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        analysis.transition(AnalysisStatus::Cancelled, Some(format!("Cancelled: {}", reason)))?;
        self.analyses
            .cancel(&analysis.id, last_transition(analysis)?)
            .await?;

        info!(analysis_id = %analysis.id, reason, "Analysis transitioned to Cancelled");
        Ok(())
    }

    // ── Codebase ─────────────────────────────────────────────────────

    /// Move a codebase to `analyzing`.
    ///
    /// The store decides atomically; while another run holds the codebase
    /// this fails with [`OrchestratorError::CodebaseBusy`].
    pub async fn claim_codebase(&self, codebase: &mut Codebase) -> Result<(), OrchestratorError> {
        let from = codebase.status;
        if from == CodebaseStatus::Analyzing || !self.codebases.claim(&codebase.id).await? {
            return Err(OrchestratorError::CodebaseBusy(codebase.id));
        }
        codebase.transition(CodebaseStatus::Analyzing)?;

        info!(codebase_id = %codebase.id, %from, to = %CodebaseStatus::Analyzing, "Codebase claimed");
        Ok(())
    }

    /// Hand a codebase back after a run, whatever its outcome.
    pub async fn release_codebase(&self, codebase: &mut Codebase) -> Result<(), OrchestratorError> {
        self.set_codebase_status(codebase, CodebaseStatus::Ready)
            .await
    }

    async fn set_codebase_status(
        &self,
        codebase: &mut Codebase,
        target: CodebaseStatus,
    ) -> Result<(), OrchestratorError> {
        let from = codebase.status;
        codebase.transition(target)?;
        self.codebases.update_status(&codebase.id, target).await?;

        info!(codebase_id = %codebase.id, %from, to = %target, "Codebase status changed");
        Ok(())
    }

    // ── Repository ───────────────────────────────────────────────────

    pub async fn mark_repository(
        &self,
        repository: &mut Repository,
        target: RepositoryStatus,
    ) -> Result<(), OrchestratorError> {
        let from = repository.status;
        repository.transition(target)?;
        self.repositories
            .update_status(&repository.id, target)
            .await?;

        debug!(repository_id = %repository.id, %from, to = %target, "Repository status changed");
        Ok(())
    }
}

fn last_transition(analysis: &Analysis) -> Result<&AnalysisTransition, StoreError> {
    analysis
        .transitions
        .last()
        .ok_or_else(|| StoreError::conflict("Analysis", analysis.id, "missing audit trail entry"))
}
