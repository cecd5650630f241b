//! Orchestration errors

use codescope_core::domain::analysis::{AnalysisId, CodebaseId, StoreError, TransitionError};

/// Errors that end an analysis run
///
/// The `Display` text is what lands in the analysis `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Analysis {0} not found")]
    AnalysisNotFound(AnalysisId),

    #[error("Codebase {0} not found")]
    CodebaseNotFound(CodebaseId),

    #[error("Codebase {0} is already being analyzed")]
    CodebaseBusy(CodebaseId),

    #[error("Analysis {0} is already running")]
    AlreadyRunning(AnalysisId),

    #[error("No repositories to analyze for codebase {0}")]
    NoTargets(CodebaseId),

    #[error("All {attempted} target repositories failed")]
    AllRepositoriesFailed { attempted: usize },

    #[error("Invalid state transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
}
