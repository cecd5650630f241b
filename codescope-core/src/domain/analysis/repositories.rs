//! Record store traits
//!
//! The orchestrator only talks to persistence through these interfaces; the
//! in-memory and PostgreSQL adapters live in `infrastructure::persistence`.

use async_trait::async_trait;

use super::entities::{
    Analysis, AnalysisResults, AnalysisSummary, AnalysisTransition, CategoryBreakdown, Codebase,
    CodebaseMetadata, Finding, Repository, RepositoryMetadata, SeverityBreakdown,
};
use super::errors::StoreError;
use super::value_objects::{
    AnalysisId, CodebaseId, CodebaseStatus, RepositoryId, RepositoryStatus,
};

/// Codebase record persistence
#[async_trait]
pub trait ICodebaseRecordStore: Send + Sync {
    async fn create(&self, codebase: &Codebase) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &CodebaseId) -> Result<Option<Codebase>, StoreError>;

    async fn update_status(&self, id: &CodebaseId, status: CodebaseStatus)
    -> Result<(), StoreError>;

    /// Atomically move a codebase to `analyzing` unless it already is.
    ///
    /// Returns `false` when another run holds the codebase.
    async fn claim(&self, id: &CodebaseId) -> Result<bool, StoreError>;

    async fn update_metadata(
        &self,
        id: &CodebaseId,
        metadata: &CodebaseMetadata,
    ) -> Result<(), StoreError>;
}

/// Repository record persistence
#[async_trait]
pub trait IRepositoryRecordStore: Send + Sync {
    async fn create(&self, repository: &Repository) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError>;

    /// All repositories of a codebase, oldest first
    async fn find_by_codebase(&self, codebase_id: &CodebaseId)
    -> Result<Vec<Repository>, StoreError>;

    async fn update_status(
        &self,
        id: &RepositoryId,
        status: RepositoryStatus,
    ) -> Result<(), StoreError>;

    async fn update_metadata(
        &self,
        id: &RepositoryId,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError>;
}

/// Analysis record persistence
///
/// Every mutating call is conditional on the current status: `start` only
/// claims a `queued` row, the terminal calls only touch non-terminal rows.
/// A row in the wrong state yields [`StoreError::Conflict`].
#[async_trait]
pub trait IAnalysisRecordStore: Send + Sync {
    async fn create(&self, analysis: &Analysis) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &AnalysisId) -> Result<Option<Analysis>, StoreError>;

    /// Queued analyses, oldest first
    async fn find_queued(&self, limit: usize) -> Result<Vec<Analysis>, StoreError>;

    /// Running analyses, oldest first, optionally narrowed to one codebase
    async fn find_running(
        &self,
        codebase_id: Option<&CodebaseId>,
    ) -> Result<Vec<Analysis>, StoreError>;

    /// Claim a queued analysis: `queued → running`, stamping `started_at`.
    async fn start(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError>;

    /// `running → completed` with results and summary.
    async fn complete(
        &self,
        id: &AnalysisId,
        results: &AnalysisResults,
        summary: &AnalysisSummary,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError>;

    /// `running → failed` with an error message.
    async fn fail(
        &self,
        id: &AnalysisId,
        error_message: &str,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError>;

    /// `queued | running → cancelled`.
    async fn cancel(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError>;
}

/// Finding persistence and aggregate counts
#[async_trait]
pub trait IFindingStore: Send + Sync {
    /// Insert all findings or none of them
    async fn create_batch(&self, findings: &[Finding]) -> Result<(), StoreError>;

    async fn find_by_analysis(&self, analysis_id: &AnalysisId) -> Result<Vec<Finding>, StoreError>;

    async fn count_by_analysis(&self, analysis_id: &AnalysisId) -> Result<u64, StoreError>;

    /// Severity counts for a repository, optionally narrowed to one analysis
    async fn count_by_severity(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<SeverityBreakdown, StoreError>;

    /// Category counts for a repository, optionally narrowed to one analysis
    async fn count_by_category(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<CategoryBreakdown, StoreError>;
}
