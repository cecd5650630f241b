//! In-memory record stores
//!
//! Used by tests and single-process runs. Each store is a `RwLock` over a collection;
//! conditional updates check the current status under the write lock so they
//! behave like the SQL `UPDATE ... WHERE status = ...` of the PostgreSQL stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::analysis::{
    Analysis, AnalysisId, AnalysisResults, AnalysisStatus, AnalysisSummary, AnalysisTransition,
    CategoryBreakdown, Codebase, CodebaseId, CodebaseMetadata, CodebaseStatus, Finding,
    IAnalysisRecordStore, ICodebaseRecordStore, IFindingStore, IRepositoryRecordStore,
    Repository, RepositoryId, RepositoryMetadata, RepositoryStatus, SeverityBreakdown, StoreError,
};

/// In-memory codebase store
#[derive(Default)]
pub struct InMemoryCodebaseStore {
    codebases: RwLock<HashMap<CodebaseId, Codebase>>,
}

impl InMemoryCodebaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ICodebaseRecordStore for InMemoryCodebaseStore {
    async fn create(&self, codebase: &Codebase) -> Result<(), StoreError> {
        self.codebases
            .write()
            .await
            .insert(codebase.id, codebase.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &CodebaseId) -> Result<Option<Codebase>, StoreError> {
        Ok(self.codebases.read().await.get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &CodebaseId,
        status: CodebaseStatus,
    ) -> Result<(), StoreError> {
        let mut codebases = self.codebases.write().await;
        let codebase = codebases
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Codebase", id))?;
        codebase.status = status;
        codebase.updated_at = Utc::now();
        Ok(())
    }

    async fn claim(&self, id: &CodebaseId) -> Result<bool, StoreError> {
        let mut codebases = self.codebases.write().await;
        let codebase = codebases
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Codebase", id))?;
        if codebase.status == CodebaseStatus::Analyzing {
            return Ok(false);
        }
        codebase.status = CodebaseStatus::Analyzing;
        codebase.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_metadata(
        &self,
        id: &CodebaseId,
        metadata: &CodebaseMetadata,
    ) -> Result<(), StoreError> {
        let mut codebases = self.codebases.write().await;
        let codebase = codebases
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Codebase", id))?;
        codebase.metadata = metadata.clone();
        codebase.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory repository store; rows are kept in insertion order
#[derive(Default)]
pub struct InMemoryRepositoryStore {
    repositories: RwLock<Vec<Repository>>,
}

impl InMemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IRepositoryRecordStore for InMemoryRepositoryStore {
    async fn create(&self, repository: &Repository) -> Result<(), StoreError> {
        let mut repositories = self.repositories.write().await;
        repositories.retain(|r| r.id != repository.id);
        repositories.push(repository.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError> {
        Ok(self
            .repositories
            .read()
            .await
            .iter()
            .find(|r| r.id == *id)
            .cloned())
    }

    async fn find_by_codebase(
        &self,
        codebase_id: &CodebaseId,
    ) -> Result<Vec<Repository>, StoreError> {
        Ok(self
            .repositories
            .read()
            .await
            .iter()
            .filter(|r| r.codebase_id == *codebase_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &RepositoryId,
        status: RepositoryStatus,
    ) -> Result<(), StoreError> {
        let mut repositories = self.repositories.write().await;
        let repository = repositories
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| StoreError::not_found("Repository", id))?;
        repository.status = status;
        repository.updated_at = Utc::now();
        Ok(())
    }

    async fn update_metadata(
        &self,
        id: &RepositoryId,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError> {
        let mut repositories = self.repositories.write().await;
        let repository = repositories
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or_else(|| StoreError::not_found("Repository", id))?;
        repository.metadata = metadata.clone();
        repository.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory analysis store; rows are kept in insertion order
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    analyses: RwLock<Vec<Analysis>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `transition` to the row when its status is one of `expected`.
    async fn apply(
        &self,
        id: &AnalysisId,
        expected: &[AnalysisStatus],
        transition: &AnalysisTransition,
        update: impl FnOnce(&mut Analysis),
    ) -> Result<(), StoreError> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| StoreError::not_found("Analysis", id))?;

        if !expected.contains(&analysis.status) {
            return Err(StoreError::conflict(
                "Analysis",
                id,
                format!("cannot move from {} to {}", analysis.status, transition.to),
            ));
        }

        match transition.to {
            AnalysisStatus::Running => analysis.started_at = Some(transition.at),
            AnalysisStatus::Queued => {}
            _ => analysis.completed_at = Some(transition.at),
        }
        analysis.status = transition.to;
        analysis.transitions.push(transition.clone());
        update(analysis);
        Ok(())
    }
}

#[async_trait]
impl IAnalysisRecordStore for InMemoryAnalysisStore {
    async fn create(&self, analysis: &Analysis) -> Result<(), StoreError> {
        let mut analyses = self.analyses.write().await;
        analyses.retain(|a| a.id != analysis.id);
        analyses.push(analysis.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AnalysisId) -> Result<Option<Analysis>, StoreError> {
        Ok(self
            .analyses
            .read()
            .await
            .iter()
            .find(|a| a.id == *id)
            .cloned())
    }

    async fn find_queued(&self, limit: usize) -> Result<Vec<Analysis>, StoreError> {
        Ok(self
            .analyses
            .read()
            .await
            .iter()
            .filter(|a| a.status == AnalysisStatus::Queued)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_running(
        &self,
        codebase_id: Option<&CodebaseId>,
    ) -> Result<Vec<Analysis>, StoreError> {
        Ok(self
            .analyses
            .read()
            .await
            .iter()
            .filter(|a| a.status == AnalysisStatus::Running)
            .filter(|a| codebase_id.is_none_or(|id| a.codebase_id == *id))
            .cloned()
            .collect())
    }

    async fn start(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        self.apply(id, &[AnalysisStatus::Queued], transition, |_| {})
            .await
    }

    async fn complete(
        &self,
        id: &AnalysisId,
        results: &AnalysisResults,
        summary: &AnalysisSummary,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        self.apply(id, &[AnalysisStatus::Running], transition, |analysis| {
            analysis.results = Some(results.clone());
            analysis.summary = Some(summary.clone());
        })
        .await
    }

    async fn fail(
        &self,
        id: &AnalysisId,
        error_message: &str,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        self.apply(id, &[AnalysisStatus::Running], transition, |analysis| {
            analysis.error_message = Some(error_message.to_string());
        })
        .await
    }

    async fn cancel(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        self.apply(
            id,
            &[AnalysisStatus::Queued, AnalysisStatus::Running],
            transition,
            |_| {},
        )
        .await
    }
}

/// In-memory finding store
#[derive(Default)]
pub struct InMemoryFindingStore {
    findings: RwLock<Vec<Finding>>,
}

impl InMemoryFindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(
        finding: &Finding,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> bool {
        finding.repository_id == *repository_id
            && analysis_id.is_none_or(|id| finding.analysis_id == *id)
    }
}

#[async_trait]
impl IFindingStore for InMemoryFindingStore {
    async fn create_batch(&self, findings: &[Finding]) -> Result<(), StoreError> {
        self.findings.write().await.extend_from_slice(findings);
        Ok(())
    }

    async fn find_by_analysis(&self, analysis_id: &AnalysisId) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .findings
            .read()
            .await
            .iter()
            .filter(|f| f.analysis_id == *analysis_id)
            .cloned()
            .collect())
    }

    async fn count_by_analysis(&self, analysis_id: &AnalysisId) -> Result<u64, StoreError> {
        Ok(self
            .findings
            .read()
            .await
            .iter()
            .filter(|f| f.analysis_id == *analysis_id)
            .count() as u64)
    }

    async fn count_by_severity(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<SeverityBreakdown, StoreError> {
        let mut counts = SeverityBreakdown::default();
        for finding in self.findings.read().await.iter() {
            if Self::matches(finding, repository_id, analysis_id) {
                counts.add(finding.severity, 1);
            }
        }
        Ok(counts)
    }

    async fn count_by_category(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<CategoryBreakdown, StoreError> {
        let mut counts = CategoryBreakdown::default();
        for finding in self.findings.read().await.iter() {
            if Self::matches(finding, repository_id, analysis_id) {
                counts.add(finding.category, 1);
            }
        }
        Ok(counts)
    }
}
