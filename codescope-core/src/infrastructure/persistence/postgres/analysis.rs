use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, parse_token};
use crate::domain::analysis::{
    Analysis, AnalysisId, AnalysisResults, AnalysisRunConfig, AnalysisStatus, AnalysisSummary,
    AnalysisTransition, CodebaseId, IAnalysisRecordStore, StoreError,
};

#[derive(Debug, sqlx::FromRow)]
struct AnalysisRow {
    id: Uuid,
    codebase_id: Uuid,
    analysis_type: String,
    status: String,
    config: Json<AnalysisRunConfig>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    results: Option<Json<AnalysisResults>>,
    summary: Option<Json<AnalysisSummary>>,
    error_message: Option<String>,
    transitions: Json<Vec<AnalysisTransition>>,
}

impl AnalysisRow {
    fn into_analysis(self) -> Result<Analysis, StoreError> {
        Ok(Analysis {
            id: AnalysisId::from(self.id),
            codebase_id: CodebaseId::from(self.codebase_id),
            analysis_type: parse_token("Analysis", self.id, &self.analysis_type)?,
            status: parse_token("Analysis", self.id, &self.status)?,
            config: self.config.0,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            results: self.results.map(|r| r.0),
            summary: self.summary.map(|s| s.0),
            error_message: self.error_message,
            transitions: self.transitions.0,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, codebase_id, analysis_type, status, config, created_at, started_at,
           completed_at, results, summary, error_message, transitions
    FROM analyses
"#;

/// SQLx implementation of the analysis record store
///
/// Status changes are conditional `UPDATE`s, so two workers can never both
/// claim the same queued analysis.
pub struct PostgresAnalysisStore {
    pool: Arc<PgPool>,
}

impl PostgresAnalysisStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Turn a zero-row conditional update into `NotFound` or `Conflict`.
    async fn explain_miss(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM analyses WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(db_error("reading analysis status"))?;

        match status {
            None => Err(StoreError::not_found("Analysis", id)),
            Some(current) => Err(StoreError::conflict(
                "Analysis",
                id,
                format!("cannot move from {} to {}", current, transition.to),
            )),
        }
    }
}

#[async_trait]
impl IAnalysisRecordStore for PostgresAnalysisStore {
    #[instrument(skip(self, analysis), fields(analysis_id = %analysis.id))]
    async fn create(&self, analysis: &Analysis) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO analyses (
                id, codebase_id, analysis_type, status, config, created_at, started_at,
                completed_at, results, summary, error_message, transitions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(analysis.id.as_uuid())
        .bind(analysis.codebase_id.as_uuid())
        .bind(analysis.analysis_type.as_str())
        .bind(analysis.status.as_str())
        .bind(Json(&analysis.config))
        .bind(analysis.created_at)
        .bind(analysis.started_at)
        .bind(analysis.completed_at)
        .bind(analysis.results.as_ref().map(Json))
        .bind(analysis.summary.as_ref().map(Json))
        .bind(analysis.error_message.as_deref())
        .bind(Json(&analysis.transitions))
        .execute(&*self.pool)
        .await
        .map_err(db_error("creating analysis"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &AnalysisId) -> Result<Option<Analysis>, StoreError> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("finding analysis"))?;

        row.map(AnalysisRow::into_analysis).transpose()
    }

    #[instrument(skip(self))]
    async fn find_queued(&self, limit: usize) -> Result<Vec<Analysis>, StoreError> {
        let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = $1 ORDER BY created_at LIMIT $2"
        ))
        .bind(AnalysisStatus::Queued.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("listing queued analyses"))?;

        rows.into_iter().map(AnalysisRow::into_analysis).collect()
    }

    #[instrument(skip(self))]
    async fn find_running(
        &self,
        codebase_id: Option<&CodebaseId>,
    ) -> Result<Vec<Analysis>, StoreError> {
        let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
            "{SELECT_COLUMNS} WHERE status = $1 AND ($2::uuid IS NULL OR codebase_id = $2) ORDER BY created_at"
        ))
        .bind(AnalysisStatus::Running.as_str())
        .bind(codebase_id.map(|id| id.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("listing running analyses"))?;

        rows.into_iter().map(AnalysisRow::into_analysis).collect()
    }

    #[instrument(skip(self, transition))]
    async fn start(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = $2, started_at = $3, transitions = transitions || $4
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(Json(std::slice::from_ref(transition)))
        .execute(&*self.pool)
        .await
        .map_err(db_error("starting analysis"))?;

        if result.rows_affected() == 0 {
            return self.explain_miss(id, transition).await;
        }
        Ok(())
    }

    #[instrument(skip(self, results, summary, transition))]
    async fn complete(
        &self,
        id: &AnalysisId,
        results: &AnalysisResults,
        summary: &AnalysisSummary,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = $2, completed_at = $3, transitions = transitions || $4,
                results = $5, summary = $6
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(Json(std::slice::from_ref(transition)))
        .bind(Json(results))
        .bind(Json(summary))
        .execute(&*self.pool)
        .await
        .map_err(db_error("completing analysis"))?;

        if result.rows_affected() == 0 {
            return self.explain_miss(id, transition).await;
        }
        Ok(())
    }

    #[instrument(skip(self, transition))]
    async fn fail(
        &self,
        id: &AnalysisId,
        error_message: &str,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = $2, completed_at = $3, transitions = transitions || $4,
                error_message = $5
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(Json(std::slice::from_ref(transition)))
        .bind(error_message)
        .execute(&*self.pool)
        .await
        .map_err(db_error("failing analysis"))?;

        if result.rows_affected() == 0 {
            return self.explain_miss(id, transition).await;
        }
        Ok(())
    }

    #[instrument(skip(self, transition))]
    async fn cancel(
        &self,
        id: &AnalysisId,
        transition: &AnalysisTransition,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = $2, completed_at = $3, transitions = transitions || $4
            WHERE id = $1 AND status IN ('queued', 'running')
            "#,
        )
        .bind(id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.at)
        .bind(Json(std::slice::from_ref(transition)))
        .execute(&*self.pool)
        .await
        .map_err(db_error("cancelling analysis"))?;

        if result.rows_affected() == 0 {
            return self.explain_miss(id, transition).await;
        }
        Ok(())
    }
}
