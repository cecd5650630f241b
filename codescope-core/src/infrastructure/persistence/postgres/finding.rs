use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{db_error, parse_token};
use crate::domain::analysis::{
    AnalysisId, CategoryBreakdown, Finding, FindingCategory, FindingId, FindingSeverity,
    IFindingStore, RepositoryId, SeverityBreakdown, StoreError,
};

/// Rows per multi-row INSERT; keeps bind parameters well below the protocol limit.
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, sqlx::FromRow)]
struct FindingRow {
    id: Uuid,
    analysis_id: Uuid,
    repository_id: Uuid,
    title: String,
    description: String,
    severity: String,
    category: String,
    status: String,
    file_path: String,
    line_start: Option<i32>,
    line_end: Option<i32>,
    suggested_fix: Option<String>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl FindingRow {
    fn into_finding(self) -> Result<Finding, StoreError> {
        Ok(Finding {
            id: FindingId::from(self.id),
            analysis_id: AnalysisId::from(self.analysis_id),
            repository_id: RepositoryId::from(self.repository_id),
            severity: parse_token("Finding", self.id, &self.severity)?,
            category: parse_token("Finding", self.id, &self.category)?,
            status: parse_token("Finding", self.id, &self.status)?,
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            line_start: self.line_start.map(|v| v.max(0) as u32),
            line_end: self.line_end.map(|v| v.max(0) as u32),
            suggested_fix: self.suggested_fix,
            tags: self.tags,
            created_at: self.created_at,
        })
    }
}

/// SQLx implementation of the finding store
pub struct PostgresFindingStore {
    pool: Arc<PgPool>,
}

impl PostgresFindingStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// `(token, count)` pairs grouped by `column` for a repository.
    async fn grouped_counts(
        &self,
        column: &'static str,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        sqlx::query_as::<_, (String, i64)>(&format!(
            r#"
            SELECT {column}, COUNT(*)
            FROM findings
            WHERE repository_id = $1 AND ($2::uuid IS NULL OR analysis_id = $2)
            GROUP BY {column}
            "#
        ))
        .bind(repository_id.as_uuid())
        .bind(analysis_id.map(|id| id.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("counting findings"))
    }
}

#[async_trait]
impl IFindingStore for PostgresFindingStore {
    #[instrument(skip(self, findings), fields(count = findings.len()))]
    async fn create_batch(&self, findings: &[Finding]) -> Result<(), StoreError> {
        if findings.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("opening finding transaction"))?;

        for chunk in findings.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO findings (id, analysis_id, repository_id, title, description, \
                 severity, category, status, file_path, line_start, line_end, suggested_fix, \
                 tags, created_at) ",
            );
            builder.push_values(chunk, |mut row, finding| {
                row.push_bind(finding.id.as_uuid())
                    .push_bind(finding.analysis_id.as_uuid())
                    .push_bind(finding.repository_id.as_uuid())
                    .push_bind(finding.title.clone())
                    .push_bind(finding.description.clone())
                    .push_bind(finding.severity.as_str())
                    .push_bind(finding.category.as_str())
                    .push_bind(finding.status.as_str())
                    .push_bind(finding.file_path.clone())
                    .push_bind(finding.line_start.map(|v| v as i32))
                    .push_bind(finding.line_end.map(|v| v as i32))
                    .push_bind(finding.suggested_fix.clone())
                    .push_bind(finding.tags.clone())
                    .push_bind(finding.created_at);
            });

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error("inserting findings"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("committing findings"))?;

        debug!("Persisted {} findings", findings.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_analysis(&self, analysis_id: &AnalysisId) -> Result<Vec<Finding>, StoreError> {
        let rows = sqlx::query_as::<_, FindingRow>(
            r#"
            SELECT id, analysis_id, repository_id, title, description, severity, category,
                   status, file_path, line_start, line_end, suggested_fix, tags, created_at
            FROM findings
            WHERE analysis_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(analysis_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("listing findings"))?;

        rows.into_iter().map(FindingRow::into_finding).collect()
    }

    #[instrument(skip(self))]
    async fn count_by_analysis(&self, analysis_id: &AnalysisId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM findings WHERE analysis_id = $1")
            .bind(analysis_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(db_error("counting findings"))?;

        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self))]
    async fn count_by_severity(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<SeverityBreakdown, StoreError> {
        let mut counts = SeverityBreakdown::default();
        for (token, count) in self
            .grouped_counts("severity", repository_id, analysis_id)
            .await?
        {
            let severity: FindingSeverity = parse_token("Finding", repository_id, &token)?;
            counts.add(severity, count.max(0) as u32);
        }
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn count_by_category(
        &self,
        repository_id: &RepositoryId,
        analysis_id: Option<&AnalysisId>,
    ) -> Result<CategoryBreakdown, StoreError> {
        let mut counts = CategoryBreakdown::default();
        for (token, count) in self
            .grouped_counts("category", repository_id, analysis_id)
            .await?
        {
            let category: FindingCategory = parse_token("Finding", repository_id, &token)?;
            counts.add(category, count.max(0) as u32);
        }
        Ok(counts)
    }
}
