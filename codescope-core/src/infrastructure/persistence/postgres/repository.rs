use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, parse_token};
use crate::domain::analysis::{
    CodebaseId, IRepositoryRecordStore, Repository, RepositoryId, RepositoryMetadata,
    RepositoryStatus, StoreError,
};

#[derive(Debug, sqlx::FromRow)]
struct RepositoryRow {
    id: Uuid,
    codebase_id: Uuid,
    name: String,
    provider: String,
    remote_url: String,
    branch: String,
    status: String,
    max_file_size_bytes: Option<i64>,
    metadata: Json<RepositoryMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RepositoryRow {
    fn into_repository(self) -> Result<Repository, StoreError> {
        Ok(Repository {
            id: RepositoryId::from(self.id),
            codebase_id: CodebaseId::from(self.codebase_id),
            provider: parse_token("Repository", self.id, &self.provider)?,
            status: parse_token("Repository", self.id, &self.status)?,
            name: self.name,
            remote_url: self.remote_url,
            branch: self.branch,
            max_file_size_bytes: self.max_file_size_bytes.map(|v| v.max(0) as u64),
            metadata: self.metadata.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, codebase_id, name, provider, remote_url, branch, status,
           max_file_size_bytes, metadata, created_at, updated_at
    FROM repositories
"#;

/// SQLx implementation of the repository record store
pub struct PostgresRepositoryStore {
    pool: Arc<PgPool>,
}

impl PostgresRepositoryStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IRepositoryRecordStore for PostgresRepositoryStore {
    #[instrument(skip(self, repository), fields(repository_id = %repository.id))]
    async fn create(&self, repository: &Repository) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO repositories (
                id, codebase_id, name, provider, remote_url, branch, status,
                max_file_size_bytes, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(repository.id.as_uuid())
        .bind(repository.codebase_id.as_uuid())
        .bind(&repository.name)
        .bind(repository.provider.as_str())
        .bind(&repository.remote_url)
        .bind(&repository.branch)
        .bind(repository.status.as_str())
        .bind(repository.max_file_size_bytes.map(|v| v as i64))
        .bind(Json(&repository.metadata))
        .bind(repository.created_at)
        .bind(repository.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(db_error("creating repository"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &RepositoryId) -> Result<Option<Repository>, StoreError> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("finding repository"))?;

        row.map(RepositoryRow::into_repository).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_codebase(
        &self,
        codebase_id: &CodebaseId,
    ) -> Result<Vec<Repository>, StoreError> {
        let rows = sqlx::query_as::<_, RepositoryRow>(&format!(
            "{SELECT_COLUMNS} WHERE codebase_id = $1 ORDER BY created_at, id"
        ))
        .bind(codebase_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("listing codebase repositories"))?;

        rows.into_iter().map(RepositoryRow::into_repository).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: &RepositoryId,
        status: RepositoryStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE repositories SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(db_error("updating repository status"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Repository", id));
        }
        Ok(())
    }

    #[instrument(skip(self, metadata))]
    async fn update_metadata(
        &self,
        id: &RepositoryId,
        metadata: &RepositoryMetadata,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE repositories SET metadata = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Json(metadata))
        .execute(&*self.pool)
        .await
        .map_err(db_error("updating repository metadata"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Repository", id));
        }
        Ok(())
    }
}
