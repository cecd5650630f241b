use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, parse_token};
use crate::domain::analysis::{
    Codebase, CodebaseId, CodebaseMetadata, CodebaseSettings, CodebaseStatus,
    ICodebaseRecordStore, StoreError,
};

#[derive(Debug, sqlx::FromRow)]
struct CodebaseRow {
    id: Uuid,
    name: String,
    status: String,
    metadata: Json<CodebaseMetadata>,
    settings: Json<CodebaseSettings>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CodebaseRow {
    fn into_codebase(self) -> Result<Codebase, StoreError> {
        Ok(Codebase {
            id: CodebaseId::from(self.id),
            status: parse_token("Codebase", self.id, &self.status)?,
            name: self.name,
            metadata: self.metadata.0,
            settings: self.settings.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SQLx implementation of the codebase record store
pub struct PostgresCodebaseStore {
    pool: Arc<PgPool>,
}

impl PostgresCodebaseStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ICodebaseRecordStore for PostgresCodebaseStore {
    #[instrument(skip(self, codebase), fields(codebase_id = %codebase.id))]
    async fn create(&self, codebase: &Codebase) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO codebases (id, name, status, metadata, settings, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(codebase.id.as_uuid())
        .bind(&codebase.name)
        .bind(codebase.status.as_str())
        .bind(Json(&codebase.metadata))
        .bind(Json(&codebase.settings))
        .bind(codebase.created_at)
        .bind(codebase.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(db_error("creating codebase"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &CodebaseId) -> Result<Option<Codebase>, StoreError> {
        let row = sqlx::query_as::<_, CodebaseRow>(
            r#"
            SELECT id, name, status, metadata, settings, created_at, updated_at
            FROM codebases
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error("finding codebase"))?;

        row.map(CodebaseRow::into_codebase).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: &CodebaseId,
        status: CodebaseStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE codebases SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(db_error("updating codebase status"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Codebase", id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn claim(&self, id: &CodebaseId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE codebases
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status <> $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(CodebaseStatus::Analyzing.as_str())
        .execute(&*self.pool)
        .await
        .map_err(db_error("claiming codebase"))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM codebases WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("reading codebase"))?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::not_found("Codebase", id)),
        }
    }

    #[instrument(skip(self, metadata))]
    async fn update_metadata(
        &self,
        id: &CodebaseId,
        metadata: &CodebaseMetadata,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE codebases SET metadata = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Json(metadata))
        .execute(&*self.pool)
        .await
        .map_err(db_error("updating codebase metadata"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Codebase", id));
        }
        Ok(())
    }
}
