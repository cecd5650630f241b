//! Application setup and wiring

use std::sync::Arc;

use anyhow::Context;
use codescope_core::Config;
use codescope_core::infrastructure::persistence::{
    PostgresAnalysisStore, PostgresCodebaseStore, PostgresFindingStore, PostgresRepositoryStore,
    postgres,
};
use codescope_llm::{
    AiAnalysisCoordinator, CoordinatorConfig, OpenAiCompatibleReviewer, RetryPolicy,
    RetryingReviewer,
};
use codescope_orchestrator::{
    AnalysisDispatcher, AnalysisOrchestrator, GitAcquirerConfig, GitRepositoryAcquirer,
    OrchestratorConfig, RecordStores, TracingProgressSink,
};

/// Everything the commands need, wired against PostgreSQL
pub struct AppHandle {
    pub config: Config,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub dispatcher: AnalysisDispatcher,
}

/// Connect to the database and build the pipeline.
pub async fn create_app(config: Config) -> anyhow::Result<AppHandle> {
    let pool = Arc::new(
        postgres::connect(&config.database)
            .await
            .context("Failed to connect to database")?,
    );
    tracing::info!(
        max_connections = config.database.max_connections,
        "Database connection pool established"
    );

    let stores = RecordStores {
        codebases: Arc::new(PostgresCodebaseStore::new(pool.clone())),
        repositories: Arc::new(PostgresRepositoryStore::new(pool.clone())),
        analyses: Arc::new(PostgresAnalysisStore::new(pool.clone())),
        findings: Arc::new(PostgresFindingStore::new(pool)),
    };

    let reviewer = OpenAiCompatibleReviewer::from_config(&config.reviewer)
        .context("Failed to initialise model reviewer")?;
    let reviewer = RetryingReviewer::new(reviewer, RetryPolicy::from(&config.reviewer.retry));
    tracing::info!(
        model = %config.reviewer.model,
        base_url = %config.reviewer.base_url,
        "Model reviewer configured"
    );

    let coordinator = Arc::new(AiAnalysisCoordinator::new(
        Arc::new(reviewer),
        CoordinatorConfig::from(&config.analysis),
    ));

    let acquirer = GitRepositoryAcquirer::new(GitAcquirerConfig::from(&config.git))
        .context("Failed to prepare checkout directory")?;

    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        stores.clone(),
        Arc::new(acquirer),
        coordinator,
        OrchestratorConfig::from(&config.analysis),
    ));

    let dispatcher = AnalysisDispatcher::new(
        orchestrator.clone(),
        stores.analyses,
        Arc::new(TracingProgressSink),
        config.analysis.max_concurrent_runs,
    );

    Ok(AppHandle {
        config,
        orchestrator,
        dispatcher,
    })
}
