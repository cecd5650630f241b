//! Analysis orchestrator
//!
//! Drives one analysis run end to end: claims the analysis and its codebase,
//! walks the target repositories in order (acquire, scan, review, persist),
//! aggregates the per-repository outcomes and settles every status, whatever
//! the outcome.
//!
//! A run that dies without settling (process crash, aborted task) leaves its
//! analysis `running` and its codebase `analyzing`. Such orphans are failed
//! and their codebases released at startup by [`AnalysisOrchestrator::recover_interrupted`],
//! and lazily whenever a claim finds a codebase held by no live run. Both
//! assume a single worker process per store.
//!
//! ```text
//!  5%  Starting analysis
//! 10%  repository 1 of n ── acquire ─ scan ─ review ─ persist ─ release
//!  ..  repository i of n starts at 10 + 80*i/n
//! 90%  Aggregating results
//! 100% Analysis complete
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use codescope_core::config::AnalysisConfig;
use codescope_core::domain::analysis::{
    Analysis, AnalysisId, AnalysisResults, AnalysisStatus, AnalysisSummary, CategoryBreakdown,
    Codebase, CodebaseId, CodebaseStatus, IAnalysisRecordStore, ICodebaseRecordStore, IFindingStore,
    IRepositoryRecordStore, Repository, RepositoryId, RepositoryReport, RepositoryStatus,
    Scorecard, SeverityBreakdown, SummaryInput, generate_summary,
};
use codescope_llm::AiAnalysisCoordinator;

use super::aggregation::{RepositoryContribution, RunAccumulator, RunTotals};
use super::errors::OrchestratorError;
use super::lifecycle::LifecycleController;
use super::runs::RunRegistry;
use crate::domain::{Checkout, ProgressEvent, ProgressSink, RepositoryAcquirer};

const START_PROGRESS: u8 = 5;
const REPOSITORIES_START: usize = 10;
const REPOSITORIES_SPAN: usize = 80;
const AGGREGATE_PROGRESS: u8 = 90;
const INTERRUPTED_MESSAGE: &str = "Analysis interrupted before completion";

/// The four record stores the orchestrator reads and writes
#[derive(Clone)]
pub struct RecordStores {
    pub codebases: Arc<dyn ICodebaseRecordStore>,
    pub repositories: Arc<dyn IRepositoryRecordStore>,
    pub analyses: Arc<dyn IAnalysisRecordStore>,
    pub findings: Arc<dyn IFindingStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Scanner size limit for repositories without their own
    pub default_max_file_size_bytes: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for OrchestratorConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            default_max_file_size_bytes: config.default_max_file_size_bytes,
        }
    }
}

/// How the target loop ended
enum Execution {
    Completed {
        results: AnalysisResults,
        summary: AnalysisSummary,
        totals: RunTotals,
    },
    Cancelled,
}

/// How one repository ended
enum RepositoryOutcome {
    Analyzed(Box<RepositoryContribution>),
    Failed { repository_id: RepositoryId, error: String },
    Cancelled,
}

/// Emits progress for one run, never letting the percentage go backwards.
struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    analysis_id: AnalysisId,
    high_water: u8,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: &'a dyn ProgressSink, analysis_id: AnalysisId) -> Self {
        Self {
            sink,
            analysis_id,
            high_water: 0,
        }
    }

    async fn report(
        &mut self,
        status: AnalysisStatus,
        progress: u8,
        current_step: &str,
        message: impl Into<String>,
    ) {
        self.high_water = progress.min(100).max(self.high_water);
        self.sink
            .emit(ProgressEvent {
                analysis_id: self.analysis_id,
                status,
                progress: self.high_water,
                current_step: current_step.to_string(),
                message: message.into(),
                at: Utc::now(),
            })
            .await;
    }

    async fn running(&mut self, progress: u8, current_step: &str, message: impl Into<String>) {
        self.report(AnalysisStatus::Running, progress, current_step, message)
            .await;
    }

    /// Terminal event at the last reported percentage
    async fn finish(&mut self, status: AnalysisStatus, message: impl Into<String>) {
        let step = status.to_string();
        self.report(status, self.high_water, &step, message).await;
    }
}

/// Drives analysis runs
pub struct AnalysisOrchestrator {
    stores: RecordStores,
    acquirer: Arc<dyn RepositoryAcquirer>,
    coordinator: Arc<AiAnalysisCoordinator>,
    lifecycle: LifecycleController,
    config: OrchestratorConfig,
    runs: RunRegistry,
    /// Serialises codebase claims against orphan recovery
    claim_gate: Mutex<()>,
}

impl AnalysisOrchestrator {
    pub fn new(
        stores: RecordStores,
        acquirer: Arc<dyn RepositoryAcquirer>,
        coordinator: Arc<AiAnalysisCoordinator>,
        config: OrchestratorConfig,
    ) -> Self {
        let lifecycle = LifecycleController::new(
            stores.codebases.clone(),
            stores.repositories.clone(),
            stores.analyses.clone(),
        );

        Self {
            stores,
            acquirer,
            coordinator,
            lifecycle,
            config,
            runs: RunRegistry::default(),
            claim_gate: Mutex::new(()),
        }
    }

    /// Run one queued analysis to a terminal state.
    ///
    /// Returns the terminal status (`completed` or `cancelled`). Any error
    /// has already been recorded on the analysis as `failed`, unless the
    /// analysis could not be claimed in the first place. A second call for
    /// an analysis this process is already running fails with
    /// [`OrchestratorError::AlreadyRunning`] and leaves the first run alone.
    #[instrument(skip(self, progress), fields(analysis_id = %analysis_id))]
    pub async fn run_analysis(
        &self,
        analysis_id: AnalysisId,
        progress: &dyn ProgressSink,
    ) -> Result<AnalysisStatus, OrchestratorError> {
        let cancel = CancellationToken::new();
        let _registration = self.runs.register(analysis_id, cancel.clone())?;

        self.drive(analysis_id, progress, &cancel).await
    }

    /// Request cancellation of an analysis.
    ///
    /// A run in this process is stopped cooperatively between repositories
    /// and batches; anything else is cancelled directly in the store, which
    /// only succeeds for non-terminal analyses.
    pub async fn cancel_analysis(&self, analysis_id: AnalysisId) -> Result<(), OrchestratorError> {
        if let Some(token) = self.runs.cancel_token(&analysis_id) {
            token.cancel();
            info!(analysis_id = %analysis_id, "Cancellation requested for running analysis");
            return Ok(());
        }

        let mut analysis = self
            .stores
            .analyses
            .find_by_id(&analysis_id)
            .await?
            .ok_or(OrchestratorError::AnalysisNotFound(analysis_id))?;
        self.lifecycle
            .cancel_analysis(&mut analysis, "cancellation requested before execution")
            .await
    }

    /// Whether this orchestrator is currently running `analysis_id`
    pub fn is_running(&self, analysis_id: &AnalysisId) -> bool {
        self.runs.contains(analysis_id)
    }

    /// Fail analyses left `running` by a previous process and release
    /// the codebases they held.
    ///
    /// Returns how many analyses were failed.
    pub async fn recover_interrupted(&self) -> Result<usize, OrchestratorError> {
        let _gate = self.claim_gate.lock().await;

        let orphans = self.orphaned_runs(None).await?;
        let recovered = orphans.len();
        let codebases: BTreeSet<CodebaseId> = orphans.iter().map(|a| a.codebase_id).collect();
        for mut orphan in orphans {
            self.fail_orphan(&mut orphan).await;
        }

        for codebase_id in codebases {
            if self.runs.holds(&codebase_id) {
                continue;
            }
            if let Some(mut codebase) = self.stores.codebases.find_by_id(&codebase_id).await? {
                self.restore_codebase(&mut codebase).await;
            }
        }

        if recovered > 0 {
            warn!(recovered, "Failed analyses interrupted by a previous run");
        }
        Ok(recovered)
    }

    async fn drive(
        &self,
        analysis_id: AnalysisId,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<AnalysisStatus, OrchestratorError> {
        let mut analysis = self
            .stores
            .analyses
            .find_by_id(&analysis_id)
            .await?
            .ok_or(OrchestratorError::AnalysisNotFound(analysis_id))?;

        // Not ours until this succeeds; nothing to roll back on failure.
        self.lifecycle.start_analysis(&mut analysis).await?;
        let mut reporter = ProgressReporter::new(sink, analysis_id);

        let mut codebase = match self.claim_codebase(&analysis).await {
            Ok(codebase) => codebase,
            Err(e) => {
                self.abort(&mut analysis, None, &mut reporter, &e).await;
                return Err(e);
            }
        };
        reporter
            .running(START_PROGRESS, "start", "Starting analysis")
            .await;

        let execution = self
            .execute(&analysis, &codebase, &mut reporter, cancel)
            .await;

        match execution {
            Ok(Execution::Completed {
                results,
                summary,
                totals,
            }) => {
                let findings = results.findings_count;
                match self
                    .finish(&mut analysis, &mut codebase, results, summary, totals)
                    .await
                {
                    Ok(()) => {
                        reporter
                            .report(AnalysisStatus::Completed, 100, "complete", "Analysis complete")
                            .await;
                        info!(analysis_id = %analysis_id, findings, "Analysis completed");
                        Ok(AnalysisStatus::Completed)
                    }
                    Err(e) => {
                        self.abort(&mut analysis, Some(&mut codebase), &mut reporter, &e)
                            .await;
                        Err(e)
                    }
                }
            }
            Ok(Execution::Cancelled) => {
                self.wind_down_cancelled(&mut analysis, &mut codebase, &mut reporter)
                    .await;
                Ok(AnalysisStatus::Cancelled)
            }
            Err(e) => {
                self.abort(&mut analysis, Some(&mut codebase), &mut reporter, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn claim_codebase(&self, analysis: &Analysis) -> Result<Codebase, OrchestratorError> {
        let _gate = self.claim_gate.lock().await;

        let mut codebase = self
            .stores
            .codebases
            .find_by_id(&analysis.codebase_id)
            .await?
            .ok_or(OrchestratorError::CodebaseNotFound(analysis.codebase_id))?;

        if let Err(e) = self.lifecycle.claim_codebase(&mut codebase).await {
            if !matches!(e, OrchestratorError::CodebaseBusy(_))
                || !self.recover_codebase(&mut codebase).await?
            {
                return Err(e);
            }
            self.lifecycle.claim_codebase(&mut codebase).await?;
        }

        self.runs.mark_holder(&analysis.id, codebase.id);
        Ok(codebase)
    }

    /// Free a codebase held by no live run.
    ///
    /// Returns `false` when a run in this process really holds it.
    async fn recover_codebase(&self, codebase: &mut Codebase) -> Result<bool, OrchestratorError> {
        if self.runs.holds(&codebase.id) {
            return Ok(false);
        }

        for mut orphan in self.orphaned_runs(Some(&codebase.id)).await? {
            self.fail_orphan(&mut orphan).await;
        }

        *codebase = self
            .stores
            .codebases
            .find_by_id(&codebase.id)
            .await?
            .ok_or(OrchestratorError::CodebaseNotFound(codebase.id))?;
        if codebase.status == CodebaseStatus::Analyzing {
            warn!(codebase_id = %codebase.id, "Releasing codebase left analyzing by an interrupted run");
            self.lifecycle.release_codebase(codebase).await?;
        }
        Ok(true)
    }

    /// Analyses the store shows as running that no run in this process owns
    async fn orphaned_runs(
        &self,
        codebase_id: Option<&CodebaseId>,
    ) -> Result<Vec<Analysis>, OrchestratorError> {
        let running = self.stores.analyses.find_running(codebase_id).await?;
        Ok(running
            .into_iter()
            .filter(|analysis| !self.runs.contains(&analysis.id))
            .collect())
    }

    async fn fail_orphan(&self, orphan: &mut Analysis) {
        if let Err(e) = self.lifecycle.fail_analysis(orphan, INTERRUPTED_MESSAGE).await {
            warn!(analysis_id = %orphan.id, error = %e, "Failed to record interrupted analysis");
        }
    }

    async fn execute(
        &self,
        analysis: &Analysis,
        codebase: &Codebase,
        reporter: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<Execution, OrchestratorError> {
        let targets = self.resolve_targets(analysis).await?;
        let total = targets.len();
        info!(codebase_id = %codebase.id, repositories = total, "Resolved target repositories");

        let mut accumulator = RunAccumulator::new();
        for (index, repository) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(Execution::Cancelled);
            }

            let checkpoint = repository_checkpoint(index, total);
            let outcome = self
                .process_repository(analysis, codebase, repository, checkpoint, reporter, cancel)
                .await?;

            match outcome {
                RepositoryOutcome::Analyzed(contribution) => {
                    accumulator.record_success(*contribution)
                }
                RepositoryOutcome::Failed {
                    repository_id,
                    error,
                } => accumulator.record_failure(repository_id, error),
                RepositoryOutcome::Cancelled => return Ok(Execution::Cancelled),
            }
        }

        if cancel.is_cancelled() {
            return Ok(Execution::Cancelled);
        }

        reporter
            .running(AGGREGATE_PROGRESS, "aggregate", "Aggregating results")
            .await;
        let (results, totals) = accumulator.finish()?;
        let summary = generate_summary(&SummaryInput {
            total_findings: results.findings_count,
            by_severity: &results.findings_by_severity,
            by_category: &results.findings_by_category,
            scores: Scorecard {
                security: results.security_score,
                maintainability: results.maintainability_score,
                tech_debt: results.tech_debt_score,
            },
        });

        Ok(Execution::Completed {
            results,
            summary,
            totals,
        })
    }

    /// Explicit targets narrowed to the codebase's repositories, or all of them.
    async fn resolve_targets(&self, analysis: &Analysis) -> Result<Vec<Repository>, OrchestratorError> {
        let repositories = self
            .stores
            .repositories
            .find_by_codebase(&analysis.codebase_id)
            .await?;
        let requested = &analysis.config.target_repositories;

        let targets: Vec<Repository> = if requested.is_empty() {
            repositories
        } else {
            repositories
                .into_iter()
                .filter(|r| requested.contains(&r.id))
                .collect()
        };

        if targets.is_empty() {
            return Err(OrchestratorError::NoTargets(analysis.codebase_id));
        }
        Ok(targets)
    }

    /// Acquire, analyse and release one repository.
    ///
    /// Acquisition and scan errors are absorbed into
    /// [`RepositoryOutcome::Failed`]; store errors end the run.
    async fn process_repository(
        &self,
        analysis: &Analysis,
        codebase: &Codebase,
        mut repository: Repository,
        checkpoint: u8,
        reporter: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<RepositoryOutcome, OrchestratorError> {
        self.lifecycle
            .mark_repository(&mut repository, RepositoryStatus::Cloning)
            .await?;
        reporter
            .running(
                checkpoint,
                "acquire",
                format!("Acquiring repository {}", repository.name),
            )
            .await;

        let checkout = match self.acquirer.acquire(&repository).await {
            Ok(checkout) => checkout,
            Err(e) => {
                warn!(
                    repository_id = %repository.id,
                    error = %e,
                    "Repository acquisition failed, skipping repository"
                );
                return self.mark_failed(&mut repository, e.to_string()).await;
            }
        };

        let outcome = self
            .analyze_checkout(
                analysis,
                codebase,
                &mut repository,
                &checkout,
                checkpoint,
                reporter,
                cancel,
            )
            .await;
        self.acquirer.release(checkout).await;
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn analyze_checkout(
        &self,
        analysis: &Analysis,
        codebase: &Codebase,
        repository: &mut Repository,
        checkout: &Checkout,
        checkpoint: u8,
        reporter: &mut ProgressReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<RepositoryOutcome, OrchestratorError> {
        repository.metadata.last_commit = checkout.commit_hash.clone();
        repository.metadata.last_commit_date = checkout.commit_date;
        self.lifecycle
            .mark_repository(repository, RepositoryStatus::Ready)
            .await?;
        self.stores
            .repositories
            .update_metadata(&repository.id, &repository.metadata)
            .await?;

        reporter
            .running(
                checkpoint,
                "scan",
                format!("Scanning repository {}", repository.name),
            )
            .await;
        let max_file_size = repository
            .max_file_size_bytes
            .unwrap_or(self.config.default_max_file_size_bytes);
        let scan = match self
            .acquirer
            .scan(
                checkout.path(),
                max_file_size,
                &codebase.settings.exclude_patterns,
            )
            .await
        {
            Ok(scan) => scan,
            Err(e) => {
                warn!(
                    repository_id = %repository.id,
                    error = %e,
                    "Repository scan failed, skipping repository"
                );
                return self.mark_failed(repository, e.to_string()).await;
            }
        };

        repository.metadata.total_files = scan.total_files;
        repository.metadata.total_lines = scan.total_lines;
        repository.metadata.language_histogram = scan.languages_by_line_count.clone();
        self.stores
            .repositories
            .update_metadata(&repository.id, &repository.metadata)
            .await?;

        if cancel.is_cancelled() {
            return Ok(RepositoryOutcome::Cancelled);
        }
        reporter
            .running(
                checkpoint,
                "review",
                format!(
                    "Reviewing {} files in {}",
                    scan.total_files, repository.name
                ),
            )
            .await;

        let outcome = self
            .coordinator
            .analyze_code(
                &scan.files,
                analysis.analysis_type,
                repository.id,
                analysis.id,
                cancel,
            )
            .await;
        if cancel.is_cancelled() {
            return Ok(RepositoryOutcome::Cancelled);
        }
        if outcome.reviewer_unavailable() {
            warn!(
                repository_id = %repository.id,
                batches = outcome.batches,
                "Every reviewer batch failed, skipping repository"
            );
            let error = format!("All {} reviewer batches failed", outcome.batches);
            return self.mark_failed(repository, error).await;
        }

        if !outcome.findings.is_empty() {
            self.stores.findings.create_batch(&outcome.findings).await?;
        }

        let mut by_severity = SeverityBreakdown::default();
        let mut by_category = CategoryBreakdown::default();
        for finding in &outcome.findings {
            by_severity.add(finding.severity, 1);
            by_category.add(finding.category, 1);
        }

        info!(
            repository_id = %repository.id,
            files = outcome.files_analyzed,
            findings = outcome.findings.len(),
            failed_batches = outcome.failed_batches,
            "Repository analysed"
        );

        Ok(RepositoryOutcome::Analyzed(Box::new(RepositoryContribution {
            report: RepositoryReport {
                repository_id: repository.id,
                files_analyzed: outcome.files_analyzed,
                findings_count: outcome.findings.len() as u32,
                failed_batches: outcome.failed_batches as u32,
                scores: outcome.scores,
                summary: outcome.summary,
            },
            total_lines: scan.total_lines,
            language_lines: scan.languages_by_line_count,
            by_severity,
            by_category,
        })))
    }

    async fn mark_failed(
        &self,
        repository: &mut Repository,
        error: String,
    ) -> Result<RepositoryOutcome, OrchestratorError> {
        self.lifecycle
            .mark_repository(repository, RepositoryStatus::Error)
            .await?;
        Ok(RepositoryOutcome::Failed {
            repository_id: repository.id,
            error,
        })
    }

    /// Persist the completed analysis, then hand the codebase back.
    async fn finish(
        &self,
        analysis: &mut Analysis,
        codebase: &mut Codebase,
        results: AnalysisResults,
        summary: AnalysisSummary,
        totals: RunTotals,
    ) -> Result<(), OrchestratorError> {
        self.lifecycle
            .complete_analysis(analysis, results, summary)
            .await?;

        codebase.metadata.total_files = totals.total_files;
        codebase.metadata.total_lines = totals.total_lines;
        codebase.metadata.language_histogram = totals.language_lines;
        codebase.metadata.last_analysis_at = analysis.completed_at.or_else(|| Some(Utc::now()));
        self.stores
            .codebases
            .update_metadata(&codebase.id, &codebase.metadata)
            .await?;

        self.lifecycle.release_codebase(codebase).await
    }

    /// Record a fatal error: analysis `failed`, codebase back to `ready`.
    async fn abort(
        &self,
        analysis: &mut Analysis,
        codebase: Option<&mut Codebase>,
        reporter: &mut ProgressReporter<'_>,
        cause: &OrchestratorError,
    ) {
        let message = cause.to_string();
        error!(analysis_id = %analysis.id, error = %message, "Analysis failed");

        if let Err(e) = self.lifecycle.fail_analysis(analysis, &message).await {
            error!(analysis_id = %analysis.id, error = %e, "Failed to record analysis failure");
        }
        if let Some(codebase) = codebase {
            self.restore_codebase(codebase).await;
        }
        reporter.finish(AnalysisStatus::Failed, message).await;
    }

    async fn wind_down_cancelled(
        &self,
        analysis: &mut Analysis,
        codebase: &mut Codebase,
        reporter: &mut ProgressReporter<'_>,
    ) {
        if let Err(e) = self
            .lifecycle
            .cancel_analysis(analysis, "cancellation requested")
            .await
        {
            error!(analysis_id = %analysis.id, error = %e, "Failed to record analysis cancellation");
        }
        self.restore_codebase(codebase).await;
        reporter
            .finish(AnalysisStatus::Cancelled, "Analysis cancelled")
            .await;
    }

    async fn restore_codebase(&self, codebase: &mut Codebase) {
        if codebase.status != CodebaseStatus::Analyzing {
            return;
        }
        if let Err(e) = self.lifecycle.release_codebase(codebase).await {
            error!(codebase_id = %codebase.id, error = %e, "Failed to restore codebase status");
        }
    }
}

/// Starting percentage of repository `index` out of `total`
fn repository_checkpoint(index: usize, total: usize) -> u8 {
    (REPOSITORIES_START + REPOSITORIES_SPAN * index / total.max(1)) as u8
}
