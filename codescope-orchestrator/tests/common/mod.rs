//! Test doubles and fixtures for orchestrator tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use codescope_core::domain::analysis::{
    Analysis, AnalysisStatus, AnalysisType, Codebase, CodebaseStatus, IAnalysisRecordStore,
    ICodebaseRecordStore, IRepositoryRecordStore, Repository, RepositoryProvider, SourceFile,
};
use codescope_core::infrastructure::persistence::{
    InMemoryAnalysisStore, InMemoryCodebaseStore, InMemoryFindingStore, InMemoryRepositoryStore,
};
use codescope_llm::domain::{ModelReviewer, ReviewerError};
use codescope_llm::{AiAnalysisCoordinator, CoordinatorConfig};
use codescope_orchestrator::{
    AcquisitionError, AnalysisOrchestrator, Checkout, OrchestratorConfig, RecordStores,
    RepositoryAcquirer, ScanResult,
};

/// What the mock acquirer does for one repository
#[derive(Clone)]
pub enum MockRepo {
    Files(Vec<SourceFile>),
    AcquireFails(String),
    ScanFails(String),
}

/// Acquirer serving canned files keyed by repository name
#[derive(Default)]
pub struct MockAcquirer {
    repos: HashMap<String, MockRepo>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl MockAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, name: &str, repo: MockRepo) -> Self {
        self.repos.insert(name.to_string(), repo);
        self
    }

    fn root(name: &str) -> PathBuf {
        PathBuf::from(format!("/mock/{name}"))
    }
}

#[async_trait]
impl RepositoryAcquirer for MockAcquirer {
    async fn acquire(&self, repository: &Repository) -> Result<Checkout, AcquisitionError> {
        match self.repos.get(&repository.name) {
            Some(MockRepo::AcquireFails(message)) => Err(AcquisitionError::Git(message.clone())),
            Some(_) => {
                self.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(Checkout::in_place(
                    Self::root(&repository.name),
                    Some(format!("{}-head", repository.name)),
                    Some(Utc::now()),
                ))
            }
            None => Err(AcquisitionError::MissingPath(repository.name.clone())),
        }
    }

    async fn scan(
        &self,
        root: &Path,
        _max_file_size: u64,
        _exclude_patterns: &[String],
    ) -> Result<ScanResult, AcquisitionError> {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match self.repos.get(name) {
            Some(MockRepo::Files(files)) => Ok(ScanResult::from_files(files.clone())),
            Some(MockRepo::ScanFails(message)) => Err(AcquisitionError::Io(
                std::io::Error::other(message.clone()),
            )),
            _ => Err(AcquisitionError::MissingPath(name.to_string())),
        }
    }

    async fn release(&self, _checkout: Checkout) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reviewer answering batch prompts by the file paths they mention.
///
/// The summary prompt always fails, so summaries come from the template.
#[derive(Default)]
pub struct PathReviewer {
    responses: Vec<(String, String)>,
    failing: Vec<String>,
}

impl PathReviewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, path: &str, response: &str) -> Self {
        self.responses
            .push((format!("### File: {path} "), response.to_string()));
        self
    }

    /// Batches mentioning `path` fail as if the service were down
    pub fn fail(mut self, path: &str) -> Self {
        self.failing.push(format!("### File: {path} "));
        self
    }
}

#[async_trait]
impl ModelReviewer for PathReviewer {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        if prompt.contains("Return ONLY a JSON object") {
            return Err(ReviewerError::ServiceUnavailable("summary offline".into()));
        }
        if self.failing.iter().any(|marker| prompt.contains(marker.as_str())) {
            return Err(ReviewerError::ServiceUnavailable("batch offline".into()));
        }
        Ok(self
            .responses
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| "[]".to_string()))
    }

    fn model(&self) -> &str {
        "path-reviewer"
    }
}

/// Reviewer that signals on its first call and then never answers
#[derive(Default)]
pub struct GatedReviewer {
    pub entered: Notify,
}

#[async_trait]
impl ModelReviewer for GatedReviewer {
    async fn review(&self, _prompt: &str) -> Result<String, ReviewerError> {
        self.entered.notify_one();
        std::future::pending::<()>().await;
        Ok("[]".to_string())
    }

    fn model(&self) -> &str {
        "gated"
    }
}

/// Reviewer that blocks its first call forever and answers `[]` afterwards
#[derive(Default)]
pub struct FirstCallGate {
    pub entered: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelReviewer for FirstCallGate {
    async fn review(&self, _prompt: &str) -> Result<String, ReviewerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            std::future::pending::<()>().await;
        }
        Ok("[]".to_string())
    }

    fn model(&self) -> &str {
        "first-call-gate"
    }
}

/// In-memory stores plus an orchestrator wired to them
pub struct Harness {
    pub codebases: Arc<InMemoryCodebaseStore>,
    pub repositories: Arc<InMemoryRepositoryStore>,
    pub analyses: Arc<InMemoryAnalysisStore>,
    pub findings: Arc<InMemoryFindingStore>,
    pub acquirer: Arc<MockAcquirer>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

impl Harness {
    pub fn new(acquirer: MockAcquirer, reviewer: Arc<dyn ModelReviewer>) -> Self {
        let codebases = Arc::new(InMemoryCodebaseStore::new());
        let repositories = Arc::new(InMemoryRepositoryStore::new());
        let analyses = Arc::new(InMemoryAnalysisStore::new());
        let findings = Arc::new(InMemoryFindingStore::new());
        let acquirer = Arc::new(acquirer);

        let coordinator = Arc::new(AiAnalysisCoordinator::new(
            reviewer,
            CoordinatorConfig::default(),
        ));
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            RecordStores {
                codebases: codebases.clone(),
                repositories: repositories.clone(),
                analyses: analyses.clone(),
                findings: findings.clone(),
            },
            acquirer.clone(),
            coordinator,
            OrchestratorConfig::default(),
        ));

        Self {
            codebases,
            repositories,
            analyses,
            findings,
            acquirer,
            orchestrator,
        }
    }

    pub async fn codebase(&self, name: &str) -> Codebase {
        let codebase = Codebase::new(name);
        self.codebases.create(&codebase).await.unwrap();
        codebase
    }

    pub async fn repository(&self, codebase: &Codebase, name: &str) -> Repository {
        let repository = Repository::new(
            codebase.id,
            name,
            RepositoryProvider::Github,
            format!("https://github.com/acme/{name}.git"),
            "main",
        );
        self.repositories.create(&repository).await.unwrap();
        repository
    }

    pub async fn analysis(&self, codebase: &Codebase) -> Analysis {
        self.queue(Analysis::new(codebase.id, AnalysisType::Full)).await
    }

    pub async fn queue(&self, analysis: Analysis) -> Analysis {
        self.analyses.create(&analysis).await.unwrap();
        analysis
    }

    /// A run that died mid-flight: analysis `running`, codebase `analyzing`
    pub async fn stranded(&self, codebase: &Codebase) -> Analysis {
        let mut analysis = Analysis::new(codebase.id, AnalysisType::Full);
        analysis.status = AnalysisStatus::Running;
        analysis.started_at = Some(Utc::now());
        self.analyses.create(&analysis).await.unwrap();
        self.codebases
            .update_status(&codebase.id, CodebaseStatus::Analyzing)
            .await
            .unwrap();
        analysis
    }

    pub async fn reload_analysis(&self, analysis: &Analysis) -> Analysis {
        self.analyses.find_by_id(&analysis.id).await.unwrap().unwrap()
    }

    pub async fn reload_codebase(&self, codebase: &Codebase) -> Codebase {
        self.codebases.find_by_id(&codebase.id).await.unwrap().unwrap()
    }

    pub async fn reload_repository(&self, repository: &Repository) -> Repository {
        self.repositories
            .find_by_id(&repository.id)
            .await
            .unwrap()
            .unwrap()
    }
}

pub fn ts_file(path: &str) -> SourceFile {
    SourceFile::new(path, "TypeScript", "export function handler() {\n  return 1;\n}\n")
}
