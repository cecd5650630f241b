//! Analysis domain entities

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{
    AnalysisId, AnalysisStatus, AnalysisType, CodebaseId, CodebaseStatus, FindingCategory,
    FindingId, FindingSeverity, FindingStatus, RepositoryId, RepositoryProvider,
    RepositoryStatus, TransitionError,
};

/// Line counts keyed by language name
pub type LanguageLineCounts = BTreeMap<String, u64>;

/// Codebase aggregate root
///
/// A tenant-owned grouping of repositories analysed together. Status and
/// metadata are written by the orchestrator only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codebase {
    pub id: CodebaseId,
    pub name: String,
    pub status: CodebaseStatus,
    pub metadata: CodebaseMetadata,
    pub settings: CodebaseSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Codebase {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CodebaseId::generate(),
            name: name.into(),
            status: CodebaseStatus::Pending,
            metadata: CodebaseMetadata::default(),
            settings: CodebaseSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target` if the state machine allows it.
    pub fn transition(&mut self, target: CodebaseStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                entity: "codebase",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Aggregate facts about a codebase's last ingestion and analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodebaseMetadata {
    pub total_files: u64,
    pub total_lines: u64,
    pub language_histogram: LanguageLineCounts,
    pub last_ingestion_at: Option<DateTime<Utc>>,
    pub last_analysis_at: Option<DateTime<Utc>>,
}

/// How deep a codebase should be analysed by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

/// User-controlled codebase settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodebaseSettings {
    pub auto_analyze: bool,
    pub analysis_depth: AnalysisDepth,
    /// Glob patterns excluded from scanning (e.g. `**/generated/**`)
    pub exclude_patterns: Vec<String>,
}

/// One version-control source within a codebase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: RepositoryId,
    pub codebase_id: CodebaseId,
    pub name: String,
    pub provider: RepositoryProvider,
    /// Remote URL, or a filesystem path for [`RepositoryProvider::Local`]
    pub remote_url: String,
    pub branch: String,
    pub status: RepositoryStatus,
    /// Per-repository override of the scanner's file size limit
    pub max_file_size_bytes: Option<u64>,
    pub metadata: RepositoryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(
        codebase_id: CodebaseId,
        name: impl Into<String>,
        provider: RepositoryProvider,
        remote_url: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RepositoryId::generate(),
            codebase_id,
            name: name.into(),
            provider,
            remote_url: remote_url.into(),
            branch: branch.into(),
            status: RepositoryStatus::Pending,
            max_file_size_bytes: None,
            metadata: RepositoryMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, target: RepositoryStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                entity: "repository",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryMetadata {
    pub total_files: u64,
    pub total_lines: u64,
    pub language_histogram: LanguageLineCounts,
    pub last_commit: Option<String>,
    pub last_commit_date: Option<DateTime<Utc>>,
}

/// Parameters an analysis was requested with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisRunConfig {
    pub depth: AnalysisDepth,
    /// Restrict the run to these repositories; empty means all of the codebase
    pub target_repositories: Vec<RepositoryId>,
    /// Remediation playbooks referenced by the run (not executed here)
    pub playbook_ids: Vec<String>,
}

/// Recorded state transition for an analysis (audit trail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisTransition {
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One execution of the pipeline against a codebase
///
/// `results` and `summary` are only present once `status` is `completed`;
/// `error_message` only once it is `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: AnalysisId,
    pub codebase_id: CodebaseId,
    pub analysis_type: AnalysisType,
    pub status: AnalysisStatus,
    pub config: AnalysisRunConfig,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Option<AnalysisResults>,
    pub summary: Option<AnalysisSummary>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub transitions: Vec<AnalysisTransition>,
}

impl Analysis {
    /// Create a queued analysis
    pub fn new(codebase_id: CodebaseId, analysis_type: AnalysisType) -> Self {
        Self {
            id: AnalysisId::generate(),
            codebase_id,
            analysis_type,
            status: AnalysisStatus::Queued,
            config: AnalysisRunConfig::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            results: None,
            summary: None,
            error_message: None,
            transitions: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: AnalysisRunConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and apply a status change, stamping timestamps and the audit trail.
    pub fn transition(
        &mut self,
        target: AnalysisStatus,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(target) {
            return Err(TransitionError {
                entity: "analysis",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        match target {
            AnalysisStatus::Running => self.started_at = Some(now),
            AnalysisStatus::Completed | AnalysisStatus::Failed | AnalysisStatus::Cancelled => {
                self.completed_at = Some(now)
            }
            AnalysisStatus::Queued => {}
        }

        self.transitions.push(AnalysisTransition {
            from: self.status,
            to: target,
            at: now,
            reason,
        });
        self.status = target;
        Ok(())
    }
}

/// Counts of findings per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBreakdown {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
}

impl SeverityBreakdown {
    pub fn get(&self, severity: FindingSeverity) -> u32 {
        match severity {
            FindingSeverity::Critical => self.critical,
            FindingSeverity::High => self.high,
            FindingSeverity::Medium => self.medium,
            FindingSeverity::Low => self.low,
            FindingSeverity::Info => self.info,
        }
    }

    pub fn add(&mut self, severity: FindingSeverity, count: u32) {
        let slot = match severity {
            FindingSeverity::Critical => &mut self.critical,
            FindingSeverity::High => &mut self.high,
            FindingSeverity::Medium => &mut self.medium,
            FindingSeverity::Low => &mut self.low,
            FindingSeverity::Info => &mut self.info,
        };
        *slot += count;
    }

    pub fn merge(&mut self, other: &SeverityBreakdown) {
        for severity in FindingSeverity::ALL {
            self.add(*severity, other.get(*severity));
        }
    }

    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Counts of findings per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryBreakdown {
    pub security: u32,
    pub technical_debt: u32,
    pub dead_code: u32,
    pub dependency: u32,
    pub architecture: u32,
    pub performance: u32,
    pub maintainability: u32,
    pub consolidation: u32,
    pub compliance: u32,
}

impl CategoryBreakdown {
    pub fn get(&self, category: FindingCategory) -> u32 {
        match category {
            FindingCategory::Security => self.security,
            FindingCategory::TechnicalDebt => self.technical_debt,
            FindingCategory::DeadCode => self.dead_code,
            FindingCategory::Dependency => self.dependency,
            FindingCategory::Architecture => self.architecture,
            FindingCategory::Performance => self.performance,
            FindingCategory::Maintainability => self.maintainability,
            FindingCategory::Consolidation => self.consolidation,
            FindingCategory::Compliance => self.compliance,
        }
    }

    pub fn add(&mut self, category: FindingCategory, count: u32) {
        let slot = match category {
            FindingCategory::Security => &mut self.security,
            FindingCategory::TechnicalDebt => &mut self.technical_debt,
            FindingCategory::DeadCode => &mut self.dead_code,
            FindingCategory::Dependency => &mut self.dependency,
            FindingCategory::Architecture => &mut self.architecture,
            FindingCategory::Performance => &mut self.performance,
            FindingCategory::Maintainability => &mut self.maintainability,
            FindingCategory::Consolidation => &mut self.consolidation,
            FindingCategory::Compliance => &mut self.compliance,
        };
        *slot += count;
    }

    pub fn merge(&mut self, other: &CategoryBreakdown) {
        for category in FindingCategory::ALL {
            self.add(*category, other.get(*category));
        }
    }

    pub fn total(&self) -> u32 {
        FindingCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Health scores in the range `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub security: u8,
    pub maintainability: u8,
    pub tech_debt: u8,
}

impl Scorecard {
    /// Score of a repository with no findings
    pub const PERFECT: Scorecard = Scorecard {
        security: 100,
        maintainability: 100,
        tech_debt: 100,
    };
}

impl Default for Scorecard {
    fn default() -> Self {
        Self::PERFECT
    }
}

/// Human-readable digest of an analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisSummary {
    pub overview: String,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub estimated_effort: String,
}

/// Outcome for one repository that made it through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryReport {
    pub repository_id: RepositoryId,
    pub files_analyzed: u64,
    pub findings_count: u32,
    /// Reviewer batches that produced no usable answer
    #[serde(default)]
    pub failed_batches: u32,
    pub scores: Scorecard,
    pub summary: AnalysisSummary,
}

/// A repository left out of the aggregation and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRepository {
    pub repository_id: RepositoryId,
    pub error: String,
}

/// Aggregated numbers for a completed analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub files_analyzed: u64,
    pub findings_count: u32,
    pub findings_by_severity: SeverityBreakdown,
    pub findings_by_category: CategoryBreakdown,
    pub tech_debt_score: u8,
    pub security_score: u8,
    pub maintainability_score: u8,
    #[serde(default)]
    pub repositories: Vec<RepositoryReport>,
    #[serde(default)]
    pub failed_repositories: Vec<FailedRepository>,
}

/// One issue detected in a repository during an analysis
///
/// Immutable once created, except for `status` which is owned by users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: FindingId,
    pub analysis_id: AnalysisId,
    pub repository_id: RepositoryId,
    pub title: String,
    pub description: String,
    pub severity: FindingSeverity,
    pub category: FindingCategory,
    pub status: FindingStatus,
    pub file_path: String,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub suggested_fix: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    /// Create an `open` finding owned by `repository_id` and `analysis_id`.
    pub fn new(
        analysis_id: AnalysisId,
        repository_id: RepositoryId,
        title: impl Into<String>,
        severity: FindingSeverity,
        category: FindingCategory,
    ) -> Self {
        Self {
            id: FindingId::generate(),
            analysis_id,
            repository_id,
            title: title.into(),
            description: String::new(),
            severity,
            category,
            status: FindingStatus::Open,
            file_path: String::new(),
            line_start: None,
            line_end: None,
            suggested_fix: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
