//! Run-level aggregation of per-repository outcomes

use codescope_core::domain::analysis::{
    AnalysisResults, CategoryBreakdown, FailedRepository, LanguageLineCounts, RepositoryId,
    RepositoryReport, Scorecard, SeverityBreakdown,
};
use codescope_llm::average_scores;

use super::errors::OrchestratorError;

/// What one successfully analysed repository contributes to a run
#[derive(Debug, Clone)]
pub struct RepositoryContribution {
    pub report: RepositoryReport,
    pub total_lines: u64,
    pub language_lines: LanguageLineCounts,
    pub by_severity: SeverityBreakdown,
    pub by_category: CategoryBreakdown,
}

/// Aggregate file and line totals, for the codebase metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTotals {
    pub total_files: u64,
    pub total_lines: u64,
    pub language_lines: LanguageLineCounts,
}

/// Running accumulator for one analysis run.
///
/// Scores are averaged over the repositories recorded as successes only;
/// failed repositories are listed but do not move the averages.
#[derive(Debug, Default)]
pub struct RunAccumulator {
    files_analyzed: u64,
    total_lines: u64,
    findings_count: u32,
    by_severity: SeverityBreakdown,
    by_category: CategoryBreakdown,
    scores: Vec<Scorecard>,
    language_lines: LanguageLineCounts,
    reports: Vec<RepositoryReport>,
    failures: Vec<FailedRepository>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, contribution: RepositoryContribution) {
        let RepositoryContribution {
            report,
            total_lines,
            language_lines,
            by_severity,
            by_category,
        } = contribution;

        self.files_analyzed += report.files_analyzed;
        self.total_lines += total_lines;
        self.findings_count += report.findings_count;
        self.by_severity.merge(&by_severity);
        self.by_category.merge(&by_category);
        self.scores.push(report.scores);
        for (language, lines) in language_lines {
            *self.language_lines.entry(language).or_insert(0) += lines;
        }
        self.reports.push(report);
    }

    pub fn record_failure(&mut self, repository_id: RepositoryId, error: impl Into<String>) {
        self.failures.push(FailedRepository {
            repository_id,
            error: error.into(),
        });
    }

    /// Close the run, failing when no repository made it through.
    pub fn finish(self) -> Result<(AnalysisResults, RunTotals), OrchestratorError> {
        let averages = average_scores(&self.scores).ok_or(OrchestratorError::AllRepositoriesFailed {
            attempted: self.failures.len(),
        })?;

        let results = AnalysisResults {
            files_analyzed: self.files_analyzed,
            findings_count: self.findings_count,
            findings_by_severity: self.by_severity,
            findings_by_category: self.by_category,
            tech_debt_score: averages.tech_debt,
            security_score: averages.security,
            maintainability_score: averages.maintainability,
            repositories: self.reports,
            failed_repositories: self.failures,
        };
        let totals = RunTotals {
            total_files: self.files_analyzed,
            total_lines: self.total_lines,
            language_lines: self.language_lines,
        };
        Ok((results, totals))
    }
}
