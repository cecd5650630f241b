//! AI analysis coordinator
//!
//! Turns a repository's source files into findings, a scorecard and a prose
//! summary by batching reviewer calls. The coordinator never fails: reviewer
//! errors and unparseable answers cost a batch its findings, nothing more.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use codescope_core::config::AnalysisConfig;
use codescope_core::domain::analysis::{
    AnalysisId, AnalysisSummary, AnalysisType, CategoryBreakdown, Finding, FindingCategory,
    FindingSeverity, MAX_SUMMARY_ITEMS, RepositoryId, Scorecard, SeverityBreakdown, SourceFile,
    SummaryInput, estimated_effort, generate_summary,
};

use super::scoring::{compute_scores, language_line_counts, language_percentages};
use crate::domain::ModelReviewer;
use crate::infrastructure::prompts::{FileExcerpt, PromptBuilder};
use crate::infrastructure::{parse_reviewer_json, parse_reviewer_object};

const TITLE_FROM_DESCRIPTION_CHARS: usize = 80;

/// Batching and prompt limits
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub batch_size: usize,
    /// Per-file character budget; longer files are cut and marked
    pub max_chars_per_file: usize,
    /// Findings quoted in the summary request
    pub summary_top_findings: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for CoordinatorConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_chars_per_file: config.max_chars_per_file.max(1),
            summary_top_findings: config.summary_top_findings,
        }
    }
}

/// Everything the coordinator learned about one repository
#[derive(Debug, Clone)]
pub struct CodeAnalysisOutcome {
    pub findings: Vec<Finding>,
    pub summary: AnalysisSummary,
    pub scores: Scorecard,
    /// Rounded percentage of lines per language
    pub language_histogram: BTreeMap<String, u8>,
    /// Files that were actually submitted to the reviewer
    pub files_analyzed: u64,
    /// Batches submitted to the reviewer
    pub batches: usize,
    /// Batches that produced no usable answer
    pub failed_batches: usize,
}

impl CodeAnalysisOutcome {
    /// True when batches were sent and none of them produced an answer
    pub fn reviewer_unavailable(&self) -> bool {
        self.batches > 0 && self.failed_batches == self.batches
    }
}

/// Coordinates reviewer calls for one repository at a time
pub struct AiAnalysisCoordinator {
    reviewer: Arc<dyn ModelReviewer>,
    config: CoordinatorConfig,
}

impl AiAnalysisCoordinator {
    pub fn new(reviewer: Arc<dyn ModelReviewer>, config: CoordinatorConfig) -> Self {
        Self { reviewer, config }
    }

    /// Review `files` batch by batch and score the result.
    ///
    /// Batches run sequentially. Each file is cut to the character budget
    /// before submission, so issues past the cut are invisible to the
    /// reviewer; the cut is marked in the prompt. When `cancel` fires, no
    /// further batches are sent and the in-flight call is abandoned.
    pub async fn analyze_code(
        &self,
        files: &[SourceFile],
        analysis_type: AnalysisType,
        repository_id: RepositoryId,
        analysis_id: AnalysisId,
        cancel: &CancellationToken,
    ) -> CodeAnalysisOutcome {
        let total_batches = files.len().div_ceil(self.config.batch_size);
        info!(
            repository_id = %repository_id,
            analysis_id = %analysis_id,
            files = files.len(),
            batches = total_batches,
            model = self.reviewer.model(),
            "Starting AI code analysis"
        );

        let mut findings = Vec::new();
        let mut files_analyzed = 0u64;
        let mut batches = 0usize;
        let mut failed_batches = 0usize;

        for (index, batch) in files.chunks(self.config.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(repository_id = %repository_id, batch = index, "Analysis cancelled, skipping remaining batches");
                break;
            }

            let prompt = self.build_prompt(analysis_type, batch);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(repository_id = %repository_id, batch = index, "Analysis cancelled during reviewer call");
                    break;
                }
                response = self.reviewer.review(&prompt) => response,
            };
            files_analyzed += batch.len() as u64;
            batches += 1;

            let text = match response {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        repository_id = %repository_id,
                        batch = index,
                        error = %e,
                        "Reviewer call failed, batch contributes no findings"
                    );
                    failed_batches += 1;
                    continue;
                }
            };

            match parse_reviewer_json(&text).and_then(|v| v.as_array().cloned()) {
                Some(items) => {
                    let before = findings.len();
                    findings.extend(
                        items
                            .iter()
                            .filter_map(|item| map_finding(item, batch, repository_id, analysis_id)),
                    );
                    debug!(
                        batch = index,
                        returned = items.len(),
                        accepted = findings.len() - before,
                        "Parsed reviewer findings"
                    );
                }
                None => {
                    warn!(
                        repository_id = %repository_id,
                        batch = index,
                        "Reviewer response contained no JSON array, batch contributes no findings"
                    );
                    failed_batches += 1;
                }
            }
        }

        let scores = compute_scores(&findings);
        let language_histogram = language_percentages(&language_line_counts(files));
        let summary = self.summarize(&findings, scores, cancel).await;

        info!(
            repository_id = %repository_id,
            findings = findings.len(),
            files_analyzed,
            failed_batches,
            security = scores.security,
            maintainability = scores.maintainability,
            tech_debt = scores.tech_debt,
            "AI code analysis complete"
        );

        CodeAnalysisOutcome {
            findings,
            summary,
            scores,
            language_histogram,
            files_analyzed,
            batches,
            failed_batches,
        }
    }

    fn build_prompt(&self, analysis_type: AnalysisType, batch: &[SourceFile]) -> String {
        let excerpts: Vec<Cow<'_, str>> = batch
            .iter()
            .map(|file| truncate_excerpt(&file.content, self.config.max_chars_per_file))
            .collect();

        let files: Vec<FileExcerpt<'_>> = batch
            .iter()
            .zip(&excerpts)
            .map(|(file, content)| FileExcerpt {
                path: &file.path,
                language: &file.language,
                content,
            })
            .collect();

        PromptBuilder::build_batch_prompt(analysis_type, &files)
    }

    /// Ask the reviewer for a summary, falling back to the templated one.
    async fn summarize(
        &self,
        findings: &[Finding],
        scores: Scorecard,
        cancel: &CancellationToken,
    ) -> AnalysisSummary {
        let mut by_severity = SeverityBreakdown::default();
        let mut by_category = CategoryBreakdown::default();
        for finding in findings {
            by_severity.add(finding.severity, 1);
            by_category.add(finding.category, 1);
        }

        let fallback = || {
            generate_summary(&SummaryInput {
                total_findings: findings.len() as u32,
                by_severity: &by_severity,
                by_category: &by_category,
                scores,
            })
        };

        if cancel.is_cancelled() {
            return fallback();
        }

        let mut ranked: Vec<&Finding> = findings.iter().collect();
        ranked.sort_by_key(|f| f.severity);
        ranked.truncate(self.config.summary_top_findings);

        let prompt =
            PromptBuilder::build_summary_prompt(findings.len(), &by_severity, &by_category, &ranked);

        match self.reviewer.review(&prompt).await {
            Ok(text) => match parse_reviewer_object(&text).and_then(|map| {
                summary_from_object(map, findings.len() as u32, by_severity.critical)
            }) {
                Some(summary) => summary,
                None => {
                    warn!("Reviewer summary was not a usable JSON object, using templated summary");
                    fallback()
                }
            },
            Err(e) => {
                warn!(error = %e, "Reviewer summary call failed, using templated summary");
                fallback()
            }
        }
    }
}

/// Cut `content` to `max_chars` characters, appending a visible marker.
pub fn truncate_excerpt(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        None => Cow::Borrowed(content),
        Some((cut, _)) => {
            let dropped = content[cut..].chars().count();
            Cow::Owned(format!(
                "{}\n... [truncated {} characters]",
                &content[..cut],
                dropped
            ))
        }
    }
}

/// Build a finding from one element of the reviewer's array.
///
/// Elements that are not objects, or have neither title nor description,
/// are dropped.
fn map_finding(
    item: &Value,
    batch: &[SourceFile],
    repository_id: RepositoryId,
    analysis_id: AnalysisId,
) -> Option<Finding> {
    let object = item.as_object()?;
    let description = string_field(object, "description").unwrap_or_default();
    let title = match string_field(object, "title") {
        Some(title) => title,
        None if !description.is_empty() => description
            .chars()
            .take(TITLE_FROM_DESCRIPTION_CHARS)
            .collect(),
        None => return None,
    };

    let severity = string_field(object, "severity")
        .map(|s| FindingSeverity::from_token(&s))
        .unwrap_or(FindingSeverity::Info);
    let category = string_field(object, "category")
        .map(|s| FindingCategory::from_token(&s))
        .unwrap_or(FindingCategory::TechnicalDebt);

    let mut finding = Finding::new(analysis_id, repository_id, title, severity, category);
    finding.description = description;
    finding.file_path = string_field(object, "filePath").unwrap_or_default();
    finding.line_start = line_field(object.get("lineStart"));
    finding.line_end = line_field(object.get("lineEnd"));
    finding.suggested_fix = string_field(object, "suggestedFix");

    if let Some(tags) = object.get("tags").and_then(Value::as_array) {
        finding.tags = tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    if let Some(file) = batch.iter().find(|f| f.path == finding.file_path) {
        let language = file.language.to_ascii_lowercase();
        if !finding.tags.contains(&language) {
            finding.tags.push(language);
        }
    }

    Some(finding)
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn line_field(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn summary_from_object(
    map: Map<String, Value>,
    total_findings: u32,
    critical: u32,
) -> Option<AnalysisSummary> {
    let mut summary: AnalysisSummary = serde_json::from_value(Value::Object(map)).ok()?;
    if summary.overview.trim().is_empty() {
        return None;
    }
    summary.key_findings.truncate(MAX_SUMMARY_ITEMS);
    summary.recommendations.truncate(MAX_SUMMARY_ITEMS);
    if summary.estimated_effort.trim().is_empty() {
        summary.estimated_effort = estimated_effort(total_findings, critical).to_string();
    }
    Some(summary)
}
