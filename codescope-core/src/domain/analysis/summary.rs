//! Deterministic executive summary
//!
//! Built purely from aggregate counts and scores, without a reviewer call.
//! The orchestrator uses it for the codebase-wide summary and the coordinator
//! falls back to it when the reviewer cannot produce one.

use super::entities::{AnalysisSummary, CategoryBreakdown, Scorecard, SeverityBreakdown};

/// Upper bound for key findings and recommendations
pub const MAX_SUMMARY_ITEMS: usize = 5;

/// Score below which a dimension is called out in the summary
pub const LOW_SCORE_THRESHOLD: u8 = 70;

/// Aggregated numbers a summary is generated from
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub total_findings: u32,
    pub by_severity: &'a SeverityBreakdown,
    pub by_category: &'a CategoryBreakdown,
    pub scores: Scorecard,
}

/// Generate the templated summary for a set of aggregated results.
pub fn generate_summary(input: &SummaryInput<'_>) -> AnalysisSummary {
    let critical = input.by_severity.critical;
    let high = input.by_severity.high;

    let overview = if critical > 0 {
        format!(
            "The analysis found {} critical issue(s) that require immediate attention. {} finding(s) were identified in total.",
            critical, input.total_findings
        )
    } else if high > 0 {
        format!(
            "No critical issues were found, but {} high-severity issue(s) should be addressed soon. {} finding(s) were identified in total.",
            high, input.total_findings
        )
    } else {
        format!(
            "The codebase is in good shape with no critical or high-severity issues. {} finding(s) were identified in total.",
            input.total_findings
        )
    };

    AnalysisSummary {
        overview,
        key_findings: key_findings(input),
        recommendations: recommendations(input),
        estimated_effort: estimated_effort(input.total_findings, critical).to_string(),
    }
}

fn key_findings(input: &SummaryInput<'_>) -> Vec<String> {
    let mut items = Vec::new();
    let categories = input.by_category;

    if input.by_severity.critical > 0 {
        items.push(format!(
            "{} critical issue(s) require immediate attention",
            input.by_severity.critical
        ));
    }
    if categories.security > 0 {
        items.push(format!(
            "{} security issue(s) identified",
            categories.security
        ));
    }
    if categories.technical_debt > 0 {
        items.push(format!(
            "{} technical debt item(s) found",
            categories.technical_debt
        ));
    }
    if categories.dead_code > 0 {
        items.push(format!(
            "{} dead code instance(s) detected",
            categories.dead_code
        ));
    }
    if input.scores.security < LOW_SCORE_THRESHOLD {
        items.push(format!(
            "Security score is low ({}/100)",
            input.scores.security
        ));
    }

    items.truncate(MAX_SUMMARY_ITEMS);
    items
}

fn recommendations(input: &SummaryInput<'_>) -> Vec<String> {
    let mut items = Vec::new();
    let categories = input.by_category;

    if input.by_severity.critical > 0 {
        items.push("Address all critical issues before the next release".to_string());
    }
    if categories.security > 0 {
        items.push("Fix the identified security vulnerabilities".to_string());
    }
    if categories.dependency > 0 {
        items.push("Update outdated or vulnerable dependencies".to_string());
    }
    if categories.dead_code > 0 {
        items.push("Remove dead code to reduce maintenance overhead".to_string());
    }
    if input.scores.maintainability < LOW_SCORE_THRESHOLD {
        items.push("Refactor complex modules to improve maintainability".to_string());
    }

    items.truncate(MAX_SUMMARY_ITEMS);
    items
}

/// Rough remediation effort as a step function of volume and criticality.
///
/// Either threshold of a tier is enough to select it.
pub fn estimated_effort(total_findings: u32, critical: u32) -> &'static str {
    if total_findings > 100 || critical > 10 {
        "2-4 weeks"
    } else if total_findings > 50 || critical > 5 {
        "1-2 weeks"
    } else if total_findings > 20 {
        "3-5 days"
    } else {
        "1-2 days"
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0, "1-2 days")]
    #[case(20, 0, "1-2 days")]
    #[case(21, 0, "3-5 days")]
    #[case(51, 0, "1-2 weeks")]
    #[case(5, 6, "1-2 weeks")]
    #[case(101, 0, "2-4 weeks")]
    #[case(3, 11, "2-4 weeks")]
    fn test_estimated_effort(#[case] total: u32, #[case] critical: u32, #[case] expected: &str) {
        assert_eq!(estimated_effort(total, critical), expected);
    }

    #[test]
    fn test_clean_codebase_summary() {
        let severity = SeverityBreakdown::default();
        let category = CategoryBreakdown::default();
        let summary = generate_summary(&SummaryInput {
            total_findings: 0,
            by_severity: &severity,
            by_category: &category,
            scores: Scorecard::PERFECT,
        });

        assert!(summary.overview.contains("good shape"));
        assert!(summary.key_findings.is_empty());
        assert!(summary.recommendations.is_empty());
        assert_eq!(summary.estimated_effort, "1-2 days");
    }

    #[test]
    fn test_priority_order_and_cap() {
        let severity = SeverityBreakdown {
            critical: 2,
            high: 1,
            ..Default::default()
        };
        let category = CategoryBreakdown {
            security: 3,
            technical_debt: 4,
            dead_code: 1,
            dependency: 2,
            ..Default::default()
        };
        let summary = generate_summary(&SummaryInput {
            total_findings: 10,
            by_severity: &severity,
            by_category: &category,
            scores: Scorecard {
                security: 40,
                maintainability: 50,
                tech_debt: 80,
            },
        });

        assert!(summary.overview.contains("2 critical"));
        assert_eq!(summary.key_findings.len(), MAX_SUMMARY_ITEMS);
        assert!(summary.key_findings[0].starts_with("2 critical"));
        assert!(summary.key_findings[4].contains("40/100"));
        assert_eq!(summary.recommendations.len(), MAX_SUMMARY_ITEMS);
        assert!(summary.recommendations[2].contains("dependencies"));
        assert!(summary.recommendations[4].contains("maintainability"));
    }

    #[test]
    fn test_high_severity_overview() {
        let severity = SeverityBreakdown {
            high: 3,
            ..Default::default()
        };
        let category = CategoryBreakdown::default();
        let summary = generate_summary(&SummaryInput {
            total_findings: 3,
            by_severity: &severity,
            by_category: &category,
            scores: Scorecard::PERFECT,
        });
        assert!(summary.overview.contains("3 high-severity"));
        assert!(summary.overview.ends_with("3 finding(s) were identified in total."));
    }
}
