//! Property tests for deduction scoring

use codescope_core::domain::analysis::{
    AnalysisId, Finding, FindingCategory, FindingSeverity, RepositoryId, Scorecard,
};
use codescope_llm::{average_scores, compute_scores};
use proptest::prelude::*;

fn severity() -> impl Strategy<Value = FindingSeverity> {
    prop::sample::select(FindingSeverity::ALL.to_vec())
}

fn category() -> impl Strategy<Value = FindingCategory> {
    prop::sample::select(FindingCategory::ALL.to_vec())
}

fn findings() -> impl Strategy<Value = Vec<Finding>> {
    prop::collection::vec((severity(), category()), 0..60).prop_map(|pairs| {
        let analysis_id = AnalysisId::generate();
        let repository_id = RepositoryId::generate();
        pairs
            .into_iter()
            .map(|(s, c)| Finding::new(analysis_id, repository_id, "issue", s, c))
            .collect()
    })
}

fn scorecard() -> impl Strategy<Value = Scorecard> {
    (0u8..=100, 0u8..=100, 0u8..=100).prop_map(|(security, maintainability, tech_debt)| {
        Scorecard {
            security,
            maintainability,
            tech_debt,
        }
    })
}

proptest! {
    #[test]
    fn scores_stay_in_range(findings in findings()) {
        let scores = compute_scores(&findings);
        prop_assert!(scores.security <= 100);
        prop_assert!(scores.maintainability <= 100);
        prop_assert!(scores.tech_debt <= 100);
    }

    #[test]
    fn adding_a_finding_never_raises_a_score(
        findings in findings(),
        extra in (severity(), category()),
    ) {
        let before = compute_scores(&findings);
        let mut more = findings.clone();
        more.push(Finding::new(AnalysisId::generate(), RepositoryId::generate(), "extra", extra.0, extra.1));
        let after = compute_scores(&more);
        prop_assert!(after.security <= before.security);
        prop_assert!(after.maintainability <= before.maintainability);
        prop_assert!(after.tech_debt <= before.tech_debt);
    }

    #[test]
    fn non_security_findings_leave_security_perfect(findings in findings()) {
        let filtered: Vec<Finding> = findings
            .into_iter()
            .filter(|f| f.category != FindingCategory::Security)
            .collect();
        prop_assert_eq!(compute_scores(&filtered).security, 100);
    }

    #[test]
    fn average_lies_between_min_and_max(cards in prop::collection::vec(scorecard(), 1..8)) {
        let avg = average_scores(&cards).unwrap();
        let min = cards.iter().map(|c| c.security).min().unwrap();
        let max = cards.iter().map(|c| c.security).max().unwrap();
        prop_assert!(avg.security >= min && avg.security <= max);
    }
}
