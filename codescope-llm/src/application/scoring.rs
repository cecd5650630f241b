//! Deduction-based health scores
//!
//! Every score starts at 100. Each finding deducts half its severity weight
//! from tech debt; a `security` finding also deducts twice its weight from
//! security, and a `maintainability` or `architecture` finding deducts its
//! weight from maintainability. Results are rounded and clamped to `0..=100`.

use std::collections::BTreeMap;

use codescope_core::domain::analysis::{Finding, FindingCategory, Scorecard, SourceFile};

const SECURITY_MULTIPLIER: f64 = 2.0;
const TECH_DEBT_MULTIPLIER: f64 = 0.5;

/// Score a single repository's findings.
pub fn compute_scores(findings: &[Finding]) -> Scorecard {
    let mut security = 100.0;
    let mut maintainability = 100.0;
    let mut tech_debt = 100.0;

    for finding in findings {
        let weight = f64::from(finding.severity.weight());
        tech_debt -= weight * TECH_DEBT_MULTIPLIER;

        match finding.category {
            FindingCategory::Security => security -= weight * SECURITY_MULTIPLIER,
            FindingCategory::Maintainability | FindingCategory::Architecture => {
                maintainability -= weight
            }
            _ => {}
        }
    }

    Scorecard {
        security: clamp_score(security),
        maintainability: clamp_score(maintainability),
        tech_debt: clamp_score(tech_debt),
    }
}

/// Mean of several scorecards, rounded; `None` for an empty slice.
pub fn average_scores(scores: &[Scorecard]) -> Option<Scorecard> {
    if scores.is_empty() {
        return None;
    }
    let n = scores.len() as f64;
    let mean = |pick: fn(&Scorecard) -> u8| {
        clamp_score(scores.iter().map(|s| f64::from(pick(s))).sum::<f64>() / n)
    };

    Some(Scorecard {
        security: mean(|s| s.security),
        maintainability: mean(|s| s.maintainability),
        tech_debt: mean(|s| s.tech_debt),
    })
}

/// Lines per language across `files`.
pub fn language_line_counts(files: &[SourceFile]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for file in files {
        *counts.entry(file.language.clone()).or_insert(0) += file.line_count();
    }
    counts
}

/// Each language's share of the total line count, in rounded percent.
pub fn language_percentages(line_counts: &BTreeMap<String, u64>) -> BTreeMap<String, u8> {
    let total: u64 = line_counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }

    line_counts
        .iter()
        .map(|(language, lines)| {
            let share = (*lines as f64 / total as f64) * 100.0;
            (language.clone(), clamp_score(share))
        })
        .collect()
}

fn clamp_score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}
