//! Property-based tests for free-text severity/category mapping

use proptest::prelude::*;
use codescope_core::domain::analysis::{FindingCategory, FindingSeverity};

fn any_severity() -> impl Strategy<Value = FindingSeverity> {
    prop::sample::select(FindingSeverity::ALL.to_vec())
}

fn any_category() -> impl Strategy<Value = FindingCategory> {
    prop::sample::select(FindingCategory::ALL.to_vec())
}

proptest! {
    #[test]
    fn test_canonical_severity_maps_to_itself(severity in any_severity()) {
        prop_assert_eq!(FindingSeverity::from_token(severity.as_str()), severity);
    }

    #[test]
    fn test_canonical_category_maps_to_itself(category in any_category()) {
        prop_assert_eq!(FindingCategory::from_token(category.as_str()), category);
    }

    #[test]
    fn test_mapping_ignores_case_and_padding(severity in any_severity(), pad in " {0,3}") {
        let shouted = format!("{pad}{}{pad}", severity.as_str().to_uppercase());
        prop_assert_eq!(FindingSeverity::from_token(&shouted), severity);
    }

    #[test]
    fn test_mapping_is_idempotent(token in "[a-zA-Z_ -]{0,20}") {
        let once = FindingCategory::from_token(&token);
        prop_assert_eq!(FindingCategory::from_token(once.as_str()), once);

        let once = FindingSeverity::from_token(&token);
        prop_assert_eq!(FindingSeverity::from_token(once.as_str()), once);
    }

    #[test]
    fn test_unknown_tokens_use_defaults(token in "zz[a-z]{1,10}") {
        prop_assert_eq!(FindingSeverity::from_token(&token), FindingSeverity::Info);
        prop_assert_eq!(FindingCategory::from_token(&token), FindingCategory::TechnicalDebt);
    }
}
