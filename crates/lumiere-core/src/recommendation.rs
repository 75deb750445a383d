//! Maps analysis scores to a product category.
//!
//! The lowest-scoring biomarker is the primary concern; its category is
//! the `targetIssue` tag used to query the content store.

use crate::types::{AnalysisScores, Biomarker};

/// Category used when a request names none.
pub const DEFAULT_TARGET_ISSUE: &str = "hydration";

/// Content-store category for a biomarker.
pub fn issue_for(biomarker: Biomarker) -> &'static str {
    match biomarker {
        Biomarker::Spots => "spots",
        Biomarker::Moisture => "hydration",
        Biomarker::Texture => "texture",
        Biomarker::DarkCircles => "darkCircles",
    }
}

/// Category for the primary concern in `scores`.
pub fn target_issue_for(scores: &AnalysisScores) -> &'static str {
    issue_for(scores.lowest())
}

/// Normalize a caller-provided category, falling back to the default.
pub fn normalize_issue(issue: Option<&str>) -> String {
    match issue.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_TARGET_ISSUE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lowest_moisture_selects_hydration() {
        let scores = AnalysisScores::new(78.0, 42.0, 85.0, 64.0);
        assert_eq!(target_issue_for(&scores), "hydration");
    }

    #[test]
    fn test_lowest_dark_circles() {
        let scores = AnalysisScores::new(78.0, 92.0, 85.0, 14.0);
        assert_eq!(target_issue_for(&scores), "darkCircles");
    }

    #[test]
    fn test_normalize_issue() {
        assert_eq!(normalize_issue(None), "hydration");
        assert_eq!(normalize_issue(Some("  ")), "hydration");
        assert_eq!(normalize_issue(Some("texture")), "texture");
    }

    proptest! {
        #[test]
        fn prop_target_issue_is_lowest_biomarker(
            spots in 0.0f64..=100.0,
            moisture in 0.0f64..=100.0,
            texture in 0.0f64..=100.0,
            dark_circles in 0.0f64..=100.0,
        ) {
            let scores = AnalysisScores::new(spots, moisture, texture, dark_circles);
            let issue = target_issue_for(&scores);
            let chosen = Biomarker::ALL
                .into_iter()
                .find(|b| issue_for(*b) == issue)
                .expect("issue maps back to a biomarker");
            for biomarker in Biomarker::ALL {
                prop_assert!(scores.get(chosen) <= scores.get(biomarker));
            }
        }
    }
}
