//! Static fallback values.
//!
//! Each chain of remote calls terminates in one of these. The source tags
//! are surfaced as `source` in responses so a demo operator can tell a
//! fallback apart from a live integration.

use crate::types::{AnalysisScores, Product, ResearchInsight};

pub const ANALYSIS_FALLBACK_SOURCE: &str = "Lumiere_Neural_Engine_Fallback";
pub const ANALYSIS_EMERGENCY_SOURCE: &str = "Lumiere_Emergency_Mock";
pub const CURATED_REGIMEN_SOURCE: &str = "Lumiere_Curated_Regimen_Mock";
pub const EMERGENCY_REGIMEN_SOURCE: &str = "Lumiere_Emergency_Regimen";
pub const KNOWLEDGE_BASE_SOURCE: &str = "Lumiere_Internal_Knowledge_Base";
pub const REPORT_FALLBACK_SOURCE: &str = "Lumiere_In_Memory_Report";
pub const VOICE_DEMO_SOURCE: &str = "Lumiere_Voice_Demo_Config";
pub const LOCAL_ARCHIVE_SOURCE: &str = "Lumiere_Local_Archive";

/// Scores returned when the vision provider is unavailable.
pub const FALLBACK_SCORES: AnalysisScores = AnalysisScores {
    spots: 78,
    moisture: 42,
    texture: 85,
    dark_circles: 64,
};

/// Scores returned when the request itself could not be read.
pub const EMERGENCY_SCORES: AnalysisScores = AnalysisScores {
    spots: 80,
    moisture: 45,
    texture: 82,
    dark_circles: 60,
};

/// Product named on the minimal report when no products were recommended.
pub const DEFAULT_REPORT_PRODUCT: &str = "Hydra-Restore Serum";

/// The two-product hydration regimen.
pub fn curated_regimen() -> Vec<Product> {
    vec![
        Product::new("mock_h1", "Hydra-Restore Bio-Serum", 124.0, "hydration").with_image(
            "https://images.unsplash.com/photo-1620916566398-39f1143ab7be?auto=format&fit=crop&w=500&q=80",
        ),
        Product::new("mock_h2", "Clinical Ceramide Complex", 95.0, "hydration").with_image(
            "https://images.unsplash.com/photo-1556228720-195a672e8a03?auto=format&fit=crop&w=500&q=80",
        ),
    ]
}

/// Single general-purpose product for unreadable requests.
pub fn emergency_regimen() -> Vec<Product> {
    vec![Product::new("emergency_1", "Lumiere Base Recovery", 85.0, "general")]
}

/// Built-in research insight for a concern. Unknown concerns get hydration.
pub fn knowledge_base_insight(concern: &str) -> ResearchInsight {
    let (insight, title, url) = match concern.trim().to_ascii_lowercase().as_str() {
        "texture" => (
            "Advanced resurfacing studies indicate that non-ablative fractional lasers combined with micro-exfoliation cycles show a 30% improvement in dermal consistency indices over 4 weeks.",
            "Clinical Texture Restoration Protocols",
            "https://example.com/texture-clinical-data",
        ),
        "melanin" => (
            "New research into Trans-Tranexamic Acid delivery systems shows significantly higher efficacy in regulating melanin distribution compared to traditional hydroquinone therapies.",
            "Modern Pigmentation Regulation Research",
            "https://example.com/pigmentation-report",
        ),
        _ => (
            "Recent clinical trials in 2025 published in the Journal of Investigative Dermatology suggest that multi-molecular Hyaluronic acid cross-linking increases epidermal barrier resilience by 42%.",
            "2025 Dermal Hydration Benchmark Study",
            "https://example.com/clinical-hydration-study",
        ),
    };

    ResearchInsight {
        insight: insight.to_string(),
        source_title: title.to_string(),
        source_url: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_regimen_is_two_hydration_products() {
        let products = curated_regimen();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, "mock_h1");
        assert_eq!(products[1].id, "mock_h2");
        assert!(products.iter().all(|p| p.target_issue == "hydration" && p.in_stock));
    }

    #[test]
    fn test_knowledge_base_defaults_to_hydration() {
        let unknown = knowledge_base_insight("wrinkles");
        let hydration = knowledge_base_insight("hydration");
        assert_eq!(unknown, hydration);
        assert_ne!(knowledge_base_insight("Texture"), hydration);
    }
}
