//! Plain records shared by every endpoint.
//!
//! Nothing here has a lifecycle: scores are produced fresh per request,
//! products are read from the content store, scan records are append-only
//! and the cart only lives as long as a client session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound of every biomarker score.
pub const SCORE_MAX: u8 = 100;

/// Clamp an arbitrary number into the `[0, 100]` score range.
///
/// Non-finite input maps to zero.
pub fn clamp_score(value: f64) -> u8 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    if value >= SCORE_MAX as f64 {
        return SCORE_MAX;
    }
    value.round() as u8
}

/// A named biomarker measured by skin analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Biomarker {
    Spots,
    Moisture,
    Texture,
    DarkCircles,
}

impl Biomarker {
    /// All biomarkers in declaration order. Ties are broken by this order.
    pub const ALL: [Biomarker; 4] = [
        Biomarker::Spots,
        Biomarker::Moisture,
        Biomarker::Texture,
        Biomarker::DarkCircles,
    ];

    /// JSON key used on the wire.
    pub fn key(&self) -> &'static str {
        match self {
            Biomarker::Spots => "spots",
            Biomarker::Moisture => "moisture",
            Biomarker::Texture => "texture",
            Biomarker::DarkCircles => "darkCircles",
        }
    }

    /// Label printed on clinical reports.
    pub fn label(&self) -> &'static str {
        match self {
            Biomarker::Spots => "Melanin Indices",
            Biomarker::Moisture => "Hydration Levels",
            Biomarker::Texture => "Dermal Texture",
            Biomarker::DarkCircles => "Vascular Tone",
        }
    }
}

/// Biomarker scores from one analysis, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisScores {
    #[serde(deserialize_with = "de_score")]
    pub spots: u8,
    #[serde(deserialize_with = "de_score")]
    pub moisture: u8,
    #[serde(deserialize_with = "de_score")]
    pub texture: u8,
    #[serde(deserialize_with = "de_score")]
    pub dark_circles: u8,
}

impl AnalysisScores {
    /// Build scores, clamping each value to the valid range.
    pub fn new(spots: f64, moisture: f64, texture: f64, dark_circles: f64) -> Self {
        Self {
            spots: clamp_score(spots),
            moisture: clamp_score(moisture),
            texture: clamp_score(texture),
            dark_circles: clamp_score(dark_circles),
        }
    }

    pub fn get(&self, biomarker: Biomarker) -> u8 {
        match biomarker {
            Biomarker::Spots => self.spots,
            Biomarker::Moisture => self.moisture,
            Biomarker::Texture => self.texture,
            Biomarker::DarkCircles => self.dark_circles,
        }
    }

    /// The lowest-scoring biomarker (lower score = more concern).
    pub fn lowest(&self) -> Biomarker {
        Biomarker::ALL
            .into_iter()
            .min_by_key(|b| self.get(*b))
            .unwrap_or(Biomarker::Moisture)
    }
}

fn de_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_score(raw))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

fn default_in_stock() -> bool {
    true
}

/// A product owned by the content store. The app only reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,

    /// Free-text category tag (e.g. "hydration")
    #[serde(rename = "targetIssue", default, deserialize_with = "null_as_default")]
    pub target_issue: String,

    #[serde(
        rename = "imageUrl",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,

    #[serde(rename = "inStock", default = "default_in_stock", deserialize_with = "null_as_true")]
    pub in_stock: bool,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        target_issue: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            target_issue: target_issue.into(),
            image_url: None,
            in_stock: true,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Weak reference to this product, as stored in scan records.
    pub fn reference(&self) -> ProductRef {
        ProductRef {
            id: self.id.clone(),
        }
    }
}

/// Weak reference to a product by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRef {
    #[serde(rename = "_ref")]
    pub id: String,
}

/// One entry of the append-only scan log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub date: DateTime<Utc>,
    pub user_id: String,
    pub scores: AnalysisScores,
    #[serde(default)]
    pub recommended_products: Vec<ProductRef>,
}

impl ScanRecord {
    pub fn new(user_id: impl Into<String>, scores: AnalysisScores, products: &[Product]) -> Self {
        Self {
            date: Utc::now(),
            user_id: user_id.into(),
            scores,
            recommended_products: products.iter().map(Product::reference).collect(),
        }
    }
}

/// Client-local cart: an ordered set of products keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CartState {
    items: Vec<Product>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product. Returns false if it was already in the cart.
    pub fn add(&mut self, product: Product) -> bool {
        if self.contains(&product.id) {
            return false;
        }
        self.items.push(product);
        true
    }

    /// Remove a product by id. Returns false if it was not in the cart.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|p| p.id != product_id);
        self.items.len() != before
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.items.iter().any(|p| p.id == product_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|p| p.id.as_str())
    }

    pub fn products(&self) -> &[Product] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(|p| p.price).sum()
    }
}

/// A research snippet backing a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchInsight {
    pub insight: String,
    pub source_title: String,
    pub source_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scores_wire_keys() {
        let scores = AnalysisScores::new(78.0, 42.0, 85.0, 64.0);
        let json = serde_json::to_value(scores).unwrap();
        assert_eq!(json["darkCircles"], 64);
        assert_eq!(json["spots"], 78);
    }

    #[test]
    fn test_scores_deserialize_clamps() {
        let scores: AnalysisScores = serde_json::from_value(serde_json::json!({
            "spots": 140,
            "moisture": -3,
            "texture": 55.6,
            "darkCircles": 64
        }))
        .unwrap();
        assert_eq!(scores.spots, 100);
        assert_eq!(scores.moisture, 0);
        assert_eq!(scores.texture, 56);
    }

    #[test]
    fn test_lowest_biomarker() {
        let scores = AnalysisScores::new(78.0, 42.0, 85.0, 64.0);
        assert_eq!(scores.lowest(), Biomarker::Moisture);
    }

    #[test]
    fn test_lowest_tie_prefers_declaration_order() {
        let scores = AnalysisScores::new(50.0, 60.0, 50.0, 70.0);
        assert_eq!(scores.lowest(), Biomarker::Spots);
    }

    #[test]
    fn test_product_tolerates_nulls() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "name": "Serum",
            "price": null,
            "targetIssue": "hydration",
            "imageUrl": null,
            "inStock": null
        }))
        .unwrap();
        assert_eq!(product.price, 0.0);
        assert!(product.image_url.is_none());
        assert!(product.in_stock);
    }

    #[test]
    fn test_cart_add_is_idempotent() {
        let mut cart = CartState::new();
        let serum = Product::new("p1", "Serum", 124.0, "hydration");

        assert!(cart.add(serum.clone()));
        assert!(!cart.add(serum));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total_price(), 124.0);
    }

    #[test]
    fn test_cart_remove() {
        let mut cart = CartState::new();
        cart.add(Product::new("p1", "Serum", 124.0, "hydration"));
        cart.add(Product::new("p2", "Cream", 95.0, "hydration"));

        assert!(cart.remove("p1"));
        assert!(!cart.remove("p1"));
        assert_eq!(cart.ids().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[test]
    fn test_scan_record_references_products() {
        let products = vec![Product::new("p1", "Serum", 124.0, "hydration")];
        let record = ScanRecord::new("guest-user", AnalysisScores::new(1.0, 2.0, 3.0, 4.0), &products);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["recommendedProducts"][0]["_ref"], "p1");
        assert_eq!(json["userId"], "guest-user");
    }

    proptest! {
        #[test]
        fn prop_clamped_scores_in_range(a in any::<f64>(), b in any::<f64>(), c in any::<f64>(), d in any::<f64>()) {
            let scores = AnalysisScores::new(a, b, c, d);
            for biomarker in Biomarker::ALL {
                prop_assert!(scores.get(biomarker) <= SCORE_MAX);
            }
        }
    }
}
