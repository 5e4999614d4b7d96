use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api_connection::connection::AssistedNameMatcher;
use crate::ingredient_matcher::IngredientMatcher;
use crate::nutrition_data::{NutritionRecord, NutritionTable, SynonymTable};
use crate::quantity_parser;
use crate::recipe::RecipeIngredient;
use crate::unit_conversion::{to_grams, ConversionTable};

/// Serving weight applied when the dish type has no registered serving size.
pub const DEFAULT_SERVING_GRAMS: f32 = 150.0;

// Per-serving ceilings; anything above these is reported as the cap itself.
const MAX_SERVING_CALORIES: f32 = 1000.0;
const MAX_SERVING_PROTEIN: f32 = 100.0;
const MAX_SERVING_CARBS: f32 = 200.0;
const MAX_SERVING_FAT: f32 = 100.0;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NutrientValues {
    pub calories: f32,
    pub protein: f32,
    pub carbs: f32,
    pub fat: f32,
    pub fiber: f32,
}

/// Outcome of one ingredient's resolve -> standardize -> scale pipeline.
/// Exactly one of `nutrition` and `error` is populated.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedIngredient {
    pub original_name: String,
    pub mapped_name: Option<String>,
    pub quantity_phrase: String,
    pub weight_grams: f32,
    pub nutrition: Option<NutrientValues>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DishTotals {
    pub nutrients: NutrientValues,
    pub total_weight_grams: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerServingNutrition {
    pub calories: f32,
    pub protein: f32,
    pub carbs: f32,
    pub fat: f32,
    pub fiber: f32,
    pub serving_size_grams: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DishEstimate {
    pub totals: DishTotals,
    pub processed: Vec<ProcessedIngredient>,
}

fn round_one_decimal(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

fn sanitize(value: f32, field: &str, name: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!(%name, field, "non-finite nutrient value coerced to 0");
        0.0
    }
}

impl DishEstimate {
    /// Scales dish totals to a target serving weight, rounding calories to
    /// the nearest integer and the other nutrients to one decimal, then
    /// clamping to the per-serving ceilings (and flooring negatives to 0).
    pub fn per_serving(&self, target_serving_grams: f32) -> PerServingNutrition {
        let ratio = target_serving_grams / self.totals.total_weight_grams.max(1.0);
        let n = &self.totals.nutrients;
        PerServingNutrition {
            calories: sanitize(n.calories * ratio, "calories", "per-serving")
                .round()
                .clamp(0.0, MAX_SERVING_CALORIES),
            protein: round_one_decimal(sanitize(n.protein * ratio, "protein", "per-serving"))
                .clamp(0.0, MAX_SERVING_PROTEIN),
            carbs: round_one_decimal(sanitize(n.carbs * ratio, "carbs", "per-serving"))
                .clamp(0.0, MAX_SERVING_CARBS),
            fat: round_one_decimal(sanitize(n.fat * ratio, "fat", "per-serving"))
                .clamp(0.0, MAX_SERVING_FAT),
            fiber: round_one_decimal(sanitize(n.fiber * ratio, "fiber", "per-serving")).max(0.0),
            serving_size_grams: target_serving_grams,
        }
    }
}

/// The dish estimation pipeline: shared read-only tables plus the resolver.
/// A pure function of its inputs; nothing is retained between calls.
pub struct DishEstimator {
    matcher: IngredientMatcher,
    nutrition: Arc<NutritionTable>,
    conversions: Arc<ConversionTable>,
}

impl DishEstimator {
    pub fn new(
        nutrition: Arc<NutritionTable>,
        synonyms: Arc<SynonymTable>,
        conversions: Arc<ConversionTable>,
        assist: Option<AssistedNameMatcher>,
    ) -> Self {
        DishEstimator {
            matcher: IngredientMatcher::new(Arc::clone(&nutrition), synonyms, assist),
            nutrition,
            conversions,
        }
    }

    /// Serving weight for a dish type, defaulting when unregistered.
    pub fn serving_grams(&self, dish_type: Option<&str>) -> f32 {
        dish_type
            .and_then(|t| self.conversions.serving_grams_for(t))
            .unwrap_or(DEFAULT_SERVING_GRAMS)
    }

    /// Processes every ingredient independently and concurrently, then sums
    /// the successful ones. A failed ingredient is reported alongside the
    /// successes and contributes nothing to the totals.
    pub async fn estimate(&self, ingredients: &[RecipeIngredient]) -> DishEstimate {
        let processed = join_all(
            ingredients
                .iter()
                .map(|ingredient| self.process_ingredient(ingredient)),
        )
        .await;

        let mut totals = DishTotals::default();
        for item in &processed {
            if let Some(nutrition) = &item.nutrition {
                totals.nutrients.calories += nutrition.calories;
                totals.nutrients.protein += nutrition.protein;
                totals.nutrients.carbs += nutrition.carbs;
                totals.nutrients.fat += nutrition.fat;
                totals.nutrients.fiber += nutrition.fiber;
                totals.total_weight_grams += item.weight_grams;
            }
        }

        DishEstimate { totals, processed }
    }

    async fn process_ingredient(&self, ingredient: &RecipeIngredient) -> ProcessedIngredient {
        let canonical = match self.matcher.resolve(&ingredient.name).await {
            Some(name) => name,
            None => {
                return ProcessedIngredient {
                    original_name: ingredient.name.clone(),
                    mapped_name: None,
                    quantity_phrase: ingredient.quantity.clone(),
                    weight_grams: 0.0,
                    nutrition: None,
                    error: Some("no match in nutrition table".to_string()),
                };
            }
        };

        let record = match self.nutrition.get(&canonical) {
            Some(record) => record,
            None => {
                // resolve only returns table members, so this is a data bug
                warn!(%canonical, "resolved name missing from nutrition table");
                return ProcessedIngredient {
                    original_name: ingredient.name.clone(),
                    mapped_name: Some(canonical.clone()),
                    quantity_phrase: ingredient.quantity.clone(),
                    weight_grams: 0.0,
                    nutrition: None,
                    error: Some("nutrition record missing".to_string()),
                };
            }
        };

        let parsed = quantity_parser::parse(&ingredient.quantity);
        let weight_grams = to_grams(&parsed, &canonical, &self.conversions);
        debug!(
            name = %ingredient.name,
            %canonical,
            quantity = %ingredient.quantity,
            weight_grams,
            "standardized ingredient"
        );

        ProcessedIngredient {
            original_name: ingredient.name.clone(),
            mapped_name: Some(canonical.clone()),
            quantity_phrase: ingredient.quantity.clone(),
            weight_grams,
            nutrition: Some(scale_nutrition(record, weight_grams)),
            error: None,
        }
    }
}

/// Scales a per-100g record to an actual gram weight, coercing any
/// non-finite result to 0.
fn scale_nutrition(record: &NutritionRecord, weight_grams: f32) -> NutrientValues {
    let scale = weight_grams / 100.0;
    let name = record.canonical_name.as_str();
    NutrientValues {
        calories: sanitize(record.calories_per_100g * scale, "calories", name),
        protein: sanitize(record.protein_per_100g * scale, "protein", name),
        carbs: sanitize(record.carbs_per_100g * scale, "carbs", name),
        fat: sanitize(record.fat_per_100g * scale, "fat", name),
        fiber: sanitize(record.fiber_per_100g * scale, "fiber", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition_data::NutritionRecord;
    use std::collections::HashMap;

    fn record(name: &str, calories: f32) -> NutritionRecord {
        NutritionRecord {
            canonical_name: name.to_string(),
            calories_per_100g: calories,
            protein_per_100g: 2.0,
            carbs_per_100g: 10.0,
            fat_per_100g: 1.0,
            fiber_per_100g: 1.5,
        }
    }

    fn estimator() -> DishEstimator {
        let nutrition = Arc::new(NutritionTable::new(vec![
            record("onion", 40.0),
            record("rice", 130.0),
        ]));
        let synonyms = Arc::new(SynonymTable::new(HashMap::new()));
        let conversions: ConversionTable = serde_json::from_str(
            r#"{
                "unit_ingredient_grams": {"medium": {"onion": 120}},
                "unit_defaults": {"cup": 150, "teaspoon": 5},
                "dish_serving_grams": {"curry": 180}
            }"#,
        )
        .unwrap();
        DishEstimator::new(nutrition, synonyms, Arc::new(conversions), None)
    }

    fn ingredient(name: &str, quantity: &str) -> RecipeIngredient {
        RecipeIngredient {
            name: name.to_string(),
            quantity: quantity.to_string(),
        }
    }

    #[tokio::test]
    async fn test_two_medium_onions_scenario() {
        let estimate = estimator()
            .estimate(&[ingredient("onions", "2 medium")])
            .await;
        let item = &estimate.processed[0];
        assert_eq!(item.mapped_name.as_deref(), Some("onion"));
        assert_eq!(item.weight_grams, 240.0);
        assert_eq!(item.nutrition.as_ref().unwrap().calories, 96.0);
        assert_eq!(estimate.totals.total_weight_grams, 240.0);
        assert_eq!(estimate.totals.nutrients.calories, 96.0);
    }

    #[tokio::test]
    async fn test_unresolved_ingredient_contributes_nothing() {
        let estimate = estimator()
            .estimate(&[
                ingredient("rice", "100 g"),
                ingredient("dragonfruit", "2 cups"),
            ])
            .await;

        assert_eq!(estimate.processed.len(), 2);
        let failed = &estimate.processed[1];
        assert!(failed.nutrition.is_none());
        assert!(failed.error.is_some());
        assert_eq!(failed.weight_grams, 0.0);

        // totals reflect the rice alone
        assert_eq!(estimate.totals.total_weight_grams, 100.0);
        assert_eq!(estimate.totals.nutrients.calories, 130.0);
    }

    #[tokio::test]
    async fn test_unparseable_quantity_is_zero_weight_success() {
        let estimate = estimator().estimate(&[ingredient("rice", "some")]).await;
        let item = &estimate.processed[0];
        assert!(item.error.is_none());
        assert_eq!(item.weight_grams, 0.0);
        assert_eq!(item.nutrition.as_ref().unwrap().calories, 0.0);
    }

    #[tokio::test]
    async fn test_totals_sum_only_successful() {
        let estimate = estimator()
            .estimate(&[
                ingredient("rice", "200 g"),
                ingredient("onion", "1 medium"),
                ingredient("unicorn dust", "1 cup"),
            ])
            .await;
        assert_eq!(estimate.totals.total_weight_grams, 320.0);
        let expected_calories = 130.0 * 2.0 + 40.0 * 1.2;
        assert!((estimate.totals.nutrients.calories - expected_calories).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_per_serving_scaling_and_rounding() {
        let estimate = estimator().estimate(&[ingredient("rice", "200 g")]).await;
        let serving = estimate.per_serving(100.0);
        assert_eq!(serving.calories, 130.0);
        assert_eq!(serving.protein, 2.0);
        assert_eq!(serving.fiber, 1.5);
        assert_eq!(serving.serving_size_grams, 100.0);
    }

    #[tokio::test]
    async fn test_per_serving_clamps_calories_at_cap() {
        let nutrition = Arc::new(NutritionTable::new(vec![record("ghee", 900.0)]));
        let synonyms = Arc::new(SynonymTable::new(HashMap::new()));
        let conversions = Arc::new(ConversionTable::default());
        let estimator = DishEstimator::new(nutrition, synonyms, conversions, None);

        let estimate = estimator.estimate(&[ingredient("ghee", "500 g")]).await;
        // 500 g of ghee over a 500 g serving is 4500 kcal unclamped
        let serving = estimate.per_serving(500.0);
        assert_eq!(serving.calories, 1000.0);
    }

    #[test]
    fn test_per_serving_guards_zero_weight_and_negatives() {
        let estimate = DishEstimate {
            totals: DishTotals {
                nutrients: NutrientValues {
                    calories: -50.0,
                    protein: -1.0,
                    carbs: 0.0,
                    fat: 0.0,
                    fiber: 0.0,
                },
                total_weight_grams: 0.0,
            },
            processed: Vec::new(),
        };
        let serving = estimate.per_serving(150.0);
        assert_eq!(serving.calories, 0.0);
        assert_eq!(serving.protein, 0.0);
    }

    #[tokio::test]
    async fn test_serving_grams_lookup_with_default() {
        let est = estimator();
        assert_eq!(est.serving_grams(Some("curry")), 180.0);
        assert_eq!(est.serving_grams(Some("unknown")), DEFAULT_SERVING_GRAMS);
        assert_eq!(est.serving_grams(None), DEFAULT_SERVING_GRAMS);
    }
}
