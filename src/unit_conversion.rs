use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::quantity_parser::ParsedQuantity;

/// Grams per "medium" item when no ingredient-specific weight is registered.
/// Coarser than the piece fallback since size variance is higher.
pub const GENERIC_MEDIUM_GRAMS: f32 = 120.0;

/// Last-resort grams per unit for anything the tables do not cover.
pub const UNKNOWN_UNIT_GRAMS: f32 = 10.0;

/// Absolute fallback weights for common unit tokens, applied only when every
/// configured layer has been exhausted.
fn absolute_unit_grams(unit: &str) -> Option<f32> {
    let grams = match unit {
        "cup" => 150.0,
        "tablespoon" => 15.0,
        "teaspoon" => 5.0,
        "piece" => 100.0,
        "clove" => 5.0,
        "inch" => 15.0,
        "handful" => 30.0,
        "pinch" => 1.0,
        _ => return None,
    };
    Some(grams)
}

/// A global per-unit conversion: either one number for every ingredient, or
/// a map with ingredient-specific entries and an optional "default" key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnitFactor {
    Scalar(f32),
    ByIngredient(HashMap<String, f32>),
}

/// Layered unit -> grams conversion rules. Specificity descends from exact
/// ingredient+unit pairs to generic unit-only defaults so well-covered
/// ingredients get accurate weights while unknown ones degrade gracefully.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionTable {
    /// unit -> ingredient -> grams per unit (e.g. "piece" -> {"egg": 50}).
    #[serde(default)]
    unit_ingredient_grams: HashMap<String, HashMap<String, f32>>,
    /// ingredient -> category name (e.g. "spinach" -> "leafy_green").
    #[serde(default)]
    ingredient_categories: HashMap<String, String>,
    /// category -> unit -> grams per unit (e.g. "leafy_green" -> {"cup": 30}).
    #[serde(default)]
    category_unit_grams: HashMap<String, HashMap<String, f32>>,
    /// unit -> global conversion, scalar or per-ingredient.
    #[serde(default)]
    unit_defaults: HashMap<String, UnitFactor>,
    /// dish type -> serving size in grams.
    #[serde(default)]
    dish_serving_grams: HashMap<String, f32>,
}

impl ConversionTable {
    pub fn load(json_path: &Path) -> Result<ConversionTable> {
        let content = std::fs::read_to_string(json_path)
            .with_context(|| format!("failed to read conversion table at {:?}", json_path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse conversion table at {:?}", json_path))
    }

    fn ingredient_unit_grams(&self, unit: &str, ingredient: &str) -> Option<f32> {
        self.unit_ingredient_grams.get(unit)?.get(ingredient).copied()
    }

    fn category_grams(&self, unit: &str, ingredient: &str) -> Option<f32> {
        let category = self.ingredient_categories.get(ingredient)?;
        self.category_unit_grams.get(category)?.get(unit).copied()
    }

    fn default_grams(&self, unit: &str, ingredient: &str) -> Option<f32> {
        match self.unit_defaults.get(unit)? {
            UnitFactor::Scalar(grams) => Some(*grams),
            UnitFactor::ByIngredient(map) => Some(
                map.get(ingredient)
                    .or_else(|| map.get("default"))
                    .copied()
                    .unwrap_or(UNKNOWN_UNIT_GRAMS),
            ),
        }
    }

    pub fn serving_grams_for(&self, dish_type: &str) -> Option<f32> {
        self.dish_serving_grams.get(dish_type).copied()
    }
}

/// Converts a parsed quantity into grams for the given canonical ingredient.
///
/// Total function: any input pair yields a finite, non-negative weight. An
/// unparseable quantity (`unit == None`) weighs nothing.
pub fn to_grams(parsed: &ParsedQuantity, ingredient: &str, table: &ConversionTable) -> f32 {
    let value = if parsed.value.is_finite() && parsed.value > 0.0 {
        parsed.value
    } else {
        0.0
    };
    let unit = match parsed.unit.as_deref() {
        Some(u) => u,
        None => return 0.0,
    };

    // Grams and milliliters pass through, ml under a 1 g/ml approximation.
    if unit == "g" || unit == "ml" {
        return value;
    }

    if unit == "piece" {
        if let Some(grams) = table.ingredient_unit_grams("piece", ingredient) {
            return value * grams;
        }
        if let Some(UnitFactor::Scalar(grams)) = table.unit_defaults.get("piece") {
            return value * grams;
        }
        // fall through to the generic layers
    }

    if unit == "medium" {
        let grams = table
            .ingredient_unit_grams("medium", ingredient)
            .unwrap_or(GENERIC_MEDIUM_GRAMS);
        return value * grams;
    }

    if let Some(grams) = table.category_grams(unit, ingredient) {
        return value * grams;
    }

    if let Some(grams) = table.default_grams(unit, ingredient) {
        return value * grams;
    }

    if let Some(grams) = absolute_unit_grams(unit) {
        return value * grams;
    }

    debug!(unit, ingredient, "unrecognized unit, applying flat fallback weight");
    value * UNKNOWN_UNIT_GRAMS
}
