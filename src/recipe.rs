use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One ingredient line as produced by the external recipe source.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(alias = "quantity_phrase", default)]
    pub quantity: String,
}

/// A dish as handed over by the external recipe source. The pipeline only
/// consumes the ingredient list; the dish type drives serving-size lookup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Recipe {
    #[serde(alias = "title")]
    pub dish_name: String,
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub declared_dish_type: Option<String>,
}

impl Recipe {
    pub fn from_json(content: &str) -> Result<Recipe> {
        serde_json::from_str(content).context("failed to parse recipe JSON")
    }
}
