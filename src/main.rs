use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use dish_nutrition::api_connection::connection::AssistedNameMatcher;
use dish_nutrition::cli::parse_args;
use dish_nutrition::dish_aggregator::DishEstimator;
use dish_nutrition::nutrition_data::{load_nutrition_table, load_synonym_table};
use dish_nutrition::recipe::Recipe;
use dish_nutrition::unit_conversion::ConversionTable;

const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dish_nutrition=info".into()),
        )
        .init();

    let cli_args = parse_args();

    // Reference data is mandatory: refuse to estimate anything without it.
    let nutrition = Arc::new(
        load_nutrition_table(Path::new(&cli_args.nutrition_table))
            .with_context(|| format!("failed to load nutrition table '{}'", cli_args.nutrition_table))?,
    );
    let synonyms = Arc::new(
        load_synonym_table(Path::new(&cli_args.synonym_table))
            .with_context(|| format!("failed to load synonym table '{}'", cli_args.synonym_table))?,
    );
    let conversions = Arc::new(
        ConversionTable::load(Path::new(&cli_args.conversion_table))
            .with_context(|| format!("failed to load conversion table '{}'", cli_args.conversion_table))?,
    );
    info!(
        records = nutrition.len(),
        synonyms = synonyms.len(),
        "reference tables loaded"
    );

    let assist = if !cli_args.no_assist && env::var(API_KEY_ENV_VAR).is_ok() {
        Some(AssistedNameMatcher::from_env(API_KEY_ENV_VAR))
    } else {
        info!("assisted name matching disabled");
        None
    };

    let estimator = DishEstimator::new(nutrition, synonyms, conversions, assist);

    let recipe_content = fs::read_to_string(&cli_args.recipe_file)
        .await
        .with_context(|| format!("failed to read recipe file '{}'", cli_args.recipe_file))?;
    let recipe = Recipe::from_json(&recipe_content)?;

    println!("Estimating nutrition for: {}", recipe.dish_name);
    let estimate = estimator.estimate(&recipe.ingredients).await;

    println!("\nIngredients:");
    for item in &estimate.processed {
        match (&item.mapped_name, &item.nutrition, &item.error) {
            (Some(mapped), Some(nutrition), _) => {
                println!(
                    "  {:<28} -> {:<24} {:>8.1} g {:>8.1} kcal",
                    item.original_name, mapped, item.weight_grams, nutrition.calories
                );
            }
            (_, _, Some(error)) => {
                println!("  {:<28} -> skipped ({})", item.original_name, error);
            }
            _ => {}
        }
    }

    let totals = &estimate.totals;
    println!("\nDish totals ({:.0} g):", totals.total_weight_grams);
    println!("  calories: {:.0} kcal", totals.nutrients.calories);
    println!("  protein:  {:.1} g", totals.nutrients.protein);
    println!("  carbs:    {:.1} g", totals.nutrients.carbs);
    println!("  fat:      {:.1} g", totals.nutrients.fat);
    println!("  fiber:    {:.1} g", totals.nutrients.fiber);

    let serving_grams = cli_args
        .serving_grams
        .unwrap_or_else(|| estimator.serving_grams(recipe.declared_dish_type.as_deref()));
    let serving = estimate.per_serving(serving_grams);
    println!("\nPer serving ({:.0} g):", serving.serving_size_grams);
    println!("  calories: {:.0} kcal", serving.calories);
    println!("  protein:  {:.1} g", serving.protein);
    println!("  carbs:    {:.1} g", serving.carbs);
    println!("  fat:      {:.1} g", serving.fat);
    println!("  fiber:    {:.1} g", serving.fiber);

    Ok(())
}
