use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the recipe JSON file
    #[arg(short, long)]
    pub recipe_file: String,

    /// Path to the nutrition reference table CSV
    #[arg(long, default_value = "data/nutrition.csv")]
    pub nutrition_table: String,

    /// Path to the synonym table JSON
    #[arg(long, default_value = "data/synonyms.json")]
    pub synonym_table: String,

    /// Path to the unit conversion table JSON
    #[arg(long, default_value = "data/conversions.json")]
    pub conversion_table: String,

    /// Serving size in grams (overrides the dish-type lookup)
    #[arg(long)]
    pub serving_grams: Option<f32>,

    /// Disable the LLM-assisted name matching fallback
    #[arg(long)]
    pub no_assist: bool,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
