use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

// Expected column headers of the pre-built nutrition reference CSV.
const NAME_COL: &str = "name";
const CALORIES_COL: &str = "calories_per_100g";
const PROTEIN_COL: &str = "protein_per_100g";
const CARBS_COL: &str = "carbs_per_100g";
const FAT_COL: &str = "fat_per_100g";
const FIBER_COL: &str = "fiber_per_100g";

/// Canonical nutrition facts for one ingredient, per 100 g.
///
/// All nutrient fields are finite and non-negative once loaded; corrupt
/// source cells are coerced to 0 at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionRecord {
    pub canonical_name: String,
    pub calories_per_100g: f32,
    pub protein_per_100g: f32,
    pub carbs_per_100g: f32,
    pub fat_per_100g: f32,
    pub fiber_per_100g: f32,
}

/// Immutable index of canonical ingredients, preserving source order.
///
/// Source order matters: the substring tier of the resolver breaks length
/// ties by first occurrence in the table.
#[derive(Debug, Default)]
pub struct NutritionTable {
    records: Vec<NutritionRecord>,
    by_name: HashMap<String, usize>,
}

impl NutritionTable {
    /// Builds the table from records, keeping the first occurrence of each
    /// canonical name and dropping later duplicates.
    pub fn new(records: Vec<NutritionRecord>) -> Self {
        let mut table = NutritionTable::default();
        for record in records {
            if table.by_name.contains_key(&record.canonical_name) {
                warn!(name = %record.canonical_name, "duplicate canonical name dropped");
                continue;
            }
            table
                .by_name
                .insert(record.canonical_name.clone(), table.records.len());
            table.records.push(record);
        }
        table
    }

    pub fn get(&self, canonical_name: &str) -> Option<&NutritionRecord> {
        self.by_name.get(canonical_name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, canonical_name: &str) -> bool {
        self.by_name.contains_key(canonical_name)
    }

    /// Records in table order.
    pub fn iter(&self) -> impl Iterator<Item = &NutritionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Informal phrase -> canonical name. Entries are allowed to point at names
/// absent from the nutrition table; the resolver skips those at lookup time.
#[derive(Debug, Default)]
pub struct SynonymTable {
    map: HashMap<String, String>,
}

impl SynonymTable {
    pub fn new(map: HashMap<String, String>) -> Self {
        let map = map
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        SynonymTable { map }
    }

    pub fn lookup(&self, phrase: &str) -> Option<&str> {
        self.map.get(phrase).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn parse_nutrient(raw: &str, column: &str, name: &str) -> f32 {
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        Ok(v) => {
            warn!(%name, column, value = v, "out-of-range nutrient coerced to 0");
            0.0
        }
        Err(_) if raw.trim().is_empty() => 0.0,
        Err(_) => {
            warn!(%name, column, value = raw, "unparseable nutrient coerced to 0");
            0.0
        }
    }
}

/// Loads the pre-built nutrition reference CSV. A missing file, missing
/// column, or empty table is fatal: the pipeline must not serve estimates
/// without its reference data.
pub fn load_nutrition_table(csv_path: &Path) -> Result<NutritionTable> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!(
            "nutrition table CSV not found at: {:?}",
            csv_path
        ));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open nutrition table CSV at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = rdr.headers()?.clone();
    let column_index = |col: &str| {
        headers
            .iter()
            .position(|h| h == col)
            .ok_or_else(|| anyhow::anyhow!("column '{}' not found in nutrition table", col))
    };
    let name_idx = column_index(NAME_COL)?;
    let calories_idx = column_index(CALORIES_COL)?;
    let protein_idx = column_index(PROTEIN_COL)?;
    let carbs_idx = column_index(CARBS_COL)?;
    let fat_idx = column_index(FAT_COL)?;
    let fiber_idx = column_index(FIBER_COL)?;

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("failed to read record at row index {}", row_index))?;

        let name = record
            .get(name_idx)
            .ok_or_else(|| anyhow::anyhow!("missing name at row {}", row_index))?
            .trim()
            .to_string();
        if name.is_empty() {
            continue;
        }

        let cell = |idx: usize| record.get(idx).unwrap_or("");
        records.push(NutritionRecord {
            calories_per_100g: parse_nutrient(cell(calories_idx), CALORIES_COL, &name),
            protein_per_100g: parse_nutrient(cell(protein_idx), PROTEIN_COL, &name),
            carbs_per_100g: parse_nutrient(cell(carbs_idx), CARBS_COL, &name),
            fat_per_100g: parse_nutrient(cell(fat_idx), FAT_COL, &name),
            fiber_per_100g: parse_nutrient(cell(fiber_idx), FIBER_COL, &name),
            canonical_name: name,
        });
    }

    if records.is_empty() {
        return Err(anyhow::anyhow!(
            "no valid nutrition records loaded from {:?}",
            csv_path
        ));
    }

    Ok(NutritionTable::new(records))
}

/// Loads the synonym table from a JSON object of phrase -> canonical name.
pub fn load_synonym_table(json_path: &Path) -> Result<SynonymTable> {
    let content = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to read synonym table at {:?}", json_path))?;
    let map: HashMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse synonym table at {:?}", json_path))?;
    Ok(SynonymTable::new(map))
}
