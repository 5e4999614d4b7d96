use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

pub const GRAMS_PER_POUND: f32 = 453.592;

/// A quantity phrase reduced to a numeric value and a unit token.
///
/// `unit == None` means the phrase was unparseable. A `value` of 0 with a
/// unit is a valid explicit zero, distinct from parsing failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuantity {
    pub value: f32,
    pub unit: Option<String>,
}

impl ParsedQuantity {
    pub fn unparsed() -> Self {
        ParsedQuantity { value: 0.0, unit: None }
    }

    fn with_unit(value: f32, unit: &str) -> Self {
        ParsedQuantity { value, unit: Some(unit.to_string()) }
    }
}

// The grams/pounds/ml rules are anchored at the start of the phrase and
// word-bounded so "1 glass" never hits the grams rule.
static GRAMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:g|gm|gms|gram|grams)\b").unwrap());
static POUNDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:pound|pounds|lb|lbs)\b").unwrap());
static ML_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:ml|milliliters?|millilitres?)\b").unwrap()
});
static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)\s*(.*)$").unwrap());
static FRACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*/\s*(\d+)\s*(.*)$").unwrap());
static NUMBER_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([a-zA-Z].*)$").unwrap());

const QUALITATIVE_PHRASES: &[&str] = &["to taste", "as needed", "as required"];

/// Maps a raw unit word to its canonical token. Unknown units pass through
/// lowercased, with a trailing plural "s" trimmed.
fn normalize_unit(raw: &str) -> Option<String> {
    let token: String = raw
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if token.is_empty() {
        return None;
    }
    let unit = match token.as_str() {
        "g" | "gm" | "gms" | "gram" | "grams" => "g",
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "ml",
        "kg" | "kgs" | "kilogram" | "kilograms" => "kg",
        "l" | "litre" | "litres" | "liter" | "liters" => "l",
        "cup" | "cups" => "cup",
        "tablespoon" | "tablespoons" | "tbsp" | "tbsps" => "tablespoon",
        "teaspoon" | "teaspoons" | "tsp" | "tsps" => "teaspoon",
        "piece" | "pieces" | "pc" | "pcs" => "piece",
        "clove" | "cloves" => "clove",
        "glass" | "glasses" => "glass",
        "katori" | "katoris" => "katori",
        "pinch" | "pinches" => "pinch",
        "handful" | "handfuls" => "handful",
        "inch" | "inches" => "inch",
        other => {
            if other.len() > 2 && other.ends_with('s') && !other.ends_with("ss") {
                return Some(other[..other.len() - 1].to_string());
            }
            other
        }
    };
    Some(unit.to_string())
}

/// Parses a loosely-formatted quantity phrase. Rules are tried in a fixed
/// order, first match wins; an unmatched phrase yields `{0, None}` rather
/// than an error.
pub fn parse(phrase: &str) -> ParsedQuantity {
    if let Some(caps) = GRAMS_RE.captures(phrase) {
        let value = caps[1].parse::<f32>().unwrap_or(0.0);
        return ParsedQuantity::with_unit(value, "g");
    }

    if let Some(caps) = POUNDS_RE.captures(phrase) {
        let value = caps[1].parse::<f32>().unwrap_or(0.0);
        return ParsedQuantity::with_unit(value * GRAMS_PER_POUND, "g");
    }

    if let Some(caps) = ML_RE.captures(phrase) {
        let value = caps[1].parse::<f32>().unwrap_or(0.0);
        return ParsedQuantity::with_unit(value, "ml");
    }

    if let Some(caps) = RANGE_RE.captures(phrase) {
        let low = caps[1].parse::<f32>().unwrap_or(0.0);
        let high = caps[2].parse::<f32>().unwrap_or(0.0);
        let value = (low + high) / 2.0;
        // Unit comes from the text after the second half of the range.
        return ParsedQuantity { value, unit: normalize_unit(&caps[3]) };
    }

    if let Some(caps) = FRACTION_RE.captures(phrase) {
        let numerator = caps[1].parse::<f32>().unwrap_or(0.0);
        let denominator = caps[2].parse::<f32>().unwrap_or(0.0);
        if denominator == 0.0 {
            debug!(phrase, "fraction with zero denominator treated as unparseable");
            return ParsedQuantity::unparsed();
        }
        return ParsedQuantity { value: numerator / denominator, unit: normalize_unit(&caps[3]) };
    }

    if let Some(caps) = NUMBER_UNIT_RE.captures(phrase) {
        let value = caps[1].parse::<f32>().unwrap_or(0.0);
        return ParsedQuantity { value, unit: normalize_unit(&caps[2]) };
    }

    let lowered = phrase.to_lowercase();
    if QUALITATIVE_PHRASES.iter().any(|p| lowered.contains(p)) {
        return ParsedQuantity::with_unit(0.5, "teaspoon");
    }

    debug!(phrase, "quantity phrase did not match any rule");
    ParsedQuantity::unparsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_literal_grams() {
        assert_eq!(parse("500 g"), ParsedQuantity::with_unit(500.0, "g"));
        assert_eq!(parse("500g"), ParsedQuantity::with_unit(500.0, "g"));
        assert_eq!(parse("400 gms"), ParsedQuantity::with_unit(400.0, "g"));
        assert_eq!(parse("0 g"), ParsedQuantity::with_unit(0.0, "g"));
    }

    #[test]
    fn test_glass_does_not_match_grams() {
        assert_eq!(parse("1 glass"), ParsedQuantity::with_unit(1.0, "glass"));
        assert_eq!(parse("2 glasses"), ParsedQuantity::with_unit(2.0, "glass"));
    }

    #[test]
    fn test_pounds_resolve_to_grams() {
        let parsed = parse("2 lbs");
        assert_eq!(parsed.unit.as_deref(), Some("g"));
        assert_close(parsed.value, 2.0 * GRAMS_PER_POUND);

        let parsed = parse("1 pound");
        assert_close(parsed.value, GRAMS_PER_POUND);
    }

    #[test]
    fn test_milliliters() {
        assert_eq!(parse("250 ml"), ParsedQuantity::with_unit(250.0, "ml"));
    }

    #[test]
    fn test_range_takes_mean_and_trailing_unit() {
        assert_eq!(parse("2-3 cups"), ParsedQuantity::with_unit(2.5, "cup"));
        assert_eq!(parse("1 - 2 tbsp"), ParsedQuantity::with_unit(1.5, "tablespoon"));
    }

    #[test]
    fn test_fraction() {
        assert_eq!(parse("1/2 cup"), ParsedQuantity::with_unit(0.5, "cup"));
        assert_eq!(parse("3/4 tsp"), ParsedQuantity::with_unit(0.75, "teaspoon"));
        assert_eq!(parse("1/0 cup"), ParsedQuantity::unparsed());
    }

    #[test]
    fn test_number_with_unit_word() {
        assert_eq!(parse("2 medium"), ParsedQuantity::with_unit(2.0, "medium"));
        assert_eq!(parse("3 tbsp"), ParsedQuantity::with_unit(3.0, "tablespoon"));
        assert_eq!(parse("4 cloves"), ParsedQuantity::with_unit(4.0, "clove"));
        assert_eq!(parse("1.5 katori"), ParsedQuantity::with_unit(1.5, "katori"));
    }

    #[test]
    fn test_qualitative_phrases() {
        assert_eq!(parse("to taste"), ParsedQuantity::with_unit(0.5, "teaspoon"));
        assert_eq!(parse("salt as needed"), ParsedQuantity::with_unit(0.5, "teaspoon"));
        assert_eq!(parse("as required"), ParsedQuantity::with_unit(0.5, "teaspoon"));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse(""), ParsedQuantity::unparsed());
        assert_eq!(parse("a few"), ParsedQuantity::unparsed());
        assert_eq!(parse("some"), ParsedQuantity::unparsed());
    }
}
