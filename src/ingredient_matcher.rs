use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api_connection::connection::AssistedNameMatcher;
use crate::nutrition_data::{NutritionRecord, NutritionTable, SynonymTable};

/// Upper bound on the candidate list handed to the assisted matcher.
const MAX_ASSIST_CANDIDATES: usize = 15;

// Leading/trailing quantity-and-unit tokens, e.g. "2 cups onions" or
// "paneer 200g". The unit word is optional so bare counts are stripped too.
static LEADING_QTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\d+(?:\.\d+)?(?:\s*(?:cups?|tablespoons?|tbsps?|teaspoons?|tsps?|g|kg|ml|l|pounds?|lbs?|oz|katoris?|glass(?:es)?))?\b\s*",
    )
    .unwrap()
});
static TRAILING_QTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\s*\d+(?:\.\d+)?(?:\s*(?:cups?|tablespoons?|tbsps?|teaspoons?|tsps?|g|kg|ml|l|pounds?|lbs?|oz|katoris?|glass(?:es)?))?\s*$",
    )
    .unwrap()
});

// Descriptive modifiers that never change which food an ingredient is.
static MODIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:to taste|as needed|for garnish|chopped|diced|sliced|minced|grated|cubed|pureed|finely|roughly|fresh|dried|powdered|powder|whole|leaves|seeds|boneless|skinless|plain|medium|large|small)\b",
    )
    .unwrap()
});

static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,():;.]").unwrap());

/// Reduces a free-text ingredient phrase to a bare food name: lowercase,
/// quantity/unit tokens stripped, descriptive modifiers removed, punctuation
/// and repeated whitespace collapsed. Falls back to the lowercase-trimmed
/// original when cleaning empties the phrase.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = LEADING_QTY_RE.replace(&lowered, " ");
    let stripped = TRAILING_QTY_RE.replace(&stripped, " ");
    let stripped = MODIFIER_RE.replace_all(&stripped, " ");
    let stripped = PUNCT_RE.replace_all(&stripped, " ");
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        lowered.trim().to_string()
    } else {
        cleaned
    }
}

type MatchStrategy = fn(&str, &NutritionTable, &SynonymTable) -> Option<String>;

/// In-table matching tiers, tried in declared order; the first hit wins.
const MATCH_STRATEGIES: &[(&str, MatchStrategy)] = &[
    ("exact_underscored", match_exact_underscored),
    ("exact_spaced", match_exact_spaced),
    ("synonym", match_synonym),
    ("substring", match_substring),
];

fn match_exact_underscored(name: &str, table: &NutritionTable, _: &SynonymTable) -> Option<String> {
    let underscored = name.replace(' ', "_");
    table.contains(&underscored).then_some(underscored)
}

fn match_exact_spaced(name: &str, table: &NutritionTable, _: &SynonymTable) -> Option<String> {
    table.contains(name).then(|| name.to_string())
}

fn match_synonym(name: &str, table: &NutritionTable, synonyms: &SynonymTable) -> Option<String> {
    // Dead synonym entries (target missing from the table) are skipped.
    let target = synonyms.lookup(name)?;
    table.contains(target).then(|| target.to_string())
}

fn match_substring(name: &str, table: &NutritionTable, _: &SynonymTable) -> Option<String> {
    let underscored = name.replace(' ', "_");
    let candidates: Vec<&NutritionRecord> = table
        .iter()
        .filter(|r| {
            let canonical = r.canonical_name.as_str();
            canonical.contains(underscored.as_str())
                || canonical.contains(name)
                || underscored.contains(canonical)
                || name.contains(canonical)
        })
        .collect();
    pick_candidate(&candidates, name, &underscored).map(|r| r.canonical_name.clone())
}

/// Tie-break for substring candidates, in order: an entry exactly equal to
/// the query (either form), an entry equal to the query with a trailing
/// plural "s" stripped, then the shortest canonical name with earlier table
/// position winning length ties.
fn pick_candidate<'a>(
    candidates: &[&'a NutritionRecord],
    spaced: &str,
    underscored: &str,
) -> Option<&'a NutritionRecord> {
    if let Some(exact) = candidates
        .iter()
        .find(|r| r.canonical_name == spaced || r.canonical_name == underscored)
        .copied()
    {
        return Some(exact);
    }

    let singular_spaced = spaced.strip_suffix('s').unwrap_or(spaced);
    let singular_underscored = underscored.strip_suffix('s').unwrap_or(underscored);
    if let Some(singular) = candidates
        .iter()
        .find(|r| r.canonical_name == singular_spaced || r.canonical_name == singular_underscored)
        .copied()
    {
        return Some(singular);
    }

    candidates
        .iter()
        .min_by_key(|r| r.canonical_name.len())
        .copied()
}

/// Maps free-text ingredient phrases to canonical nutrition-table names
/// through the tiered strategy list, with an optional LLM-assisted fallback
/// for phrases nothing in the table covers.
pub struct IngredientMatcher {
    nutrition: Arc<NutritionTable>,
    synonyms: Arc<SynonymTable>,
    assist: Option<AssistedNameMatcher>,
}

impl IngredientMatcher {
    pub fn new(
        nutrition: Arc<NutritionTable>,
        synonyms: Arc<SynonymTable>,
        assist: Option<AssistedNameMatcher>,
    ) -> Self {
        IngredientMatcher {
            nutrition,
            synonyms,
            assist,
        }
    }

    /// Resolves a raw ingredient phrase to a canonical name, or `None` when
    /// no tier produces a table entry. Never an error: callers exclude
    /// unresolved ingredients from totals.
    pub async fn resolve(&self, raw_name: &str) -> Option<String> {
        let normalized = normalize_name(raw_name);
        if normalized.is_empty() {
            return None;
        }

        for (label, strategy) in MATCH_STRATEGIES {
            if let Some(canonical) = strategy(&normalized, &self.nutrition, &self.synonyms) {
                debug!(raw = raw_name, %canonical, strategy = label, "resolved ingredient");
                return Some(canonical);
            }
        }

        if let Some(assist) = &self.assist {
            let candidates = self.assist_candidates(&normalized);
            if !candidates.is_empty() {
                match assist.best_match(raw_name, &candidates).await {
                    Ok(Some(canonical)) if self.nutrition.contains(&canonical) => {
                        debug!(raw = raw_name, %canonical, strategy = "assisted", "resolved ingredient");
                        return Some(canonical);
                    }
                    Ok(Some(canonical)) => {
                        warn!(raw = raw_name, %canonical, "assisted match not in nutrition table, ignored");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(raw = raw_name, error = %e, "assisted match call failed");
                    }
                }
            }
        }

        debug!(raw = raw_name, %normalized, "no canonical match");
        None
    }

    /// Bounded candidate list for the assisted tier: table entries sharing at
    /// least one word with the normalized phrase, in table order. An empty
    /// list skips the network call entirely.
    fn assist_candidates(&self, normalized: &str) -> Vec<String> {
        let tokens: HashSet<&str> = normalized
            .split([' ', '_'])
            .filter(|t| t.len() > 2)
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        self.nutrition
            .iter()
            .filter(|r| r.canonical_name.split('_').any(|word| tokens.contains(word)))
            .take(MAX_ASSIST_CANDIDATES)
            .map(|r| r.canonical_name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(name: &str) -> NutritionRecord {
        NutritionRecord {
            canonical_name: name.to_string(),
            calories_per_100g: 50.0,
            protein_per_100g: 1.0,
            carbs_per_100g: 10.0,
            fat_per_100g: 0.5,
            fiber_per_100g: 1.0,
        }
    }

    fn test_table() -> Arc<NutritionTable> {
        Arc::new(NutritionTable::new(vec![
            record("onion"),
            record("tomato"),
            record("potato"),
            record("chili"),
            record("chili_powder_red"),
            record("cumin_seeds"),
            record("coriander_leaves"),
            record("wheat_flour"),
            record("chicken_breast"),
            record("chicken_curry_cut"),
            record("green_gram"),
        ]))
    }

    fn test_synonyms() -> Arc<SynonymTable> {
        let mut map = HashMap::new();
        map.insert("dhania".to_string(), "coriander_leaves".to_string());
        map.insert("red chili powder".to_string(), "chili_powder_red".to_string());
        map.insert("mystery herb".to_string(), "unobtainium".to_string());
        Arc::new(SynonymTable::new(map))
    }

    fn matcher() -> IngredientMatcher {
        IngredientMatcher::new(test_table(), test_synonyms(), None)
    }

    #[test]
    fn test_normalize_strips_quantity_and_modifiers() {
        assert_eq!(normalize_name("2 cups Chopped Onions,"), "onions");
        assert_eq!(normalize_name("Paneer (fresh)"), "paneer");
        assert_eq!(normalize_name("1 tbsp finely grated ginger"), "ginger");
        assert_eq!(normalize_name("salt to taste"), "salt");
    }

    #[test]
    fn test_normalize_falls_back_to_original_when_emptied() {
        assert_eq!(normalize_name("Fresh Chopped"), "fresh chopped");
    }

    #[test]
    fn test_normalize_keeps_underscored_tokens_intact() {
        // "seeds" inside an underscored word is not a standalone modifier
        assert_eq!(normalize_name("cumin_seeds"), "cumin_seeds");
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent_on_canonical_names() {
        let m = matcher();
        for name in ["onion", "chili_powder_red", "cumin_seeds", "wheat_flour"] {
            assert_eq!(m.resolve(name).await.as_deref(), Some(name));
        }
    }

    #[tokio::test]
    async fn test_resolve_spaced_form() {
        let m = matcher();
        assert_eq!(m.resolve("wheat flour").await.as_deref(), Some("wheat_flour"));
    }

    #[tokio::test]
    async fn test_resolve_plural_via_substring_tier() {
        let m = matcher();
        assert_eq!(m.resolve("onions").await.as_deref(), Some("onion"));
        assert_eq!(m.resolve("2 medium Tomatoes").await.as_deref(), Some("tomato"));
    }

    #[tokio::test]
    async fn test_resolve_synonym() {
        let m = matcher();
        assert_eq!(m.resolve("dhania").await.as_deref(), Some("coriander_leaves"));
    }

    #[tokio::test]
    async fn test_dead_synonym_is_skipped() {
        let m = matcher();
        assert_eq!(m.resolve("mystery herb").await, None);
    }

    #[tokio::test]
    async fn test_exact_beats_substring_expansion() {
        // "chili" is present verbatim, so the longer chili_powder_red entry
        // never gets a chance
        let m = matcher();
        assert_eq!(m.resolve("chili").await.as_deref(), Some("chili"));
    }

    #[tokio::test]
    async fn test_substring_prefers_shortest_candidate() {
        let m = matcher();
        assert_eq!(m.resolve("chicken").await.as_deref(), Some("chicken_breast"));
    }

    #[tokio::test]
    async fn test_unmatched_without_assist_returns_none() {
        let m = matcher();
        assert_eq!(m.resolve("dragonfruit").await, None);
    }

    #[test]
    fn test_assist_candidates_bounded_and_token_based() {
        let m = matcher();
        let candidates = m.assist_candidates("chicken leg");
        assert!(candidates.contains(&"chicken_breast".to_string()));
        assert!(candidates.contains(&"chicken_curry_cut".to_string()));
        assert!(candidates.len() <= MAX_ASSIST_CANDIDATES);
        assert!(m.assist_candidates("xy").is_empty());
    }
}
