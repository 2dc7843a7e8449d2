//! Best-effort parameter extraction from raw request text
//!
//! Extraction is independent of classification: even a request that ends
//! up `Unknown` keeps whatever parameters could be pulled out of it.

use super::ParamValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static DISTRICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bin\s+(?:the\s+)?([A-Za-z][A-Za-z ]*?(?:district|quarter|area|neighborhood|neighbourhood))\b",
    )
    .unwrap()
});

static MEAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(breakfast|brunch|lunch|dinner)\b").unwrap());

static PARTY_SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:for|party of|table for|group of)\s+(\d{1,3})\s*(?:people|persons|guests)?\b")
        .unwrap()
});

static DAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})[-\s]?days?\b").unwrap());

const CUISINES: &[&str] = &[
    "italian", "japanese", "chinese", "thai", "indian", "mexican", "french", "korean",
    "vietnamese", "greek", "spanish", "seafood", "vegan", "vegetarian",
];

const BUDGET_TERMS: &[(&str, &str)] = &[
    ("cheap", "low"),
    ("budget", "low"),
    ("affordable", "low"),
    ("inexpensive", "low"),
    ("mid-range", "medium"),
    ("moderate", "medium"),
    ("upscale", "high"),
    ("fancy", "high"),
    ("luxury", "high"),
    ("fine dining", "high"),
    ("expensive", "high"),
];

/// Pull whatever structured parameters the text yields
pub fn extract(text: &str) -> BTreeMap<String, ParamValue> {
    let mut params = BTreeMap::new();
    let lower = text.to_lowercase();

    if let Some(caps) = DISTRICT_RE.captures(text) {
        // Keep the caller's original casing ("Central district")
        params.insert(
            "district".to_string(),
            ParamValue::Text(caps[1].trim().to_string()),
        );
    }

    if let Some(caps) = MEAL_RE.captures(text) {
        params.insert(
            "meal_type".to_string(),
            ParamValue::Text(caps[1].to_lowercase()),
        );
    }

    if let Some(caps) = PARTY_SIZE_RE.captures(text) {
        if let Ok(size) = caps[1].parse::<f64>() {
            params.insert("party_size".to_string(), ParamValue::Number(size));
        }
    }

    if let Some(caps) = DAYS_RE.captures(text) {
        if let Ok(days) = caps[1].parse::<f64>() {
            params.insert("duration_days".to_string(), ParamValue::Number(days));
        }
    }

    let cuisines: Vec<String> = CUISINES
        .iter()
        .filter(|c| lower.contains(**c))
        .map(|c| c.to_string())
        .collect();
    if !cuisines.is_empty() {
        params.insert("cuisine".to_string(), ParamValue::List(cuisines));
    }

    for (term, level) in BUDGET_TERMS {
        if lower.contains(term) {
            params.insert("budget".to_string(), ParamValue::Text(level.to_string()));
            break;
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_keeps_original_casing() {
        let params = extract("Find restaurants in Central district for lunch");
        assert_eq!(
            params.get("district"),
            Some(&ParamValue::Text("Central district".to_string()))
        );
    }

    #[test]
    fn test_district_with_article() {
        let params = extract("what's happening in the Old Quarter tonight");
        assert_eq!(
            params.get("district"),
            Some(&ParamValue::Text("Old Quarter".to_string()))
        );
    }

    #[test]
    fn test_meal_type_lowercased() {
        let params = extract("Best spots for Dinner downtown");
        assert_eq!(
            params.get("meal_type"),
            Some(&ParamValue::Text("dinner".to_string()))
        );
    }

    #[test]
    fn test_party_size() {
        let params = extract("table for 6 people tonight");
        assert_eq!(params.get("party_size"), Some(&ParamValue::Number(6.0)));
    }

    #[test]
    fn test_cuisine_list() {
        let params = extract("italian or japanese food near me");
        assert_eq!(
            params.get("cuisine"),
            Some(&ParamValue::List(vec![
                "italian".to_string(),
                "japanese".to_string()
            ]))
        );
    }

    #[test]
    fn test_budget_levels() {
        let params = extract("cheap eats around here");
        assert_eq!(
            params.get("budget"),
            Some(&ParamValue::Text("low".to_string()))
        );

        let params = extract("somewhere upscale for our anniversary");
        assert_eq!(
            params.get("budget"),
            Some(&ParamValue::Text("high".to_string()))
        );
    }

    #[test]
    fn test_duration_days() {
        let params = extract("plan a 3 day trip");
        assert_eq!(params.get("duration_days"), Some(&ParamValue::Number(3.0)));
    }

    #[test]
    fn test_no_matches() {
        assert!(extract("hello").is_empty());
    }
}
