//! Keyword/pattern scoring classifier
//!
//! Each intent kind has a weighted keyword table; a request's score for a
//! kind is the sum of matched keyword weights, capped below 1.0. A prior
//! intent in the same session nudges ties toward continuity. When the top
//! score stays under the configured threshold the request is classified
//! `Unknown` but keeps its extracted parameters.

use super::params;
use super::{Intent, IntentKind, ParamValue, SessionContext};
use crate::registry::{capabilities, Capability};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Classifier tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Minimum top-candidate confidence; below it the result is `Unknown`
    pub threshold: f64,

    /// Bonus added to the prior session intent's score
    pub context_bonus: f64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            context_bonus: 0.1,
        }
    }
}

/// Weighted keyword table per intent kind
///
/// Single-word keywords match on word prefix (so "restaurant" also hits
/// "restaurants"); multi-word keywords match as substrings.
const KEYWORDS: &[(IntentKind, &[(&str, f64)])] = &[
    (
        IntentKind::Search,
        &[
            ("find", 0.35),
            ("search", 0.35),
            ("restaurant", 0.40),
            ("look for", 0.30),
            ("where", 0.25),
            ("nearby", 0.20),
            ("near me", 0.20),
            ("cafe", 0.30),
            ("bar", 0.25),
            ("hotel", 0.30),
            ("attraction", 0.30),
        ],
    ),
    (
        IntentKind::Recommendation,
        &[
            ("recommend", 0.45),
            ("suggest", 0.40),
            ("best", 0.30),
            ("top", 0.25),
            ("should i", 0.30),
            ("what's good", 0.35),
            ("favorite", 0.25),
            ("worth", 0.20),
        ],
    ),
    (
        IntentKind::Analysis,
        &[
            ("analyze", 0.45),
            ("analyse", 0.45),
            ("review", 0.35),
            ("compare", 0.35),
            ("sentiment", 0.40),
            ("rating", 0.25),
            ("pros and cons", 0.40),
        ],
    ),
    (
        IntentKind::Itinerary,
        &[
            ("itinerary", 0.50),
            ("plan", 0.35),
            ("trip", 0.30),
            ("schedule", 0.30),
            ("day trip", 0.35),
            ("agenda", 0.30),
            ("visit", 0.20),
        ],
    ),
    (
        IntentKind::Information,
        &[
            ("what is", 0.35),
            ("tell me about", 0.40),
            ("information", 0.35),
            ("history", 0.25),
            ("when does", 0.30),
            ("hours", 0.30),
            ("how do i get", 0.35),
            ("weather", 0.30),
        ],
    ),
];

const CONFIDENCE_CAP: f64 = 0.95;

/// Classifies raw requests into intents; never raises
#[derive(Debug, Clone)]
pub struct IntentAnalyzer {
    config: IntentConfig,
}

impl IntentAnalyzer {
    pub fn new() -> Self {
        Self::with_config(IntentConfig::default())
    }

    pub fn with_config(config: IntentConfig) -> Self {
        Self { config }
    }

    /// Classify a raw request into an [`Intent`]
    ///
    /// An empty or unmatchable request yields `Unknown` with confidence 0;
    /// a matchable one that stays below the threshold yields `Unknown` with
    /// the best-effort parameters retained.
    pub fn classify(&self, raw_text: &str, session: &SessionContext) -> Intent {
        let parameters = params::extract(raw_text);
        let text = raw_text.trim();
        if text.is_empty() {
            return Intent::unknown();
        }

        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let mut best: Option<(IntentKind, f64)> = None;
        for (kind, table) in KEYWORDS {
            let mut score: f64 = table
                .iter()
                .filter(|(keyword, _)| keyword_matches(keyword, &lower, &words))
                .map(|(_, weight)| weight)
                .sum();
            if session.prior_intent == Some(*kind) && score > 0.0 {
                score += self.config.context_bonus;
            }
            score = score.min(CONFIDENCE_CAP);

            let replace = match best {
                None => score > 0.0,
                Some((_, best_score)) => score > best_score,
            };
            if replace {
                best = Some((*kind, score));
            }
        }

        match best {
            Some((kind, confidence)) if confidence >= self.config.threshold => {
                tracing::debug!(%kind, confidence, "classified intent");
                Intent {
                    kind,
                    confidence,
                    required_capabilities: required_capabilities(kind, &parameters, &words),
                    parameters,
                }
            }
            _ => {
                tracing::debug!("request below confidence threshold, returning unknown");
                Intent {
                    kind: IntentKind::Unknown,
                    confidence: 0.0,
                    required_capabilities: BTreeSet::new(),
                    parameters,
                }
            }
        }
    }
}

impl Default for IntentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn keyword_matches(keyword: &str, lower: &str, words: &[&str]) -> bool {
    if keyword.contains(' ') {
        lower.contains(keyword)
    } else {
        words.iter().any(|w| w.starts_with(keyword))
    }
}

/// Map an intent kind (plus extracted hints) to the capability set a tool
/// must offer to satisfy it
fn required_capabilities(
    kind: IntentKind,
    parameters: &BTreeMap<String, ParamValue>,
    words: &[&str],
) -> BTreeSet<Capability> {
    match kind {
        IntentKind::Search => {
            let food_request = parameters.contains_key("meal_type")
                || parameters.contains_key("cuisine")
                || ["restaurant", "food", "eat", "cafe", "dining"]
                    .iter()
                    .any(|t| words.iter().any(|w| w.starts_with(t)));
            if food_request {
                capabilities(&["restaurant_search"])
            } else {
                capabilities(&["destination_search"])
            }
        }
        IntentKind::Recommendation => capabilities(&["recommendation"]),
        IntentKind::Analysis => capabilities(&["review_analysis"]),
        IntentKind::Itinerary => capabilities(&["itinerary_planning"]),
        IntentKind::Information => capabilities(&["local_information"]),
        IntentKind::Unknown => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Intent {
        IntentAnalyzer::new().classify(text, &SessionContext::default())
    }

    #[test]
    fn test_restaurant_search_classification() {
        let intent = classify("Find restaurants in Central district for lunch");

        assert_eq!(intent.kind, IntentKind::Search);
        assert!(intent.confidence >= 0.7, "confidence {}", intent.confidence);
        assert!(intent
            .required_capabilities
            .contains(&Capability::parse("restaurant_search").unwrap()));
        assert_eq!(
            intent.parameters.get("district").and_then(|p| p.as_text()),
            Some("Central district")
        );
        assert_eq!(
            intent.parameters.get("meal_type").and_then(|p| p.as_text()),
            Some("lunch")
        );
    }

    #[test]
    fn test_non_food_search_maps_to_destination() {
        let intent = classify("search for attractions nearby");
        assert_eq!(intent.kind, IntentKind::Search);
        assert!(intent
            .required_capabilities
            .contains(&Capability::parse("destination_search").unwrap()));
    }

    #[test]
    fn test_recommendation_classification() {
        let intent = classify("recommend the best rooftop spots");
        assert_eq!(intent.kind, IntentKind::Recommendation);
        assert!(intent.confidence >= 0.5);
    }

    #[test]
    fn test_itinerary_classification() {
        let intent = classify("plan a 3 day trip itinerary");
        assert_eq!(intent.kind, IntentKind::Itinerary);
        assert!(intent
            .required_capabilities
            .contains(&Capability::parse("itinerary_planning").unwrap()));
        assert_eq!(
            intent.parameters.get("duration_days"),
            Some(&ParamValue::Number(3.0))
        );
    }

    #[test]
    fn test_analysis_classification() {
        let intent = classify("analyze the reviews and compare sentiment");
        assert_eq!(intent.kind, IntentKind::Analysis);
    }

    #[test]
    fn test_information_classification() {
        let intent = classify("tell me about the history and opening hours");
        assert_eq!(intent.kind, IntentKind::Information);
    }

    #[test]
    fn test_empty_request_is_unknown_zero_confidence() {
        let intent = classify("");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.required_capabilities.is_empty());
    }

    #[test]
    fn test_below_threshold_keeps_parameters() {
        // "where" alone scores 0.25 < 0.5, but the district still extracts
        let intent = classify("where in the Central district");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert_eq!(intent.confidence, 0.0);
        assert_eq!(
            intent.parameters.get("district").and_then(|p| p.as_text()),
            Some("Central district")
        );
    }

    #[test]
    fn test_prior_intent_nudges_ties() {
        let analyzer = IntentAnalyzer::new();
        // "best trip" scores Recommendation 0.30 vs Itinerary 0.30
        let neutral = analyzer.classify("best trip", &SessionContext::default());
        let nudged = analyzer.classify(
            "best trip",
            &SessionContext::with_prior(IntentKind::Itinerary),
        );

        // Neither crosses the threshold alone, but the nudge decides the
        // winner once it does
        assert_eq!(neutral.kind, IntentKind::Unknown);
        assert_eq!(nudged.kind, IntentKind::Unknown);

        let nudged = analyzer.classify(
            "best trip plan",
            &SessionContext::with_prior(IntentKind::Itinerary),
        );
        assert_eq!(nudged.kind, IntentKind::Itinerary);
    }

    #[test]
    fn test_confidence_is_capped() {
        let intent =
            classify("find and search restaurants cafes bars hotels attractions near me nearby");
        assert!(intent.confidence <= 0.95);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        for text in ["!!!", "\u{0}\u{1}", "     ", "12345", "の"] {
            let intent = classify(text);
            assert_eq!(intent.kind, IntentKind::Unknown);
        }
    }
}
