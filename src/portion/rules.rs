// ABOUTME: Rule-based portion table mapping food name substrings to canned gram ranges
// ABOUTME: Serves as the fallback when LLM estimation is unavailable or incomplete

use crate::models::{Portion, PortionMethod};

/// One portion rule: keyword substrings and the gram range they map to
struct PortionRule {
    keywords: &'static [&'static str],
    grams_mean: f64,
    grams_min: f64,
    grams_max: f64,
}

impl PortionRule {
    const fn portion(&self) -> Portion {
        Portion {
            grams_min: Some(self.grams_min),
            grams_max: Some(self.grams_max),
            grams_mean: self.grams_mean,
            method: PortionMethod::Rule,
        }
    }
}

/// Common single-serving estimates, checked in order
const RULES: &[PortionRule] = &[
    PortionRule {
        keywords: &["pasta", "spaghetti", "noodle"],
        grams_mean: 150.0,
        grams_min: 110.0,
        grams_max: 220.0,
    },
    PortionRule {
        keywords: &["rice"],
        grams_mean: 120.0,
        grams_min: 80.0,
        grams_max: 180.0,
    },
    PortionRule {
        keywords: &["chicken", "meat", "beef"],
        grams_mean: 150.0,
        grams_min: 100.0,
        grams_max: 250.0,
    },
    PortionRule {
        keywords: &["vegetable", "broccoli", "carrot"],
        grams_mean: 80.0,
        grams_min: 50.0,
        grams_max: 150.0,
    },
    PortionRule {
        keywords: &["bread", "toast"],
        grams_mean: 50.0,
        grams_min: 30.0,
        grams_max: 80.0,
    },
];

/// Fallback range for foods no rule recognizes
const DEFAULT_RULE: PortionRule = PortionRule {
    keywords: &[],
    grams_mean: 150.0,
    grams_min: 110.0,
    grams_max: 220.0,
};

/// Look up the canned portion for a food name
///
/// Matching is case-insensitive over name substrings; unrecognized foods get
/// the default range.
#[must_use]
pub fn rule_based_portion(food_name: &str) -> Portion {
    let name = food_name.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|keyword| name.contains(keyword)))
        .unwrap_or(&DEFAULT_RULE)
        .portion()
}
