// ABOUTME: Instruction prompts for vision provider calls loaded at compile time
// ABOUTME: Provides the label extraction and portion estimation instructions plus request-text helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Mealsnap Labs

//! # Vision Prompts
//!
//! Instruction prompts sent with every provider call. The long instructions
//! are loaded at compile time from markdown files for easy maintenance; both
//! LLM providers send the same text so their outputs stay contract-identical.

use crate::models::Label;

/// Label extraction instruction requesting the strict JSON items schema
pub const LABEL_INSTRUCTION: &str = include_str!("label_extraction.md");

/// Portion estimation instruction requesting per-item gram ranges
pub const PORTION_INSTRUCTION: &str = include_str!("portion_estimation.md");

/// Short user-turn request accompanying the image on label extraction
pub const LABEL_REQUEST: &str =
    "Identify food items for nutrition mapping; keep list short and specific (2–5).";

/// User-turn request for portion estimation, listing the items to size
#[must_use]
pub fn portion_request_text(labels: &[Label]) -> String {
    let item_names = labels
        .iter()
        .map(|label| label.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Given item names: {item_names}. Return grams per item (min/mean/max).")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portion_request_lists_all_labels() {
        let labels = vec![
            Label {
                name: "spaghetti".to_owned(),
                confidence: 0.9,
                region: None,
            },
            Label {
                name: "broccoli".to_owned(),
                confidence: 0.8,
                region: None,
            },
        ];
        let text = portion_request_text(&labels);
        assert!(text.contains("spaghetti, broccoli"));
        assert!(text.contains("min/mean/max"));
    }

    #[test]
    fn instructions_request_json_payloads() {
        assert!(LABEL_INSTRUCTION.contains("STRICT JSON"));
        assert!(PORTION_INSTRUCTION.contains("Return JSON only"));
    }
}
