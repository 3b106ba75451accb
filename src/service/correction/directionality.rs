//! Detection of verdicts whose score contradicts their own reasoning

use regex::Regex;

use crate::model::config::DirectionalityConfig;

/// Phrases stating that the claim holds
const AFFIRMING_PHRASES: &[&str] = &[
    "confirms",
    "confirmed",
    "supports",
    "supported",
    "corroborates",
    "corroborated",
    "consistent with",
    "verified",
    "substantiated",
    "accurate",
    "is true",
    "is correct",
    "holds true",
    "demonstrates",
    "shows that",
];

/// Phrases stating that the claim does not hold
///
/// Matched first and blanked out, so "not supported" never also counts as
/// the affirming "supported".
const NEGATING_PHRASES: &[&str] = &[
    "not supported",
    "not confirmed",
    "not true",
    "not accurate",
    "no evidence",
    "unsupported",
    "unsubstantiated",
    "contradicts",
    "contradicted",
    "refutes",
    "refuted",
    "disproves",
    "disproven",
    "debunked",
    "false",
    "inaccurate",
    "incorrect",
    "inconsistent with",
    "misleading",
];

/// Distinct signal phrases found in a reasoning text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Polarity {
    pub affirming: usize,
    pub negating: usize,
}

pub struct SignalMatcher {
    affirming: Vec<Regex>,
    negating: Vec<Regex>,
}

impl SignalMatcher {
    pub fn new() -> Self {
        Self {
            affirming: compile(AFFIRMING_PHRASES),
            negating: compile(NEGATING_PHRASES),
        }
    }

    pub fn polarity(&self, reasoning: &str) -> Polarity {
        let mut text = reasoning.to_string();
        let mut negating = 0;
        for pattern in &self.negating {
            if pattern.is_match(&text) {
                negating += 1;
                text = pattern.replace_all(&text, " ").into_owned();
            }
        }

        let affirming = self
            .affirming
            .iter()
            .filter(|pattern| pattern.is_match(&text))
            .count();

        Polarity {
            affirming,
            negating,
        }
    }

    /// Corrected truth percentage when score and reasoning disagree
    pub fn corrected_truth(
        &self,
        truth: u8,
        reasoning: &str,
        config: &DirectionalityConfig,
    ) -> Option<u8> {
        let polarity = self.polarity(reasoning);

        let inverted = if truth >= config.high_score_threshold {
            polarity.negating > polarity.affirming
        } else if truth <= config.low_score_threshold {
            polarity.affirming >= config.min_affirming_signals
                && polarity.affirming > polarity.negating
        } else {
            false
        };

        inverted.then(|| 100u8.saturating_sub(truth))
    }
}

impl Default for SignalMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(phrases: &[&str]) -> Vec<Regex> {
    phrases
        .iter()
        .filter_map(|phrase| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).ok())
        .collect()
}
