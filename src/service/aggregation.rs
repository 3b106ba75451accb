//! Article-level aggregation of frozen claim verdicts

use crate::model::{ArticleVerdict, Claim, ClaimVerdict, ContextVerdict, FALLBACK_SCORE};

/// Combines per-claim verdicts into an article verdict
pub trait Aggregator: Send + Sync {
    fn aggregate(
        &self,
        claims: &[Claim],
        context_ids: &[String],
        verdicts: &[ClaimVerdict],
    ) -> ArticleVerdict;
}

/// Centrality- and confidence-weighted mean, per context then across contexts
///
/// Fallback verdicts carry no weight but lower the confidence in proportion to
/// their share.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAggregator;

/// Running weighted mean for one group of verdicts
#[derive(Debug, Default)]
struct Tally {
    weighted_truth: f64,
    weighted_confidence: f64,
    weight: f64,
    count: usize,
    fallback: usize,
}

impl Tally {
    fn add(&mut self, verdict: &ClaimVerdict, centrality_weight: f64) {
        self.count += 1;
        if verdict.fallback {
            self.fallback += 1;
            return;
        }
        // Floor keeps zero-confidence verdicts in the mean
        let weight = centrality_weight * (f64::from(verdict.confidence) / 100.0).max(0.01);
        self.weighted_truth += weight * f64::from(verdict.truth_percentage);
        self.weighted_confidence += weight * f64::from(verdict.confidence);
        self.weight += weight;
    }

    fn fallback_share(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.fallback as f64 / self.count as f64
        }
    }

    /// (truth, confidence), or None when every verdict fell back
    fn scores(&self) -> Option<(f64, f64)> {
        (self.weight > 0.0).then(|| {
            (
                self.weighted_truth / self.weight,
                self.weighted_confidence / self.weight * (1.0 - self.fallback_share()),
            )
        })
    }
}

impl Aggregator for WeightedAggregator {
    fn aggregate(
        &self,
        claims: &[Claim],
        context_ids: &[String],
        verdicts: &[ClaimVerdict],
    ) -> ArticleVerdict {
        let centrality_weight = |claim_id: &str| {
            claims
                .iter()
                .find(|c| c.id == claim_id)
                .map(|c| c.centrality.weight())
                .unwrap_or(1.0)
        };

        let mut article = Tally::default();
        let mut context_scores = Vec::new();
        let mut contexts = Vec::with_capacity(context_ids.len());

        for context_id in context_ids {
            let mut tally = Tally::default();
            for verdict in verdicts.iter().filter(|v| &v.context_id == context_id) {
                let weight = centrality_weight(&verdict.claim_id);
                tally.add(verdict, weight);
                article.add(verdict, weight);
            }

            let (truth, confidence) = match tally.scores() {
                Some(scores) => {
                    context_scores.push(scores);
                    scores
                }
                None => (f64::from(FALLBACK_SCORE), f64::from(FALLBACK_SCORE)),
            };

            contexts.push(ContextVerdict {
                context_id: context_id.clone(),
                truth_percentage: to_percentage(truth),
                confidence: to_percentage(confidence),
                verdict_count: tally.count,
                fallback_count: tally.fallback,
            });
        }

        let (truth, confidence) = if context_scores.is_empty() {
            (f64::from(FALLBACK_SCORE), f64::from(FALLBACK_SCORE))
        } else {
            let n = context_scores.len() as f64;
            let truth = context_scores.iter().map(|(t, _)| t).sum::<f64>() / n;
            let confidence = context_scores.iter().map(|(_, c)| c).sum::<f64>() / n;
            // Contexts with no usable verdict still pull article confidence down
            let usable_share = n / contexts.len().max(1) as f64;
            (truth, confidence * usable_share)
        };

        tracing::debug!(
            claims = article.count,
            fallback = article.fallback,
            contexts = contexts.len(),
            truth = truth,
            confidence = confidence,
            "Aggregated article verdict"
        );

        ArticleVerdict {
            truth_percentage: to_percentage(truth),
            confidence: to_percentage(confidence),
            claim_count: article.count,
            fallback_count: article.fallback,
            contexts,
        }
    }
}

fn to_percentage(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}
