//! Post-generation correction of verdict polarity and contestation

use std::collections::HashMap;

use crate::model::config::DirectionalityConfig;
use crate::model::{EvidenceItem, VerdictCorrection};
use crate::service::verdicts::PendingVerdicts;

pub mod contestation;
pub mod directionality;

use contestation::correct_contestation;
use directionality::SignalMatcher;

/// Counts of corrections applied to one context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    pub inverted: usize,
    pub downgraded: usize,
    pub pruned: usize,
}

pub struct VerdictCorrector<'a> {
    config: &'a DirectionalityConfig,
    matcher: SignalMatcher,
    evidence: HashMap<&'a str, &'a EvidenceItem>,
}

impl<'a> VerdictCorrector<'a> {
    pub fn new(config: &'a DirectionalityConfig, evidence: &'a [EvidenceItem]) -> Self {
        Self {
            config,
            matcher: SignalMatcher::new(),
            evidence: evidence.iter().map(|e| (e.id.as_str(), e)).collect(),
        }
    }

    /// Correct every generated verdict of one context; fallback verdicts are skipped
    pub fn correct(&self, pending: &mut PendingVerdicts) -> CorrectionReport {
        let mut report = CorrectionReport::default();
        let context_id = pending.context_id().to_string();

        for verdict in pending.verdicts_mut().iter_mut().filter(|v| !v.fallback) {
            if let Some(to) =
                self.matcher
                    .corrected_truth(verdict.truth_percentage, &verdict.reasoning, self.config)
            {
                tracing::debug!(
                    context = %context_id,
                    claim = %verdict.claim_id,
                    from = verdict.truth_percentage,
                    to = to,
                    "Inverting verdict whose reasoning contradicts its score"
                );
                verdict.corrections.push(VerdictCorrection::DirectionInverted {
                    from: verdict.truth_percentage,
                    to,
                });
                verdict.truth_percentage = to;
                report.inverted += 1;
            }

            for correction in correct_contestation(verdict, &self.evidence) {
                match correction {
                    VerdictCorrection::ContestationDowngraded { .. } => report.downgraded += 1,
                    VerdictCorrection::CounterEvidencePruned { .. } => report.pruned += 1,
                    VerdictCorrection::DirectionInverted { .. } => {}
                }
                verdict.corrections.push(correction);
            }
        }

        if report != CorrectionReport::default() {
            tracing::info!(
                context = %context_id,
                inverted = report.inverted,
                downgraded = report.downgraded,
                pruned = report.pruned,
                "Applied verdict corrections"
            );
        }

        report
    }
}
