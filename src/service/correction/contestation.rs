//! Separation of evidence-backed contestation from baseless disagreement

use std::collections::HashMap;

use crate::model::{ClaimVerdict, ContestationType, EvidenceDirection, EvidenceItem, VerdictCorrection};

/// Reconcile a verdict's contestation with the evidence it cites
///
/// `contested` survives only with documented counter-evidence, and
/// `counter_evidence_ids` ends up holding exactly that evidence. Anything else
/// carries no counter ids.
pub fn correct_contestation(
    verdict: &mut ClaimVerdict,
    evidence: &HashMap<&str, &EvidenceItem>,
) -> Vec<VerdictCorrection> {
    let mut corrections = Vec::new();

    let mut linked: Vec<&EvidenceItem> = Vec::new();
    for id in verdict
        .counter_evidence_ids
        .iter()
        .chain(verdict.contradicting_evidence_ids.iter())
    {
        if let Some(item) = evidence.get(id.as_str())
            && !linked.iter().any(|l| l.id == item.id)
        {
            linked.push(item);
        }
    }

    let previous = std::mem::take(&mut verdict.counter_evidence_ids);

    if verdict.contestation == ContestationType::Contested {
        let documented: Vec<String> = linked
            .iter()
            .filter(|item| item.is_documented_counter_evidence())
            .map(|item| item.id.clone())
            .collect();

        if !documented.is_empty() {
            let removed = removed_ids(&previous, &documented);
            if !removed.is_empty() {
                corrections.push(VerdictCorrection::CounterEvidencePruned { removed });
            }
            verdict.counter_evidence_ids = documented;
            return corrections;
        }

        let has_contradicting = linked
            .iter()
            .any(|item| item.is_probative() && item.direction == EvidenceDirection::Contradicts);
        let to = if has_contradicting {
            ContestationType::Doubted
        } else {
            ContestationType::None
        };
        verdict.contestation = to;
        corrections.push(VerdictCorrection::ContestationDowngraded { to });
    }

    if !previous.is_empty() {
        corrections.push(VerdictCorrection::CounterEvidencePruned { removed: previous });
    }

    corrections
}

fn removed_ids(previous: &[String], kept: &[String]) -> Vec<String> {
    previous
        .iter()
        .filter(|id| !kept.contains(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceCategory, EvidenceDirection};
    use crate::service::testing::evidence_item;

    fn counter(id: &str, category: EvidenceCategory) -> EvidenceItem {
        EvidenceItem {
            category,
            direction: EvidenceDirection::Contradicts,
            ..evidence_item(id, "CTX_1", Some("C1"), 0.8)
        }
    }

    fn contested_verdict(counter_ids: &[&str], contradicting_ids: &[&str]) -> ClaimVerdict {
        let mut verdict = ClaimVerdict::fallback("C1", "CTX_1", "unused");
        verdict.fallback = false;
        verdict.truth_percentage = 30;
        verdict.contestation = ContestationType::Contested;
        verdict.counter_evidence_ids = counter_ids.iter().map(|s| s.to_string()).collect();
        verdict.contradicting_evidence_ids =
            contradicting_ids.iter().map(|s| s.to_string()).collect();
        verdict
    }

    fn index(items: &[EvidenceItem]) -> HashMap<&str, &EvidenceItem> {
        items.iter().map(|e| (e.id.as_str(), e)).collect()
    }

    #[test]
    fn test_documented_counter_evidence_keeps_contested() {
        let items = vec![
            counter("E1", EvidenceCategory::Study),
            counter("E2", EvidenceCategory::Criticism),
        ];
        let mut verdict = contested_verdict(&["E1", "E2"], &[]);

        let corrections = correct_contestation(&mut verdict, &index(&items));

        assert_eq!(verdict.contestation, ContestationType::Contested);
        assert_eq!(verdict.counter_evidence_ids, vec!["E1".to_string()]);
        assert_eq!(
            corrections,
            vec![VerdictCorrection::CounterEvidencePruned {
                removed: vec!["E2".to_string()]
            }]
        );
    }

    #[test]
    fn test_contradicting_ids_count_as_linked_counter_evidence() {
        let items = vec![counter("E3", EvidenceCategory::Statistic)];
        let mut verdict = contested_verdict(&[], &["E3"]);

        let corrections = correct_contestation(&mut verdict, &index(&items));

        assert_eq!(verdict.contestation, ContestationType::Contested);
        assert_eq!(verdict.counter_evidence_ids, vec!["E3".to_string()]);
        assert!(corrections.is_empty());
    }

    #[test]
    fn test_opinion_only_disagreement_is_downgraded_to_doubted() {
        let items = vec![counter("E1", EvidenceCategory::ExpertOpinion)];
        let mut verdict = contested_verdict(&["E1"], &["E1"]);

        correct_contestation(&mut verdict, &index(&items));

        assert_eq!(verdict.contestation, ContestationType::Doubted);
        assert!(verdict.counter_evidence_ids.is_empty());
    }

    #[test]
    fn test_unbacked_contestation_is_downgraded_to_none() {
        let mut verdict = contested_verdict(&["E404"], &[]);

        let corrections = correct_contestation(&mut verdict, &HashMap::new());

        assert_eq!(verdict.contestation, ContestationType::None);
        assert!(verdict.counter_evidence_ids.is_empty());
        assert!(corrections.contains(&VerdictCorrection::ContestationDowngraded {
            to: ContestationType::None
        }));
    }

    #[test]
    fn test_non_probative_counter_evidence_does_not_count() {
        let mut weak = counter("E1", EvidenceCategory::Study);
        weak.probative_score = 0.0;
        let items = vec![weak];
        let mut verdict = contested_verdict(&["E1"], &[]);

        correct_contestation(&mut verdict, &index(&items));

        assert_eq!(verdict.contestation, ContestationType::None);
    }

    #[test]
    fn test_uncontested_verdicts_carry_no_counter_ids() {
        let items = vec![counter("E1", EvidenceCategory::Study)];
        let mut verdict = contested_verdict(&["E1"], &[]);
        verdict.contestation = ContestationType::Doubted;

        correct_contestation(&mut verdict, &index(&items));

        assert_eq!(verdict.contestation, ContestationType::Doubted);
        assert!(verdict.counter_evidence_ids.is_empty());
    }
}
