//! Deciding phase of a context's research iteration

use crate::model::DoneReason;

/// What a context does next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Search,
    ContradictionSearch,
    Done(DoneReason),
}

/// Snapshot of everything the decision depends on
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput {
    pub has_claims: bool,
    pub evidence_count: usize,
    pub min_evidence: usize,
    /// Every high-centrality claim has at least one linked evidence item
    pub central_claims_covered: bool,
    pub contradiction_done: bool,
    /// The context tripped the circuit breaker
    pub exhausted: bool,
    pub iterations: usize,
    pub max_iterations: usize,
    pub regular_available: bool,
    pub contradiction_available: bool,
}

impl DecisionInput {
    pub fn is_sufficient(&self) -> bool {
        self.evidence_count >= self.min_evidence && self.central_claims_covered
    }
}

/// Decide the next step for a context
///
/// A context that would otherwise stop runs its contradiction search first
/// whenever a slot can still fund it. The per-context iteration cap limits
/// regular searches only.
pub fn decide(input: &DecisionInput) -> Decision {
    if !input.has_claims {
        return Decision::Done(DoneReason::NoClaims);
    }

    let stop_reason = if input.is_sufficient() {
        Some(DoneReason::Sufficient)
    } else if input.exhausted {
        Some(DoneReason::CircuitBreaker)
    } else if input.iterations >= input.max_iterations {
        Some(DoneReason::ContextBudgetExhausted)
    } else if !input.regular_available {
        Some(DoneReason::BudgetExhausted)
    } else {
        None
    };

    match stop_reason {
        None => Decision::Search,
        Some(_) if !input.contradiction_done && input.contradiction_available => {
            Decision::ContradictionSearch
        }
        Some(reason) => Decision::Done(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> DecisionInput {
        DecisionInput {
            has_claims: true,
            evidence_count: 0,
            min_evidence: 4,
            central_claims_covered: false,
            contradiction_done: false,
            exhausted: false,
            iterations: 0,
            max_iterations: 5,
            regular_available: true,
            contradiction_available: true,
        }
    }

    #[test]
    fn test_searches_while_insufficient() {
        assert_eq!(decide(&input()), Decision::Search);
    }

    #[test]
    fn test_sufficient_context_runs_contradiction_search_once() {
        let mut state = DecisionInput {
            evidence_count: 6,
            central_claims_covered: true,
            ..input()
        };
        assert_eq!(decide(&state), Decision::ContradictionSearch);

        state.contradiction_done = true;
        assert_eq!(decide(&state), Decision::Done(DoneReason::Sufficient));
    }

    #[test]
    fn test_evidence_count_alone_is_not_sufficient() {
        let state = DecisionInput {
            evidence_count: 10,
            central_claims_covered: false,
            contradiction_done: true,
            ..input()
        };
        assert_eq!(decide(&state), Decision::Search);
    }

    #[test]
    fn test_exhausted_context_stays_eligible_for_contradiction() {
        let mut state = DecisionInput {
            exhausted: true,
            ..input()
        };
        assert_eq!(decide(&state), Decision::ContradictionSearch);

        state.contradiction_done = true;
        assert_eq!(decide(&state), Decision::Done(DoneReason::CircuitBreaker));
    }

    #[test]
    fn test_budget_exhaustion() {
        let state = DecisionInput {
            regular_available: false,
            contradiction_available: false,
            ..input()
        };
        assert_eq!(decide(&state), Decision::Done(DoneReason::BudgetExhausted));
    }

    #[test]
    fn test_context_iteration_cap() {
        let state = DecisionInput {
            iterations: 5,
            contradiction_done: true,
            ..input()
        };
        assert_eq!(
            decide(&state),
            Decision::Done(DoneReason::ContextBudgetExhausted)
        );
    }

    #[test]
    fn test_context_without_claims_is_done() {
        let state = DecisionInput {
            has_claims: false,
            ..input()
        };
        assert_eq!(decide(&state), Decision::Done(DoneReason::NoClaims));
    }
}
