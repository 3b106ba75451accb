//! Iteration budget shared by a job's context sub-loops

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-job research budget
///
/// The regular pool funds ordinary searches. Each context additionally holds
/// its own reserved slots for the mandatory contradiction search; only that
/// context can draw them, falling back to the regular pool when they are gone.
/// Once a context has run its contradiction search or finished, whatever it
/// still holds goes back to the regular pool.
#[derive(Debug)]
pub struct ResearchBudget {
    regular: AtomicUsize,
    reserved: Mutex<HashMap<String, usize>>,
    used: AtomicUsize,
    slots_per_context: usize,
    exhausted: Mutex<HashSet<String>>,
}

/// Decrement an atomic counter unless it is already zero
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResearchBudget {
    /// Carve `slots_per_context` reserved slots per context out of `total`
    ///
    /// Contexts are served in order; once `total` runs out, later contexts
    /// get fewer (or no) reserved slots.
    pub fn new<I, S>(total: usize, slots_per_context: usize, context_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut remaining = total;
        let mut reserved = HashMap::new();
        for id in context_ids {
            let slots = slots_per_context.min(remaining);
            remaining -= slots;
            reserved.insert(id.into(), slots);
        }

        Self {
            regular: AtomicUsize::new(remaining),
            reserved: Mutex::new(reserved),
            used: AtomicUsize::new(0),
            slots_per_context,
            exhausted: Mutex::new(HashSet::new()),
        }
    }

    pub fn try_acquire_regular(&self) -> bool {
        let acquired = take_one(&self.regular);
        if acquired {
            self.used.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    /// Fund a contradiction search for `context_id` from its own reservation,
    /// then from the regular pool
    pub fn try_acquire_contradiction(&self, context_id: &str) -> bool {
        let from_reserve = lock(&self.reserved)
            .get_mut(context_id)
            .is_some_and(|slots| match slots.checked_sub(1) {
                Some(left) => {
                    *slots = left;
                    true
                }
                None => false,
            });

        let acquired = from_reserve || take_one(&self.regular);
        if acquired {
            self.used.fetch_add(1, Ordering::AcqRel);
        }
        acquired
    }

    /// Move a new context's reserved slots out of the regular pool
    ///
    /// Returns the number of slots actually moved.
    pub fn reserve_for_new_context(&self, context_id: &str) -> usize {
        let mut moved = 0;
        while moved < self.slots_per_context && take_one(&self.regular) {
            moved += 1;
        }
        *lock(&self.reserved).entry(context_id.to_string()).or_default() += moved;
        moved
    }

    /// Return a context's unused reserved slots to the regular pool
    pub fn release_reserved(&self, context_id: &str) -> usize {
        let released = lock(&self.reserved).remove(context_id).unwrap_or(0);
        if released > 0 {
            self.regular.fetch_add(released, Ordering::AcqRel);
        }
        released
    }

    pub fn regular_remaining(&self) -> usize {
        self.regular.load(Ordering::Acquire)
    }

    pub fn reserved_for(&self, context_id: &str) -> usize {
        lock(&self.reserved).get(context_id).copied().unwrap_or(0)
    }

    pub fn has_regular(&self) -> bool {
        self.regular_remaining() > 0
    }

    /// A contradiction search for `context_id` could still be funded
    pub fn has_contradiction(&self, context_id: &str) -> bool {
        self.reserved_for(context_id) > 0 || self.has_regular()
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn mark_exhausted(&self, context_id: &str) {
        lock(&self.exhausted).insert(context_id.to_string());
    }

    pub fn is_exhausted(&self, context_id: &str) -> bool {
        lock(&self.exhausted).contains(context_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_pools_are_split() {
        let budget = ResearchBudget::new(10, 1, ["CTX_1", "CTX_2", "CTX_3"]);
        assert_eq!(budget.regular_remaining(), 7);
        assert_eq!(budget.reserved_for("CTX_2"), 1);
    }

    #[test]
    fn test_reservation_never_exceeds_total() {
        let budget = ResearchBudget::new(2, 1, ["CTX_1", "CTX_2", "CTX_3"]);
        assert_eq!(budget.regular_remaining(), 0);
        assert_eq!(budget.reserved_for("CTX_1"), 1);
        assert_eq!(budget.reserved_for("CTX_2"), 1);
        assert_eq!(budget.reserved_for("CTX_3"), 0);
    }

    #[test]
    fn test_contradiction_falls_back_to_regular_pool() {
        let budget = ResearchBudget::new(2, 1, ["CTX_1"]);
        assert!(budget.try_acquire_contradiction("CTX_1"));
        assert!(budget.try_acquire_contradiction("CTX_1"));
        assert!(!budget.try_acquire_contradiction("CTX_1"));
        assert!(!budget.try_acquire_regular());
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_reserved_slots_belong_to_their_context() {
        let budget = ResearchBudget::new(2, 1, ["CTX_1", "CTX_2"]);

        // CTX_1 spends its own slot, then has nothing left to borrow
        assert!(budget.try_acquire_contradiction("CTX_1"));
        assert!(!budget.has_contradiction("CTX_1"));
        assert!(!budget.try_acquire_contradiction("CTX_1"));

        assert!(budget.has_contradiction("CTX_2"));
        assert!(budget.try_acquire_contradiction("CTX_2"));
    }

    #[test]
    fn test_unused_reserved_slots_return_to_regular_pool() {
        let budget = ResearchBudget::new(6, 3, ["CTX_1"]);
        assert_eq!(budget.regular_remaining(), 3);

        assert!(budget.try_acquire_contradiction("CTX_1"));
        assert_eq!(budget.release_reserved("CTX_1"), 2);
        assert_eq!(budget.regular_remaining(), 5);
        assert_eq!(budget.reserved_for("CTX_1"), 0);
        assert_eq!(budget.release_reserved("CTX_1"), 0);
    }

    #[test]
    fn test_new_context_reservation_moves_slots() {
        let budget = ResearchBudget::new(5, 1, ["CTX_1"]);
        assert_eq!(budget.reserve_for_new_context("CTX_2"), 1);
        assert_eq!(budget.regular_remaining(), 3);
        assert_eq!(budget.reserved_for("CTX_2"), 1);
    }

    #[test]
    fn test_exhausted_set() {
        let budget = ResearchBudget::new(5, 1, ["CTX_1"]);
        assert!(!budget.is_exhausted("CTX_1"));
        budget.mark_exhausted("CTX_1");
        assert!(budget.is_exhausted("CTX_1"));
    }

    #[tokio::test]
    async fn test_concurrent_acquisition_never_overdraws() {
        let budget = Arc::new(ResearchBudget::new(50, 0, Vec::<String>::new()));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let budget = Arc::clone(&budget);
                tokio::spawn(async move {
                    let mut taken = 0;
                    while budget.try_acquire_regular() {
                        taken += 1;
                        tokio::task::yield_now().await;
                    }
                    taken
                })
            })
            .collect();

        let mut total = 0;
        for task in tasks {
            total += task.await.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(budget.used(), 50);
    }
}
