//! Cooperative cancellation: async work cannot be aborted mid-flight, but its
//! result is dropped when the thing it was started for is no longer current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Monotonic counter; advancing it invalidates every outstanding token.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    current: Arc<AtomicU64>,
}

impl Generation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current generation.
    #[must_use]
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            source: Arc::clone(&self.current),
            issued: self.current.load(Ordering::Acquire),
        }
    }

    /// Invalidate all tokens issued so far. Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Liveness check handed to async work; re-check it after every await.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    source: Arc<AtomicU64>,
    issued: u64,
}

impl GenerationToken {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.source.load(Ordering::Acquire) == self.issued
    }
}

/// Id captured when a mutation was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket<Id> {
    target: Id,
}

impl<Id> MutationTicket<Id> {
    #[must_use]
    pub fn target(&self) -> &Id {
        &self.target
    }
}

/// Tracks the currently active entity so late mutation results can be dropped.
#[derive(Debug)]
pub struct ActiveEntity<Id> {
    active: Mutex<Option<Id>>,
}

impl<Id> Default for ActiveEntity<Id> {
    fn default() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }
}

impl<Id: Clone + PartialEq> ActiveEntity<Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, id: Id) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub fn deactivate(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<Id> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Capture the active id before starting a mutation; `None` when idle.
    #[must_use]
    pub fn dispatch(&self) -> Option<MutationTicket<Id>> {
        self.current().map(|target| MutationTicket { target })
    }

    /// Run `apply` only if the ticket's target is still active.
    ///
    /// The check and `apply` happen under the same lock, so an activation
    /// cannot slip in between them.
    pub fn apply_if_active<T>(
        &self,
        ticket: &MutationTicket<Id>,
        apply: impl FnOnce() -> T,
    ) -> Option<T> {
        let guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref() == Some(&ticket.target) {
            Some(apply())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_generation_invalidates_tokens() {
        let generation = Generation::new();
        let first = generation.token();
        assert!(first.is_current());

        generation.advance();
        assert!(!first.is_current());
        assert!(generation.token().is_current());
    }

    #[test]
    fn cloned_generation_shares_counter() {
        let generation = Generation::new();
        let token = generation.token();
        generation.clone().advance();
        assert!(!token.is_current());
    }

    #[test]
    fn mutation_applies_only_to_still_active_entity() {
        let active = ActiveEntity::new();
        active.activate("x");
        let ticket = active.dispatch().unwrap();
        assert_eq!(ticket.target(), &"x");

        assert_eq!(active.apply_if_active(&ticket, || 1), Some(1));

        active.activate("y");
        assert_eq!(active.apply_if_active(&ticket, || 2), None);

        active.activate("x");
        assert_eq!(active.apply_if_active(&ticket, || 3), Some(3));
    }

    #[test]
    fn idle_entity_has_nothing_to_dispatch() {
        let active: ActiveEntity<String> = ActiveEntity::new();
        assert!(active.dispatch().is_none());
        active.activate("q".to_string());
        active.deactivate();
        assert!(active.current().is_none());
    }
}
