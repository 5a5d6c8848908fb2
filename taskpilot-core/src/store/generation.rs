//! Request-generation counter.
//!
//! Every logical refresh takes a [`Ticket`]; when its response arrives it is
//! only applied if no newer refresh has started since.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

/// Proof of which generation a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating all earlier tickets.
    pub fn begin(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::Acquire) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_wins() {
        let generation = Generation::new();
        let first = generation.begin();
        assert!(generation.is_current(first));

        let second = generation.begin();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }
}
