/// Finalizer
///
/// Turns a (possibly gappy, possibly out-of-order within small windows) stream
/// of observed head numbers into a strictly ascending, gap-tolerant stream of
/// "safe to process" block numbers, each `confirmations` blocks behind the
/// latest observed head.
use std::collections::HashMap;

use crate::metrics;

pub struct Finalizer {
    confirmations: u64,
    latest: u64,
    next: u64,
    pending: HashMap<u64, ()>,
}

impl Finalizer {
    pub fn new(confirmations: u64) -> Self {
        Finalizer {
            confirmations,
            latest: 0,
            next: 0,
            pending: HashMap::new(),
        }
    }

    /// Record an observed head number and return the set of numbers now safe
    /// to finalize, in strictly ascending order.
    pub fn add(&mut self, head: u64) -> Vec<u64> {
        if head > self.latest {
            self.latest = head;
        }
        self.pending.insert(head, ());
        if self.next == 0 {
            self.next = head;
        }

        let threshold = self.latest.saturating_sub(self.confirmations);
        let mut ready = Vec::new();
        while self.next != 0 && self.next <= threshold {
            if self.pending.remove(&self.next).is_some() {
                ready.push(self.next);
            } else {
                metrics::record_finalizer_gap_skipped();
            }
            self.next += 1;
        }
        ready
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_confirmed_heads_in_order() {
        let mut f = Finalizer::new(3);
        let mut emitted = Vec::new();
        for head in 10..=14 {
            emitted.extend(f.add(head));
        }
        assert_eq!(emitted, vec![10, 11]);
    }

    #[test]
    fn emits_nothing_before_confirmations_elapse() {
        let mut f = Finalizer::new(5);
        assert!(f.add(1).is_empty());
        assert!(f.add(2).is_empty());
    }

    #[test]
    fn strictly_ascending_even_with_repeats() {
        let mut f = Finalizer::new(1);
        let mut emitted = Vec::new();
        emitted.extend(f.add(1));
        emitted.extend(f.add(1));
        emitted.extend(f.add(2));
        emitted.extend(f.add(3));
        assert_eq!(emitted, vec![1, 2]);
    }

    #[test]
    fn zero_confirmations_finalizes_immediately() {
        let mut f = Finalizer::new(0);
        assert_eq!(f.add(1), vec![1]);
        assert_eq!(f.add(2), vec![2]);
    }

    #[test]
    fn gap_in_observed_heads_is_dropped_silently() {
        let mut f = Finalizer::new(0);
        let mut emitted = Vec::new();
        emitted.extend(f.add(10));
        // 11 is never observed as a head.
        emitted.extend(f.add(12));
        assert_eq!(emitted, vec![10, 12]);
    }
}
