//! Bounded record of acknowledged request ids.

use std::collections::{HashSet, VecDeque};

/// Remembers acknowledged request ids so they are never resubmitted.
///
/// When full, the oldest id is evicted before the new one is inserted, so
/// the most recent ids are always recognized and memory stays bounded.
#[derive(Debug, Clone)]
pub struct DedupLedger {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn remember(&mut self, id: &str) {
        if self.ids.contains(id) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_ids() {
        let mut ledger = DedupLedger::new(4);
        ledger.remember("a");
        ledger.remember("a");
        assert!(ledger.contains("a"));
        assert!(!ledger.contains("b"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn overflow_keeps_latest() {
        let mut ledger = DedupLedger::new(3);
        for id in ["1", "2", "3", "4", "5"] {
            ledger.remember(id);
        }
        assert_eq!(ledger.len(), 3);
        assert!(ledger.contains("5"));
        assert!(ledger.contains("3"));
        assert!(!ledger.contains("1"));
        assert!(!ledger.contains("2"));
    }

    #[test]
    fn default_capacity_bound() {
        let mut ledger = DedupLedger::new(4096);
        for n in 0..5000 {
            ledger.remember(&n.to_string());
        }
        assert_eq!(ledger.len(), 4096);
        assert!(ledger.contains("4999"));
        assert!(!ledger.contains("0"));
    }

    #[test]
    fn zero_capacity_still_tracks_latest() {
        let mut ledger = DedupLedger::new(0);
        ledger.remember("x");
        ledger.remember("y");
        assert_eq!(ledger.capacity(), 1);
        assert!(ledger.contains("y"));
        assert!(!ledger.contains("x"));
    }
}
