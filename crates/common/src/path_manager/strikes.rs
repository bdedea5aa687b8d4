use std::collections::HashMap;
use std::hash::Hash;

/// Monotonic per-key failure counter with a promotion threshold
#[derive(Debug)]
pub struct StrikeLedger<K> {
    threshold: u32,
    strikes: HashMap<K, u32>,
}

impl<K: Eq + Hash> StrikeLedger<K> {
    /// A threshold of zero is treated as one: every strike promotes
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            strikes: HashMap::new(),
        }
    }

    /// Record a strike; returns true once the key has reached the threshold
    pub fn strike(&mut self, key: K) -> bool {
        let count = self.strikes.entry(key).or_insert(0);
        *count = count.saturating_add(1);
        *count >= self.threshold
    }

    pub fn count(&self, key: &K) -> u32 {
        self.strikes.get(key).copied().unwrap_or(0)
    }

    pub fn clear(&mut self, key: &K) {
        self.strikes.remove(key);
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
