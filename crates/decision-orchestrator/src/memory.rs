use std::collections::VecDeque;

use dashmap::DashMap;
use decision_core::Signal;
use decision_pipeline::FinalDecision;
use serde::{Deserialize, Serialize};

/// Confidence assumed for a symbol with no prior decision.
pub const DEFAULT_LAST_CONFIDENCE: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub signal: Signal,
    pub confidence: f64,
    pub divergence_flag: bool,
}

impl From<&FinalDecision> for MemoryEntry {
    fn from(decision: &FinalDecision) -> Self {
        Self {
            signal: decision.signal,
            confidence: decision.confidence,
            divergence_flag: decision.divergence_flag,
        }
    }
}

/// Bounded per-symbol history of recent decisions, newest first.
pub struct DecisionMemory {
    entries: DashMap<String, VecDeque<MemoryEntry>>,
    capacity: usize,
}

impl DecisionMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, symbol: &str, entry: MemoryEntry) {
        let mut window = self.entries.entry(symbol.to_string()).or_default();
        window.push_front(entry);
        window.truncate(self.capacity);
    }

    /// Consecutive divergent decisions counted back from the newest.
    pub fn divergence_streak(&self, symbol: &str) -> u32 {
        self.entries
            .get(symbol)
            .map(|window| window.iter().take_while(|e| e.divergence_flag).count() as u32)
            .unwrap_or(0)
    }

    pub fn last_confidence(&self, symbol: &str) -> f64 {
        self.entries
            .get(symbol)
            .and_then(|window| window.front().map(|e| e.confidence))
            .unwrap_or(DEFAULT_LAST_CONFIDENCE)
    }

    pub fn recent(&self, symbol: &str) -> Vec<MemoryEntry> {
        self.entries
            .get(symbol)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default()
    }
}
