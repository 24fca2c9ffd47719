//! Per-component result caches
//!
//! One cache holds the results of a single component for the record that is
//! currently selected on its record set: one slot per time step for a model
//! variable, a single slot for a constant. Slots fill lazily; a slot that is
//! being computed is marked `InProgress`, so re-entering it means the formula
//! depends on itself at the same time step.

use std::collections::HashMap;
use std::ops::AddAssign;

/// State of one cached result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Empty,
    InProgress,
    Ready(f64),
}

/// Cache hits and misses of one component
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

/// Results of one component for the current record, plus retained history
#[derive(Debug, Clone)]
pub struct UnitCache {
    slots: Vec<Slot>,

    /// Record the slots belong to
    record: Option<usize>,

    /// Completed results of earlier records (only kept when requested)
    history: HashMap<usize, Box<[f64]>>,

    stats: CacheStats,
}

impl UnitCache {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; len],
            record: None,
            history: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Start over for `record`, optionally retaining the completed results
    /// of the previous record
    pub fn reset(&mut self, record: Option<usize>, retain: bool) {
        if retain {
            if let (Some(previous), Some(values)) = (self.record, self.values()) {
                self.history.insert(previous, values.into_boxed_slice());
            }
        }
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Empty);
        self.record = record;
    }

    pub fn record(&self) -> Option<usize> {
        self.record
    }

    pub fn slot(&self, index: usize) -> Slot {
        self.slots[index]
    }

    pub fn set(&mut self, index: usize, slot: Slot) {
        self.slots[index] = slot;
    }

    /// All results, if every slot is ready
    pub fn values(&self) -> Option<Vec<f64>> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Ready(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Result for `record` at `index`, from the current slots or the history
    pub fn lookup(&self, record: usize, index: usize) -> Option<f64> {
        if self.record == Some(record) {
            return match self.slots.get(index) {
                Some(Slot::Ready(v)) => Some(*v),
                _ => None,
            };
        }
        self.history.get(&record).and_then(|values| values.get(index).copied())
    }

    pub fn record_hit(&mut self) {
        self.stats.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.stats.misses += 1;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_fill_and_reset() {
        let mut cache = UnitCache::new(3);
        cache.reset(Some(0), false);
        assert_eq!(cache.slot(1), Slot::Empty);

        cache.set(1, Slot::InProgress);
        assert_eq!(cache.slot(1), Slot::InProgress);
        cache.set(1, Slot::Ready(4.0));
        assert_eq!(cache.lookup(0, 1), Some(4.0));
        assert_eq!(cache.values(), None);

        cache.reset(Some(1), false);
        assert_eq!(cache.slot(1), Slot::Empty);
        assert_eq!(cache.record(), Some(1));
    }

    #[test]
    fn test_history_retained_only_when_complete() {
        let mut cache = UnitCache::new(2);
        cache.reset(Some(0), true);
        cache.set(0, Slot::Ready(1.0));
        cache.set(1, Slot::Ready(2.0));

        cache.reset(Some(1), true);
        assert_eq!(cache.lookup(0, 1), Some(2.0));

        // record 1 is left incomplete and is not retained
        cache.set(0, Slot::Ready(5.0));
        cache.reset(Some(2), true);
        assert_eq!(cache.lookup(1, 0), None);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = UnitCache::new(1);
        assert_eq!(cache.stats().hit_rate(), 0.0);
        cache.record_miss();
        cache.record_hit();
        cache.record_hit();
        cache.record_hit();
        assert!((cache.stats().hit_rate() - 0.75).abs() < 1e-12);

        let mut total = cache.stats();
        total += CacheStats { hits: 1, misses: 3 };
        assert_eq!(total, CacheStats { hits: 4, misses: 4 });
        assert!((total.hit_rate() - 0.5).abs() < 1e-12);
    }
}
