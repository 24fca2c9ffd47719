//! Diagnostic timing of a model run (SAVE_RUNTIME)

use std::fmt;
use std::time::Duration;

use crate::engine::CacheStats;

/// Wall time spent per component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeReport {
    /// Duration of the whole calculation
    pub total: Duration,

    /// Cumulative evaluation time per component, in declaration order
    pub components: Vec<(String, Duration)>,

    /// Cache hits and misses per component, aligned with `components`
    pub cache: Vec<CacheStats>,
}

impl RuntimeReport {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            total: Duration::ZERO,
            cache: vec![CacheStats::default(); names.len()],
            components: names.into_iter().map(|n| (n, Duration::ZERO)).collect(),
        }
    }

    /// Add per-component timings and cache statistics collected by one worker
    pub fn absorb(&mut self, timings: &[Duration], cache: &[CacheStats]) {
        for ((_, total), elapsed) in self.components.iter_mut().zip(timings) {
            *total += *elapsed;
        }
        for (total, stats) in self.cache.iter_mut().zip(cache) {
            *total += *stats;
        }
    }

    /// Components sorted by time spent, slowest first
    pub fn slowest(&self) -> Vec<(&str, Duration)> {
        let mut sorted: Vec<(&str, Duration)> =
            self.components.iter().map(|(n, d)| (n.as_str(), *d)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
    }

    /// Cache statistics of one component
    pub fn cache_of(&self, name: &str) -> Option<CacheStats> {
        self.components
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| self.cache[i])
    }
}

impl fmt::Display for RuntimeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total: {:?}", self.total)?;
        for (name, elapsed) in self.slowest() {
            let hit_rate = self.cache_of(name).unwrap_or_default().hit_rate();
            writeln!(f, "  {:<24} {:?}  cache hits {:>5.1}%", name, elapsed, hit_rate * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_and_sort() {
        let mut report = RuntimeReport::new(vec!["a".into(), "b".into()]);
        report.absorb(&[Duration::from_millis(1), Duration::from_millis(5)], &[]);
        report.absorb(&[Duration::from_millis(1), Duration::from_millis(0)], &[]);

        assert_eq!(report.components[0].1, Duration::from_millis(2));
        assert_eq!(report.slowest()[0].0, "b");
        // nothing collected (SAVE_RUNTIME off) leaves the report unchanged
        report.absorb(&[], &[]);
        assert_eq!(report.components[1].1, Duration::from_millis(5));
    }

    #[test]
    fn test_cache_statistics() {
        let mut report = RuntimeReport::new(vec!["a".into(), "b".into()]);
        report.absorb(&[], &[CacheStats { hits: 3, misses: 1 }, CacheStats { hits: 0, misses: 2 }]);
        report.absorb(&[], &[CacheStats { hits: 1, misses: 3 }, CacheStats::default()]);

        assert_eq!(report.cache_of("a"), Some(CacheStats { hits: 4, misses: 4 }));
        assert_eq!(report.cache_of("b").map(|s| s.hit_rate()), Some(0.0));
        assert!(report.cache_of("c").is_none());
        assert!(report.to_string().contains("cache hits  50.0%"));
    }
}
