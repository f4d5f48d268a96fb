//! Per-tick deltas from cumulative module counters.

use crate::parser::metrics::CounterSnapshot;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Milliseconds spent per module since the previous snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDeltaSet {
    pub begin: BTreeMap<String, f64>,
    pub end: BTreeMap<String, f64>,
}

impl ModuleDeltaSet {
    pub fn begin_total(&self) -> f64 {
        self.begin.values().sum()
    }

    pub fn end_total(&self) -> f64 {
        self.end.values().sum()
    }

    pub fn total(&self) -> f64 {
        self.begin_total() + self.end_total()
    }

    /// Module with the largest end-phase delta
    pub fn slowest_end_module(&self) -> Option<(&str, f64)> {
        self.end
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, ms)| (name.as_str(), *ms))
    }
}

/// Differences consecutive [`CounterSnapshot`]s
#[derive(Debug, Default)]
pub struct CounterDeltaCalculator {
    previous: Option<CounterSnapshot>,
}

impl CounterDeltaCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Delta against the previous snapshot, or `None` for the first one
    ///
    /// A module whose counter went backwards (process restart) is left out of
    /// this tick's deltas entirely.
    pub fn compute(&mut self, current: CounterSnapshot) -> Option<ModuleDeltaSet> {
        let Some(previous) = self.previous.replace(current) else {
            debug!("Counter baseline established");
            return None;
        };
        let current = self.previous.as_ref()?;

        Some(ModuleDeltaSet {
            begin: diff("begin", &previous.begin, &current.begin),
            end: diff("end", &previous.end, &current.end),
        })
    }
}

fn diff(
    direction: &str,
    previous: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    current
        .iter()
        .filter_map(|(module, value)| {
            let delta = value - previous.get(module).copied().unwrap_or(0.0);
            if delta >= 0.0 {
                Some((module.clone(), delta))
            } else {
                debug!(
                    "Counter reset for {} module {} ({:.1} -> {:.1}), skipping this tick",
                    direction,
                    module,
                    previous.get(module).copied().unwrap_or(0.0),
                    value
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(begin: &[(&str, f64)], end: &[(&str, f64)]) -> CounterSnapshot {
        CounterSnapshot {
            begin: begin.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            end: end.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_first_snapshot_is_baseline() {
        let mut calc = CounterDeltaCalculator::new();
        assert!(!calc.has_baseline());
        assert!(calc.compute(snapshot(&[("oracle", 5.0)], &[])).is_none());
        assert!(calc.has_baseline());
    }

    #[test]
    fn test_consecutive_deltas() {
        let mut calc = CounterDeltaCalculator::new();
        calc.compute(snapshot(&[("oracle", 100.0), ("bank", 1.0)], &[("dispute", 20.0)]));

        let d1 = calc
            .compute(snapshot(&[("oracle", 110.0), ("bank", 3.0)], &[("dispute", 20.0)]))
            .unwrap();
        assert_eq!(d1.begin["oracle"], 10.0);
        assert_eq!(d1.begin["bank"], 2.0);
        assert_eq!(d1.end["dispute"], 0.0);
        assert_eq!(d1.begin_total(), 12.0);
        assert_eq!(d1.total(), 12.0);

        let d2 = calc
            .compute(snapshot(&[("oracle", 115.0), ("bank", 3.0)], &[("dispute", 21.5)]))
            .unwrap();
        assert_eq!(d2.begin["oracle"], 5.0);
        assert_eq!(d2.total(), 6.5);
    }

    #[test]
    fn test_counter_reset_drops_module() {
        let mut calc = CounterDeltaCalculator::new();
        calc.compute(snapshot(&[("oracle", 100.0), ("bank", 4.0)], &[]));

        let d = calc
            .compute(snapshot(&[("oracle", 2.0), ("bank", 6.0)], &[]))
            .unwrap();

        assert!(!d.begin.contains_key("oracle"));
        assert_eq!(d.begin["bank"], 2.0);
        assert_eq!(d.begin_total(), 2.0);

        // The reset value becomes the new baseline
        let d = calc
            .compute(snapshot(&[("oracle", 7.0), ("bank", 6.0)], &[]))
            .unwrap();
        assert_eq!(d.begin["oracle"], 5.0);
    }

    #[test]
    fn test_new_module_counts_from_zero() {
        let mut calc = CounterDeltaCalculator::new();
        calc.compute(snapshot(&[], &[]));

        let d = calc.compute(snapshot(&[], &[("bridge", 8.0)])).unwrap();
        assert_eq!(d.end["bridge"], 8.0);
    }

    #[test]
    fn test_slowest_end_module() {
        let set = ModuleDeltaSet {
            begin: BTreeMap::new(),
            end: [("a".to_string(), 1.0), ("b".to_string(), 9.0)].into_iter().collect(),
        };
        assert_eq!(set.slowest_end_module(), Some(("b", 9.0)));
        assert_eq!(ModuleDeltaSet::default().slowest_end_module(), None);
    }
}
