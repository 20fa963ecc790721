// Eligibility computation
//
// Reduces the full timeline to the sorted set of indices playback may visit,
// applying time include/exclude intervals, NaN masking and per-series value
// predicates. Recomputed only when filters or the underlying arrays change,
// never per tick; tick-time lookups against the result are O(1).

use crate::types::{SeriesId, StreamFilters};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Arrays below this length are masked serially, above it with rayon.
const PARALLEL_THRESHOLD: usize = 65_536;

pub struct EligibilityEngine;

impl EligibilityEngine {
    /// Compute the sorted set of time indices eligible for playback.
    ///
    /// Starts from the full `[0, n)` range, then:
    /// 1. keeps only indices inside the union of `time_include` (if any),
    /// 2. removes indices inside the union of `time_exclude`,
    /// 3. if `hide_nan`, removes indices where any non-hidden series is NaN,
    /// 4. removes indices failing any applicable value predicate.
    ///
    /// A predicate referencing a series absent from `series_data` is
    /// inapplicable and excludes nothing.
    pub fn compute_eligible_indices(
        filters: &StreamFilters,
        times: &[f64],
        series_data: &BTreeMap<SeriesId, Vec<f64>>,
    ) -> Vec<usize> {
        let n = times.len();

        // Resolve predicate series references once, outside the per-index loop
        let predicates: Vec<(&Vec<f64>, &crate::types::ValuePredicate)> = filters
            .value_predicates
            .values()
            .filter_map(|pred| series_data.get(&pred.series_id).map(|vals| (vals, pred)))
            .collect();

        let nan_checked: Vec<&Vec<f64>> = if filters.hide_nan {
            series_data
                .iter()
                .filter(|(id, _)| !filters.hidden_series.contains(*id))
                .map(|(_, vals)| vals)
                .collect()
        } else {
            Vec::new()
        };

        let is_eligible = |i: usize| -> bool {
            let t = times[i];
            if !filters.time_include.is_empty()
                && !filters.time_include.iter().any(|iv| iv.contains(t))
            {
                return false;
            }
            if filters.time_exclude.iter().any(|iv| iv.contains(t)) {
                return false;
            }
            if nan_checked.iter().any(|vals| vals[i].is_nan()) {
                return false;
            }
            predicates
                .iter()
                .all(|(vals, pred)| pred.operator.evaluate(vals[i], pred.value))
        };

        let eligible: Vec<usize> = if n >= PARALLEL_THRESHOLD {
            (0..n).into_par_iter().filter(|&i| is_eligible(i)).collect()
        } else {
            (0..n).filter(|&i| is_eligible(i)).collect()
        };

        log::debug!(
            "Eligibility recomputed: {} of {} indices eligible",
            eligible.len(),
            n
        );

        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompareOp, TimeInterval, ValuePredicate};

    fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
        let step = (end - start) / (n - 1) as f64;
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn no_series() -> BTreeMap<SeriesId, Vec<f64>> {
        BTreeMap::new()
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let times = linspace(0.0, 100.0, 101);
        let filters = StreamFilters::default();
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert_eq!(eligible.len(), 101);
        assert_eq!(eligible[0], 0);
        assert_eq!(eligible[100], 100);
    }

    #[test]
    fn test_include_interval_20_80_over_101_uniform_points() {
        let times = linspace(0.0, 100.0, 101);
        let filters = StreamFilters {
            time_include: vec![TimeInterval::new(20.0, 80.0)],
            ..Default::default()
        };
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert_eq!(eligible.len(), 61);
        assert_eq!(eligible[0], 20);
        assert_eq!(*eligible.last().unwrap(), 80);
    }

    #[test]
    fn test_exclude_interval_40_60_over_101_uniform_points() {
        let times = linspace(0.0, 100.0, 101);
        let filters = StreamFilters {
            time_exclude: vec![TimeInterval::new(40.0, 60.0)],
            ..Default::default()
        };
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert_eq!(eligible.len(), 80);
        assert!(!eligible.contains(&40));
        assert!(!eligible.contains(&50));
        assert!(!eligible.contains(&60));
        assert!(eligible.contains(&39));
        assert!(eligible.contains(&61));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let times = linspace(0.0, 10.0, 11);
        let filters = StreamFilters {
            time_include: vec![TimeInterval::new(0.0, 10.0)],
            time_exclude: vec![TimeInterval::new(4.0, 6.0)],
            ..Default::default()
        };
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert!(!eligible.contains(&5));
        assert_eq!(eligible.len(), 8);
    }

    #[test]
    fn test_nan_masking_respects_hidden_series() {
        let times = linspace(0.0, 4.0, 5);
        let mut series = BTreeMap::new();
        series.insert("visible".to_string(), vec![1.0, f64::NAN, 3.0, 4.0, 5.0]);
        series.insert("hidden".to_string(), vec![f64::NAN; 5]);

        let mut filters = StreamFilters::default();
        filters.hidden_series.insert("hidden".to_string());

        let eligible = EligibilityEngine::compute_eligible_indices(&filters, &times, &series);
        // Only the visible series' NaN at index 1 excludes anything
        assert_eq!(eligible, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_nan_masking_disabled() {
        let times = linspace(0.0, 4.0, 5);
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), vec![1.0, f64::NAN, 3.0, 4.0, 5.0]);

        let filters = StreamFilters {
            hide_nan: false,
            ..Default::default()
        };
        let eligible = EligibilityEngine::compute_eligible_indices(&filters, &times, &series);
        assert_eq!(eligible.len(), 5);
    }

    #[test]
    fn test_value_predicate_excludes_failing_indices() {
        let times = linspace(0.0, 4.0, 5);
        let mut series = BTreeMap::new();
        series.insert("a".to_string(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        let mut filters = StreamFilters::default();
        filters.value_predicates.insert(
            "a".to_string(),
            ValuePredicate::new("a", CompareOp::Gte, 2.0),
        );
        let eligible = EligibilityEngine::compute_eligible_indices(&filters, &times, &series);
        assert_eq!(eligible, vec![2, 3, 4]);
    }

    #[test]
    fn test_predicate_on_missing_series_is_inapplicable() {
        let times = linspace(0.0, 4.0, 5);
        let mut filters = StreamFilters::default();
        filters.value_predicates.insert(
            "ghost".to_string(),
            ValuePredicate::new("ghost", CompareOp::Gt, 100.0),
        );
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert_eq!(eligible.len(), 5);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let times = linspace(0.0, 100.0, 1001);
        let mut series = BTreeMap::new();
        series.insert(
            "a".to_string(),
            times.iter().map(|t| (t * 0.3).sin()).collect::<Vec<_>>(),
        );
        let mut filters = StreamFilters {
            time_include: vec![TimeInterval::new(10.0, 90.0)],
            time_exclude: vec![TimeInterval::new(40.0, 45.0)],
            ..Default::default()
        };
        filters.value_predicates.insert(
            "a".to_string(),
            ValuePredicate::new("a", CompareOp::Gt, -0.5),
        );

        let first = EligibilityEngine::compute_eligible_indices(&filters, &times, &series);
        let second = EligibilityEngine::compute_eligible_indices(&filters, &times, &series);
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_is_sorted() {
        let times = linspace(0.0, 1.0, 1000);
        let filters = StreamFilters {
            time_exclude: vec![TimeInterval::new(0.2, 0.3), TimeInterval::new(0.7, 0.8)],
            ..Default::default()
        };
        let eligible =
            EligibilityEngine::compute_eligible_indices(&filters, &times, &no_series());
        assert!(eligible.windows(2).all(|w| w[0] < w[1]));
    }
}
