// Common types for the playback engine
//
// All configuration and payload types are plain serde-serializable data so
// the host application can persist them or ship them across an IPC boundary
// unchanged.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Identifier of one value series (a channel, a sensor, a signal...)
pub type SeriesId = String;

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Inclusive containment: `start <= t <= end`
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Comparison operator for value predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

impl CompareOp {
    /// Evaluate `sample <op> threshold`. NaN on either side never satisfies
    /// any operator, including `Neq`.
    pub fn evaluate(&self, sample: f64, threshold: f64) -> bool {
        if sample.is_nan() || threshold.is_nan() {
            return false;
        }
        match self {
            CompareOp::Gt => sample > threshold,
            CompareOp::Lt => sample < threshold,
            CompareOp::Gte => sample >= threshold,
            CompareOp::Lte => sample <= threshold,
            CompareOp::Eq => sample == threshold,
            CompareOp::Neq => sample != threshold,
        }
    }
}

/// Element-wise predicate against one series' value array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePredicate {
    pub series_id: SeriesId,
    pub operator: CompareOp,
    pub value: f64,
}

impl ValuePredicate {
    pub fn new(series_id: impl Into<SeriesId>, operator: CompareOp, value: f64) -> Self {
        Self {
            series_id: series_id.into(),
            operator,
            value,
        }
    }
}

/// Downsampling algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleMethod {
    /// Largest-Triangle-Three-Buckets: best visual shape preservation
    Lttb,
    /// Per-bucket min/max pairs: best peak preservation
    Minmax,
    /// Picks between LTTB and min/max based on the compression ratio
    Adaptive,
}

impl Default for DownsampleMethod {
    fn default() -> Self {
        Self::Lttb
    }
}

/// Aggregate filter configuration applied to the timeline
///
/// Every construction produces independently-owned collections; there are no
/// shared default containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamFilters {
    /// OR-combined keep intervals; empty means all time included
    pub time_include: Vec<TimeInterval>,
    /// OR-combined drop intervals, subtracted after include
    pub time_exclude: Vec<TimeInterval>,
    /// Drop indices where any non-hidden series is NaN
    pub hide_nan: bool,
    /// AND-combined across series; a predicate on a missing series is
    /// inapplicable and excludes nothing
    pub value_predicates: BTreeMap<SeriesId, ValuePredicate>,
    /// Series excluded from window output and from NaN-mask consideration
    pub hidden_series: BTreeSet<SeriesId>,
    /// Display-safe point budget per window, per series
    pub max_points_per_window: usize,
    pub downsample_method: DownsampleMethod,
    /// Force local extrema and inflection points to survive downsampling
    pub preserve_features: bool,
}

impl Default for StreamFilters {
    fn default() -> Self {
        Self {
            time_include: Vec::new(),
            time_exclude: Vec::new(),
            hide_nan: true,
            value_predicates: BTreeMap::new(),
            hidden_series: BTreeSet::new(),
            max_points_per_window: 5000,
            downsample_method: DownsampleMethod::default(),
            preserve_features: false,
        }
    }
}

impl StreamFilters {
    pub fn validate(&self) -> Result<()> {
        if self.max_points_per_window == 0 {
            return Err(PlaybackError::InvalidConfig(
                "max_points_per_window must be at least 1".to_string(),
            ));
        }
        for interval in self.time_include.iter().chain(self.time_exclude.iter()) {
            if interval.start > interval.end {
                return Err(PlaybackError::InvalidConfig(format!(
                    "inverted time interval [{}, {}]",
                    interval.start, interval.end
                )));
            }
        }
        Ok(())
    }
}

/// Playback state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Initial/terminal rest state
    Stopped,
    Playing,
    Paused,
}

impl Default for PlayState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Mutable per-session playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingState {
    /// Raw index into the time axis, clamped to `[0, total_points - 1]`
    pub current_time_index: usize,
    /// Tick advancement multiplier (positions per tick, rounded)
    pub speed: f64,
    /// Wrap to the first eligible index instead of stopping at the end
    pub looping: bool,
    /// Full window width in time units; the cursor sits at its center
    pub window_size: f64,
    pub filters: StreamFilters,
    pub play_state: PlayState,
}

impl Default for StreamingState {
    fn default() -> Self {
        Self {
            current_time_index: 0,
            speed: 1.0,
            looping: false,
            window_size: 10.0,
            filters: StreamFilters::default(),
            play_state: PlayState::Stopped,
        }
    }
}

/// One series' slice of a window, post-downsampling
///
/// Each series carries its own time axis because downsampling selects a
/// different subset of indices per series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesWindow {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl SeriesWindow {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Payload handed to every matching subscriber on a tick or explicit sync
///
/// The window data is a snapshot: it is copied out of the engine's internal
/// buffers and is never mutated after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickUpdate {
    pub session_id: String,
    pub current_time_index: usize,
    pub play_state: PlayState,
    pub window_data: HashMap<SeriesId, SeriesWindow>,
    /// Eligible index count after the current filters
    pub eligible_count: usize,
    /// Set when the filters left nothing to play; playback is frozen and the
    /// host should surface a "no data matches current filters" indicator
    pub no_eligible_data: bool,
    /// UTC dispatch timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Counters describing a playback session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub total_ticks: u64,
    pub total_dispatches: u64,
    pub total_subscriber_faults: u64,
    pub total_filter_recomputes: u64,
    pub eligible_count: usize,
    pub total_points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_containment_is_inclusive() {
        let iv = TimeInterval::new(2.0, 5.0);
        assert!(iv.contains(2.0));
        assert!(iv.contains(5.0));
        assert!(iv.contains(3.5));
        assert!(!iv.contains(1.999));
        assert!(!iv.contains(5.001));
    }

    #[test]
    fn test_nan_never_satisfies_any_operator() {
        for op in [
            CompareOp::Gt,
            CompareOp::Lt,
            CompareOp::Gte,
            CompareOp::Lte,
            CompareOp::Eq,
            CompareOp::Neq,
        ] {
            assert!(!op.evaluate(f64::NAN, 1.0));
            assert!(!op.evaluate(1.0, f64::NAN));
        }
    }

    #[test]
    fn test_filters_defaults() {
        let filters = StreamFilters::default();
        assert!(filters.hide_nan);
        assert_eq!(filters.max_points_per_window, 5000);
        assert_eq!(filters.downsample_method, DownsampleMethod::Lttb);
        assert!(filters.validate().is_ok());
    }

    #[test]
    fn test_filters_reject_zero_budget() {
        let filters = StreamFilters {
            max_points_per_window: 0,
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_filters_reject_inverted_interval() {
        let filters = StreamFilters {
            time_exclude: vec![TimeInterval::new(10.0, 2.0)],
            ..Default::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_filters_json_round_trip() {
        let mut filters = StreamFilters::default();
        filters.time_include.push(TimeInterval::new(0.0, 10.0));
        filters.value_predicates.insert(
            "ch1".to_string(),
            ValuePredicate::new("ch1", CompareOp::Gte, 0.5),
        );
        let json = serde_json::to_string(&filters).unwrap();
        let back: StreamFilters = serde_json::from_str(&json).unwrap();
        assert_eq!(filters, back);
    }
}
