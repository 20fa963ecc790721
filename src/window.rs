// Window extraction
//
// Slices a symmetric time window (half the configured width on each side of
// the cursor) out of the session arrays. The window is time-based, not
// index-based, so irregularly sampled data gets the expected span. At the
// timeline edges the window is clamped, never padded.

use crate::downsample;
use crate::types::{SeriesId, SeriesWindow, StreamFilters};
use std::collections::{BTreeMap, HashMap};

/// One extracted window: the raw in-range time axis plus the per-series
/// slices after hidden-series removal and downsampling.
#[derive(Debug, Clone)]
pub struct WindowData {
    /// Time axis of the selected index range, before downsampling
    pub times: Vec<f64>,
    pub series: HashMap<SeriesId, SeriesWindow>,
}

pub struct WindowExtractor;

impl WindowExtractor {
    /// Extract the window centered on `times[current_index]`.
    ///
    /// Series in `filters.hidden_series` are omitted. Any series whose slice
    /// exceeds `filters.max_points_per_window` is handed to the downsampler;
    /// smaller slices are copied through unchanged.
    pub fn get_window_data(
        times: &[f64],
        series_data: &BTreeMap<SeriesId, Vec<f64>>,
        filters: &StreamFilters,
        current_index: usize,
        window_size: f64,
    ) -> WindowData {
        if times.is_empty() {
            return WindowData {
                times: Vec::new(),
                series: HashMap::new(),
            };
        }

        let center = times[current_index.min(times.len() - 1)];
        let half = window_size / 2.0;

        // times is sorted ascending, so the window is a contiguous range
        let lo = times.partition_point(|&t| t < center - half);
        let hi = times.partition_point(|&t| t <= center + half);

        let window_times = times[lo..hi].to_vec();

        let mut series = HashMap::with_capacity(series_data.len());
        for (id, values) in series_data {
            if filters.hidden_series.contains(id) {
                continue;
            }
            let slice = &values[lo..hi];
            let (ts, vs) = downsample::reduce(
                filters.downsample_method,
                filters.preserve_features,
                &times[lo..hi],
                slice,
                filters.max_points_per_window,
            );
            series.insert(id.clone(), SeriesWindow { times: ts, values: vs });
        }

        WindowData {
            times: window_times,
            series,
        }
    }
}
