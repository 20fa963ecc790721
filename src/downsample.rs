// Shape-preserving downsampling
//
// Reduces a window slice to a display-safe point budget. Three methods:
// - LTTB (Largest Triangle Three Buckets): best visual shape preservation.
//   Reference: Sveinn Steinarsson, "Downsampling Time Series for Visual
//   Representation"
// - Min-max: per-bucket extreme pairs, best peak preservation
// - Adaptive: picks between the two based on the compression ratio
//
// All methods copy; caller buffers are never mutated. The caller is
// responsible for pre-sorting by time; given strictly increasing input x the
// output x is strictly increasing.

use crate::types::DownsampleMethod;
use std::collections::BTreeSet;

/// Compression ratio above which `Adaptive` switches from LTTB to min-max.
/// At extreme ratios individual triangle choices stop mattering and keeping
/// the per-bucket extremes reads better on screen.
const ADAPTIVE_MINMAX_RATIO: usize = 32;

/// Downsample one series to at most `max_points` using the configured method.
///
/// Inputs below the budget are returned unchanged (copied).
pub fn reduce(
    method: DownsampleMethod,
    preserve_features: bool,
    x: &[f64],
    y: &[f64],
    max_points: usize,
) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(x.len(), y.len());

    if x.len() <= max_points {
        return (x.to_vec(), y.to_vec());
    }

    match method {
        DownsampleMethod::Lttb => {
            if preserve_features {
                lttb_with_features(x, y, max_points)
            } else {
                lttb(x, y, max_points)
            }
        }
        DownsampleMethod::Minmax => minmax(x, y, max_points),
        DownsampleMethod::Adaptive => {
            let effective = if max_points > 0 && x.len() / max_points >= ADAPTIVE_MINMAX_RATIO {
                DownsampleMethod::Minmax
            } else {
                DownsampleMethod::Lttb
            };
            reduce(effective, preserve_features, x, y, max_points)
        }
    }
}

/// LTTB downsampling over paired x/y arrays.
pub fn lttb(x: &[f64], y: &[f64], max_points: usize) -> (Vec<f64>, Vec<f64>) {
    materialize(x, y, &lttb_indices(x, y, max_points))
}

/// LTTB selection returning the kept indices rather than values.
///
/// The first and last points are always kept. The interior is partitioned
/// into `max_points - 2` buckets with float boundaries floored to index
/// ranges; within each bucket the point maximizing the triangle area against
/// the previously selected point and the next bucket's centroid wins, ties
/// resolving to the lowest index.
pub fn lttb_indices(x: &[f64], y: &[f64], max_points: usize) -> Vec<usize> {
    let n = x.len();

    if n <= max_points {
        return (0..n).collect();
    }

    // Degenerate budget: first, middle, last by index
    if max_points < 3 {
        let mut selected = vec![0, n / 2, n - 1];
        selected.dedup();
        return selected;
    }

    let bucket_size = (n - 2) as f64 / (max_points - 2) as f64;

    let mut selected = Vec::with_capacity(max_points);
    selected.push(0);

    let mut a = 0usize; // previously selected point
    for i in 0..(max_points - 2) {
        let bucket_start = (i as f64 * bucket_size) as usize + 1;
        let bucket_end = (((i + 1) as f64 * bucket_size) as usize + 1).min(n - 1);

        // Centroid of the next bucket; the final bucket's reference is the
        // already-selected last point
        let next_start = bucket_end;
        let next_end = (((i + 2) as f64 * bucket_size) as usize + 1).min(n - 1);
        let (avg_x, avg_y) = centroid(x, y, next_start, next_end).unwrap_or((x[n - 1], y[n - 1]));

        let ax = x[a];
        let ay = y[a];

        let mut max_area = -1.0f64;
        let mut max_idx: Option<usize> = None;
        for j in bucket_start..bucket_end {
            if y[j].is_nan() {
                continue;
            }
            // Shoelace triangle area (scaled by 2), first maximum wins
            let area = ((ax - avg_x) * (y[j] - ay) - (ax - x[j]) * (avg_y - ay)).abs();
            if area > max_area {
                max_area = area;
                max_idx = Some(j);
            }
        }

        // All-NaN areas: nearest non-NaN index in the bucket, then the
        // bucket boundary if the whole bucket is NaN
        let chosen = max_idx
            .or_else(|| (bucket_start..bucket_end).find(|&j| !y[j].is_nan()))
            .unwrap_or(bucket_start);

        selected.push(chosen);
        a = chosen;
    }

    selected.push(n - 1);
    selected
}

/// Min-max downsampling: per-bucket extreme pairs in index order.
pub fn minmax(x: &[f64], y: &[f64], max_points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    if n <= max_points {
        return (x.to_vec(), y.to_vec());
    }

    let target_buckets = (max_points / 2).max(1);
    let bucket_size = (n / target_buckets).max(1);

    let mut out_x = Vec::with_capacity(target_buckets * 2);
    let mut out_y = Vec::with_capacity(target_buckets * 2);

    for bucket_idx in 0..target_buckets {
        let start = bucket_idx * bucket_size;
        let end = if bucket_idx == target_buckets - 1 {
            n
        } else {
            ((bucket_idx + 1) * bucket_size).min(n)
        };
        if start >= end {
            break;
        }

        let mut min_idx: Option<usize> = None;
        let mut max_idx: Option<usize> = None;
        for j in start..end {
            if y[j].is_nan() {
                continue;
            }
            if min_idx.map_or(true, |m| y[j] < y[m]) {
                min_idx = Some(j);
            }
            if max_idx.map_or(true, |m| y[j] > y[m]) {
                max_idx = Some(j);
            }
        }

        match (min_idx, max_idx) {
            (Some(lo), Some(hi)) if lo != hi => {
                // Emit in index order so output x stays increasing
                let (first, second) = if lo < hi { (lo, hi) } else { (hi, lo) };
                out_x.push(x[first]);
                out_y.push(y[first]);
                out_x.push(x[second]);
                out_y.push(y[second]);
            }
            (Some(only), _) => {
                out_x.push(x[only]);
                out_y.push(y[only]);
            }
            // Whole bucket NaN: nothing representable, skip it
            (None, _) => {}
        }
    }

    (out_x, out_y)
}

/// LTTB with feature preservation: local extrema and curvature inflection
/// points are forced to survive, LTTB-only picks are the first to go when
/// the union exceeds the budget. If features alone exceed the budget they
/// are truncated to the first `max_points` — an accepted information-loss
/// policy at pathological feature densities.
pub fn lttb_with_features(x: &[f64], y: &[f64], max_points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    if n <= max_points {
        return (x.to_vec(), y.to_vec());
    }

    let base = lttb_indices(x, y, max_points);
    if max_points < 3 {
        return materialize(x, y, &base);
    }

    let mut priority: BTreeSet<usize> = feature_indices(y).into_iter().collect();
    priority.insert(0);
    priority.insert(n - 1);

    let union: BTreeSet<usize> = priority.iter().copied().chain(base.iter().copied()).collect();
    if union.len() <= max_points {
        let selected: Vec<usize> = union.into_iter().collect();
        return materialize(x, y, &selected);
    }

    if priority.len() >= max_points {
        let selected: Vec<usize> = priority.into_iter().take(max_points).collect();
        return materialize(x, y, &selected);
    }

    // Keep every feature, fill the remaining budget with LTTB picks in
    // ascending order
    let mut selected = priority;
    for idx in base {
        if selected.len() == max_points {
            break;
        }
        selected.insert(idx);
    }
    let selected: Vec<usize> = selected.into_iter().collect();
    materialize(x, y, &selected)
}

/// Detect feature indices: strict local maxima ("peaks"), strict local
/// minima ("valleys"), and sign changes of the discrete second derivative
/// ("edges"). Windows touching NaN are skipped.
pub fn feature_indices(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut features = Vec::new();

    for i in 1..n.saturating_sub(1) {
        let (a, b, c) = (y[i - 1], y[i], y[i + 1]);
        if a.is_nan() || b.is_nan() || c.is_nan() {
            continue;
        }
        if (b > a && b > c) || (b < a && b < c) {
            features.push(i);
        }
    }

    let mut prev_sign = 0i8;
    for i in 1..n.saturating_sub(1) {
        if y[i - 1].is_nan() || y[i].is_nan() || y[i + 1].is_nan() {
            prev_sign = 0;
            continue;
        }
        let d2 = y[i + 1] - 2.0 * y[i] + y[i - 1];
        let sign = if d2 > 0.0 {
            1
        } else if d2 < 0.0 {
            -1
        } else {
            0
        };
        if sign != 0 {
            if prev_sign != 0 && sign != prev_sign {
                features.push(i);
            }
            prev_sign = sign;
        }
    }

    features.sort_unstable();
    features.dedup();
    features
}

fn centroid(x: &[f64], y: &[f64], start: usize, end: usize) -> Option<(f64, f64)> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for j in start..end {
        if y[j].is_nan() {
            continue;
        }
        sum_x += x[j];
        sum_y += y[j];
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some((sum_x / count as f64, sum_y / count as f64))
    }
}

fn materialize(x: &[f64], y: &[f64], indices: &[usize]) -> (Vec<f64>, Vec<f64>) {
    (
        indices.iter().map(|&i| x[i]).collect(),
        indices.iter().map(|&i| y[i]).collect(),
    )
}
