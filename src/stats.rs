// Statistics over the value bag of a single group: box statistics, kernel
// density curves, histogram bins and part/whole shares.
//
// Nothing here fails. Empty or degenerate input maps to an explicit result
// (`None`, `Density::Empty`, a share with `whole == 0`) so a renderer can show
// "not enough data" instead of a zero.

use serde::Serialize;
use std::cmp::Ordering;

pub const KDE_GRID_POINTS: usize = 100;
pub const DEFAULT_BANDWIDTH: f64 = 0.5;
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 20;

pub const VIOLIN_DOMAIN: (f64, f64) = (0.0, 120.0);
pub const VIOLIN_BIN_WIDTH: f64 = 5.0;

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Linear-interpolation quantile of ascending `sorted_data` (R type 7):
/// interpolate between the floor and ceil ranks of `p * (n - 1)`.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 { return 0.0; }
    if n == 1 { return sorted_data[0]; }

    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    let lo = sorted_data[lower_idx];
    let hi = sorted_data[upper_idx];
    if lower_idx == upper_idx {
        lo
    } else {
        let weight = rank - lower_idx as f64;
        (lo + (hi - lo) * weight).clamp(lo, hi)
    }
}

// =============================================================================
// Box statistics
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub min: f64,
    pub max: f64,
    /// Ascending
    pub outliers: Vec<f64>,
    pub count: usize,
}

/// Quartiles, 1.5 IQR fences, whiskers and outliers. `None` for no values.
///
/// Whiskers are the most extreme observed values inside the fences. When
/// interpolation puts a quartile beyond every in-fence observation (tiny
/// samples), the whisker is held at the quartile so that
/// `whisker_low <= q1` and `q3 <= whisker_high` always hold.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);

    let q1 = percentile(&sorted, 0.25);
    let median = percentile(&sorted, 0.50);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;

    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let whisker_low = sorted
        .iter()
        .copied()
        .find(|&v| v >= lower_fence)
        .unwrap_or(min)
        .min(q1);
    let whisker_high = sorted
        .iter()
        .rev()
        .copied()
        .find(|&v| v <= upper_fence)
        .unwrap_or(max)
        .max(q3);

    let outliers: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|&v| v < whisker_low || v > whisker_high)
        .collect();

    Some(BoxStats {
        q1,
        median,
        q3,
        iqr,
        lower_fence,
        upper_fence,
        whisker_low,
        whisker_high,
        min,
        max,
        outliers,
        count: sorted.len(),
    })
}

/// Tooltip summary of a value bag
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    Some(Summary {
        count: sorted.len(),
        min: sorted[0],
        median: percentile(&sorted, 0.5),
        max: sorted[sorted.len() - 1],
    })
}

// =============================================================================
// Kernel density
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityPoint {
    pub x: f64,
    pub density: f64,
}

/// Density curve scaled so its peak is 1.0
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Density {
    /// No observations, or no usable bandwidth
    Empty,
    /// A single observation: unit-height spike at `x`
    Spike { x: f64 },
    Curve { points: Vec<DensityPoint> },
}

impl Density {
    pub fn points(&self) -> Vec<DensityPoint> {
        match self {
            Density::Empty => Vec::new(),
            Density::Spike { x } => vec![DensityPoint { x: *x, density: 1.0 }],
            Density::Curve { points } => points.clone(),
        }
    }

    pub fn peak(&self) -> Option<f64> {
        self.points()
            .iter()
            .map(|p| p.density)
            .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.max(d))))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Density::Empty)
    }
}

/// Log of the unnormalized Gaussian kernel. The `1 / sqrt(2 pi)` factor and
/// the `1 / (n * bandwidth)` scale are dropped: the curve is rescaled to a
/// unit peak anyway.
fn log_gaussian_kernel(u: f64) -> f64 {
    -0.5 * u * u
}

/// `ln(sum(exp(terms)))` without underflow
fn log_sum_exp(terms: impl Iterator<Item = f64> + Clone) -> f64 {
    let max = terms.clone().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + terms.map(|t| (t - max).exp()).sum::<f64>().ln()
}

/// Gaussian KDE on a fixed grid.
///
/// The grid has `KDE_GRID_POINTS` points spanning the observed range padded
/// by 10% of the range on each side; the bandwidth is
/// `factor * range / 10`. A zero range is treated as a range of 1.
pub fn kde(values: &[f64], factor: f64) -> Density {
    match values.len() {
        0 => return Density::Empty,
        1 => return Density::Spike { x: values[0] },
        _ => {}
    }

    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    let observed = max - min;
    let range = if observed > 0.0 { observed } else { 1.0 };
    let bandwidth = factor * range / 10.0;
    if !(bandwidth > 0.0 && bandwidth.is_finite()) {
        return Density::Empty;
    }

    let start = min - range * 0.1;
    let end = max + range * 0.1;
    let step = (end - start) / (KDE_GRID_POINTS - 1) as f64;

    // Work in log space so a narrow bandwidth cannot underflow every term
    let log_densities: Vec<(f64, f64)> = (0..KDE_GRID_POINTS)
        .map(|i| {
            let x = start + i as f64 * step;
            let log_density =
                log_sum_exp(values.iter().map(move |&v| log_gaussian_kernel((x - v) / bandwidth)));
            (x, log_density)
        })
        .collect();

    let peak = log_densities
        .iter()
        .fold(f64::NEG_INFINITY, |a, &(_, d)| a.max(d));
    if !peak.is_finite() {
        return Density::Empty;
    }

    // Normalize density to 0-1 range for rendering
    let points = log_densities
        .into_iter()
        .map(|(x, d)| DensityPoint {
            x,
            density: (d - peak).exp(),
        })
        .collect();

    Density::Curve { points }
}

// =============================================================================
// Histogram bins
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub x0: f64,
    pub x1: f64,
    pub count: usize,
}

/// Fixed-width bins over `[lo, hi]`. Bins are half-open except the last,
/// which also takes values equal to `hi`. Values outside the domain are
/// ignored and trailing empty bins are trimmed.
pub fn histogram(values: &[f64], lo: f64, hi: f64, width: f64) -> Vec<Bin> {
    if !(width > 0.0) || !(hi > lo) {
        return Vec::new();
    }

    let bin_count = ((hi - lo) / width).ceil() as usize;
    let mut bins: Vec<Bin> = (0..bin_count)
        .map(|i| Bin {
            x0: lo + i as f64 * width,
            x1: (lo + (i + 1) as f64 * width).min(hi),
            count: 0,
        })
        .collect();

    for &v in values {
        if !(v >= lo && v <= hi) {
            continue;
        }
        let idx = (((v - lo) / width).floor() as usize).min(bin_count - 1);
        bins[idx].count += 1;
    }

    while bins.last().is_some_and(|b| b.count == 0) {
        bins.pop();
    }
    bins
}

// =============================================================================
// Sample sufficiency
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sufficiency {
    NoData,
    Insufficient,
    Sufficient,
}

pub fn sufficiency(count: usize, min_sample_size: usize) -> Sufficiency {
    if count == 0 {
        Sufficiency::NoData
    } else if count < min_sample_size {
        Sufficiency::Insufficient
    } else {
        Sufficiency::Sufficient
    }
}

// =============================================================================
// Shares
// =============================================================================

/// A part of a whole, with the remainder clamped at zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Share {
    pub part: f64,
    pub whole: f64,
    pub other: f64,
    /// `part / whole`, or 0 when the whole is not positive
    pub share: f64,
}

pub fn share(part: f64, whole: f64) -> Share {
    Share {
        part,
        whole,
        other: (whole - part).max(0.0),
        share: if whole > 0.0 { part / whole } else { 0.0 },
    }
}

impl Share {
    pub fn percentage(&self) -> f64 {
        self.share * 100.0
    }

    /// False when there is no whole to take a share of
    pub fn has_data(&self) -> bool {
        self.whole > 0.0
    }

    /// Cells to fill in a grid of `total` cells
    pub fn filled_cells(&self, total: usize) -> usize {
        let filled = (self.share * total as f64).round();
        filled.clamp(0.0, total as f64) as usize
    }
}
