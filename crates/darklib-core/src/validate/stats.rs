//! Robust per-frame statistics.
//!
//! Order statistics use an in-place selection kernel instead of a full
//! sort; mean and standard deviation come from a single Welford pass.
//! A frame is typically tens of megapixels, so every kernel is O(n).

use ndarray::Array2;
use serde::Serialize;

/// Robust summary of a single frame's pixel rectangle.
///
/// `mad_ratio` and `central_dispersion` are meaningful only when
/// `median > 0`; they are zeroed otherwise and the validator rejects the
/// frame before consulting them.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ImageStats {
    pub median: f64,
    pub mad: f64,
    pub mean: f64,
    pub std: f64,
    pub p10: f64,
    pub p90: f64,
    pub mad_ratio: f64,
    pub central_dispersion: f64,
    pub hot_pixel_fraction: f64,
}

/// Compute the full statistic set over one pixel rectangle.
pub fn compute(data: &Array2<f32>) -> ImageStats {
    let n = data.len();
    debug_assert!(n > 0);

    // Welford accumulation in f64; f32 sums lose precision at frame sizes.
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut count = 0.0f64;
    for &v in data.iter() {
        let v = v as f64;
        count += 1.0;
        let delta = v - mean;
        mean += delta / count;
        m2 += delta * (v - mean);
    }
    let std = if n > 1 { (m2 / n as f64).sqrt() } else { 0.0 };

    let mut buf: Vec<f32> = data.iter().copied().collect();
    let median = median_of(&mut buf) as f64;

    let p10 = select_kth(&mut buf, nearest_rank(n, 0.10)) as f64;
    let p90 = select_kth(&mut buf, nearest_rank(n, 0.90)) as f64;

    // Reuse the buffer for absolute deviations from the median.
    for v in buf.iter_mut() {
        *v = (*v as f64 - median).abs() as f32;
    }
    let mad = median_of(&mut buf) as f64;

    let hot_threshold = mean + 3.0 * std;
    let hot = data.iter().filter(|&&v| (v as f64) > hot_threshold).count();
    let hot_pixel_fraction = hot as f64 / n as f64;

    let (mad_ratio, central_dispersion) = if median > 0.0 {
        (mad / median, (p90 - p10) / median)
    } else {
        (0.0, 0.0)
    };

    ImageStats {
        median,
        mad,
        mean,
        std,
        p10,
        p90,
        mad_ratio,
        central_dispersion,
        hot_pixel_fraction,
    }
}

fn nearest_rank(n: usize, q: f64) -> usize {
    (((n - 1) as f64) * q).round() as usize
}

/// Median via selection; even-sized inputs average the two middle values.
fn median_of(values: &mut [f32]) -> f32 {
    let n = values.len();
    let hi = select_kth(values, n / 2);
    if n % 2 == 1 {
        hi
    } else {
        // After selection everything left of n/2 is <= hi, so the lower
        // middle element is the maximum of that prefix.
        let lo = values[..n / 2]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        (lo + hi) / 2.0
    }
}

/// Select the k-th smallest element (0-based), partially reordering `values`.
///
/// Quickselect with median-of-three pivoting and three-way partitioning;
/// the fat pivot keeps near-constant frames (the common case for darks)
/// linear.
fn select_kth(values: &mut [f32], k: usize) -> f32 {
    assert!(k < values.len());
    let mut lo = 0usize;
    let mut hi = values.len() - 1;
    loop {
        if lo == hi {
            return values[lo];
        }
        let pivot = median_of_three(values, lo, hi);
        let mut lt = lo;
        let mut gt = hi;
        let mut i = lo;
        while i <= gt {
            if values[i] < pivot {
                values.swap(i, lt);
                lt += 1;
                i += 1;
            } else if values[i] > pivot {
                values.swap(i, gt);
                if gt == 0 {
                    break;
                }
                gt -= 1;
            } else {
                i += 1;
            }
        }
        if k < lt {
            hi = lt - 1;
        } else if k > gt {
            lo = gt + 1;
        } else {
            return pivot;
        }
    }
}

fn median_of_three(values: &[f32], lo: usize, hi: usize) -> f32 {
    let mid = lo + (hi - lo) / 2;
    let (a, b, c) = (values[lo], values[mid], values[hi]);
    if (a <= b && b <= c) || (c <= b && b <= a) {
        b
    } else if (b <= a && a <= c) || (c <= a && a <= b) {
        a
    } else {
        c
    }
}
