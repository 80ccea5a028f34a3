//! Per-frame contamination screening.
//!
//! A dark taken with the shutter open, a star field leaking in, or a
//! gradient across the sensor all leave statistical fingerprints. Each
//! frame runs a four-test battery; the first failing test names the
//! rejection reason.

pub mod stats;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fits::pixels::read_pixels;
use crate::frame::FrameInfo;
use crate::group::Group;

pub use stats::ImageStats;

/// Screening thresholds. The defaults encode the sensor-scale heuristics
/// the battery was tuned with; loosen them for cameras with unusual
/// offsets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// Maximum median level in ADU. Higher means light got in.
    pub max_median_adu: f64,
    /// Maximum fraction of pixels above `mean + 3*std`.
    pub max_hot_pixel_fraction: f64,
    /// Maximum MAD/median.
    pub max_mad_ratio: f64,
    /// Maximum (p90 - p10)/median.
    pub max_central_dispersion: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            max_median_adu: 200.0,
            max_hot_pixel_fraction: 0.002,
            max_mad_ratio: 0.15,
            max_central_dispersion: 0.4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// Pixel data could not be read at all.
    UnreadablePixels,
    /// Median is zero or negative; the ratio statistics are undefined.
    NonPositiveMedian,
    /// Median too high, probable light leak or open shutter.
    MedianCeiling,
    /// Too many bright outliers, probable stars or defects.
    HotPixelFraction,
    /// MAD/median too high, non-uniform illumination.
    RelativeNoise,
    /// Central spread too wide, global variability or vignetting.
    CentralDispersion,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadablePixels => write!(f, "unreadable-pixels"),
            Self::NonPositiveMedian => write!(f, "non-positive-median"),
            Self::MedianCeiling => write!(f, "median-ceiling"),
            Self::HotPixelFraction => write!(f, "hot-pixel-fraction"),
            Self::RelativeNoise => write!(f, "relative-noise"),
            Self::CentralDispersion => write!(f, "central-dispersion"),
        }
    }
}

/// A frame the validator refused, with the evidence.
#[derive(Clone, Debug)]
pub struct RejectedFrame {
    pub frame: FrameInfo,
    pub reason: RejectReason,
    /// Absent when the pixels could not be read.
    pub stats: Option<ImageStats>,
}

/// Screen every frame of a group.
///
/// Reads one pixel rectangle at a time and releases it before the next,
/// keeping peak memory at one frame. Accepted frames keep the group's
/// order; `accepted.len() + rejected.len() == group.len()` always holds.
pub fn validate_group(
    group: &Group,
    thresholds: &ValidationThresholds,
) -> (Vec<FrameInfo>, Vec<RejectedFrame>) {
    let mut accepted = Vec::with_capacity(group.frames.len());
    let mut rejected = Vec::new();

    for frame in &group.frames {
        let pixels = match read_pixels(&frame.path) {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read pixels of {}: {e}", frame.path.display());
                rejected.push(RejectedFrame {
                    frame: frame.clone(),
                    reason: RejectReason::UnreadablePixels,
                    stats: None,
                });
                continue;
            }
        };
        let stats = stats::compute(&pixels);
        drop(pixels);

        match screen(&stats, thresholds) {
            None => {
                debug!(
                    path = %frame.path.display(),
                    median = stats.median,
                    mad = stats.mad,
                    "frame passed validation"
                );
                accepted.push(frame.clone());
            }
            Some(reason) => {
                warn!(
                    path = %frame.path.display(),
                    %reason,
                    median = stats.median,
                    hot_pixel_fraction = stats.hot_pixel_fraction,
                    mad_ratio = stats.mad_ratio,
                    central_dispersion = stats.central_dispersion,
                    "frame rejected"
                );
                rejected.push(RejectedFrame {
                    frame: frame.clone(),
                    reason,
                    stats: Some(stats),
                });
            }
        }
    }

    (accepted, rejected)
}

/// Run the battery; `None` means the frame is clean. Tests run in fixed
/// order and the first failure wins.
fn screen(stats: &ImageStats, t: &ValidationThresholds) -> Option<RejectReason> {
    if stats.median <= 0.0 {
        return Some(RejectReason::NonPositiveMedian);
    }
    if stats.median > t.max_median_adu {
        return Some(RejectReason::MedianCeiling);
    }
    if stats.hot_pixel_fraction > t.max_hot_pixel_fraction {
        return Some(RejectReason::HotPixelFraction);
    }
    if stats.mad_ratio > t.max_mad_ratio {
        return Some(RejectReason::RelativeNoise);
    }
    if stats.central_dispersion > t.max_central_dispersion {
        return Some(RejectReason::CentralDispersion);
    }
    None
}
