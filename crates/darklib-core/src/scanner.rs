//! Input discovery: walk the input roots, extract frame metadata, apply
//! the age window.

use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{DarkLibError, Result};
use crate::fits::FitsHeader;
use crate::frame::{FrameInfo, FrameKind};

const IMAGE_EXTENSIONS: [&str; 3] = ["fit", "fits", "fts"];

/// What a scan produced. `frames` carries the calibration frames inside
/// the age window; the other lists exist for diagnostics and counters.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub frames: Vec<FrameInfo>,
    /// Files skipped: unreadable header, missing metadata, or not a
    /// dark/bias frame.
    pub skipped: Vec<PathBuf>,
    /// Frames older than the age window relative to the newest scanned.
    pub age_filtered: Vec<FrameInfo>,
}

/// Recursively scan `roots` for dark and bias frames.
///
/// A missing root is fatal; an unreadable file only costs that file.
/// The age window is applied against the newest acquisition timestamp in
/// the whole scanned set, so the scanner buffers before filtering.
pub fn scan_roots(
    roots: &[PathBuf],
    max_age_days: i64,
    log_skipped: bool,
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();

    for root in roots {
        if !root.is_dir() {
            return Err(DarkLibError::InputRootMissing(root.clone()));
        }
        info!(root = %root.display(), "scanning input root");
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
                continue;
            }
            match read_frame_info(entry.path()) {
                Some(frame) if frame.kind != FrameKind::Other => {
                    outcome.frames.push(frame)
                }
                _ => outcome.skipped.push(entry.path().to_path_buf()),
            }
        }
    }

    if let Some(latest) = outcome.frames.iter().map(|f| f.acquired_at).max() {
        let max_age = Duration::days(max_age_days);
        let (kept, dropped): (Vec<_>, Vec<_>) = outcome
            .frames
            .drain(..)
            .partition(|f| latest - f.acquired_at <= max_age);
        outcome.frames = kept;
        outcome.age_filtered = dropped;
        for frame in &outcome.age_filtered {
            info!(
                path = %frame.path.display(),
                acquired = %frame.acquired_at,
                "frame older than {max_age_days} days relative to newest, filtered"
            );
        }
    }

    if log_skipped {
        for path in &outcome.skipped {
            info!(path = %path.display(), "skipped (unreadable or not a calibration frame)");
        }
    }
    debug!(
        frames = outcome.frames.len(),
        skipped = outcome.skipped.len(),
        age_filtered = outcome.age_filtered.len(),
        "scan complete"
    );

    Ok(outcome)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn read_frame_info(path: &Path) -> Option<FrameInfo> {
    let header = match FitsHeader::open(path) {
        Ok(h) => h,
        Err(e) => {
            warn!("cannot read header of {}: {e}", path.display());
            return None;
        }
    };
    let frame = FrameInfo::from_header(path, &header);
    if frame.is_none() {
        warn!("incomplete acquisition metadata in {}", path.display());
    }
    frame
}
