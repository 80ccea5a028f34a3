//! Reading existing masters and stamping freshly stacked ones.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::error::{DarkLibError, Result};
use crate::fits::{rewrite_header, FitsHeader};
use crate::frame::{parse_timestamp, FrameInfo, GroupKey};

/// What the update policy needs to know about an existing master.
#[derive(Clone, Debug)]
pub struct MasterInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// From the NDARKS keyword; masters predating that keyword read as 0.
    pub n_frames_used: usize,
    /// From the STACKCMD keyword, if the master carries one.
    pub stack_signature: Option<String>,
}

/// Read the master at `path`, if there is one.
///
/// A present but unreadable master (no header, no timestamp) is treated
/// as absent: the policy will rebuild over it.
pub fn read_master(path: &Path) -> Option<MasterInfo> {
    if !path.is_file() {
        return None;
    }
    let header = match FitsHeader::open(path) {
        Ok(h) => h,
        Err(e) => {
            warn!(
                "existing master {} is unreadable ({e}), treating as absent",
                path.display()
            );
            return None;
        }
    };
    let created_at = match header.get_str("DATE-OBS").and_then(parse_timestamp) {
        Some(t) => t,
        None => {
            warn!(
                "existing master {} has no readable DATE-OBS, treating as absent",
                path.display()
            );
            return None;
        }
    };
    Some(MasterInfo {
        path: path.to_path_buf(),
        created_at,
        n_frames_used: header.get_int("NDARKS").map(|n| n.max(0) as usize).unwrap_or(0),
        stack_signature: header.get_str("STACKCMD").map(str::to_string),
    })
}

/// Stamp the group's identity and provenance into a freshly stacked
/// master (still at its temporary path).
///
/// Records every group key field, the newest acquisition timestamp of the
/// accepted frames, the frame count and the stack signature. The policy
/// reads these back on the next run.
pub fn stamp_master(
    path: &Path,
    key: &GroupKey,
    accepted: &[FrameInfo],
    signature: &str,
) -> Result<()> {
    let newest = accepted
        .iter()
        .map(|f| f.acquired_at)
        .max()
        .ok_or_else(|| DarkLibError::HeaderWriteFailed("no accepted frames".into()))?;

    let mut header = FitsHeader::open(path)
        .map_err(|e| DarkLibError::HeaderWriteFailed(e.to_string()))?;
    header.set_str("IMAGETYP", "Dark");
    header.set_str("CAMERA", &key.camera_id);
    header.set_int("XBINNING", key.binning.h as i64);
    header.set_int("YBINNING", key.binning.v as i64);
    header.set_str("BINNING", &key.binning.to_string());
    header.set_int("GAIN", key.gain);
    header.set_real("EXPTIME", key.exposure_s());
    header.set_real("CCD-TEMP", key.temperature_c());
    header.set_logical("CFA", key.is_cfa);
    // Millisecond precision so frames with fractional-second timestamps
    // compare equal on the next run instead of looking newer.
    header.set_str(
        "DATE-OBS",
        &newest.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    header.set_int("NDARKS", accepted.len() as i64);
    header.set_str("STACKCMD", signature);
    header.push_history(&format!(
        "Master dark created from {} frames",
        accepted.len()
    ));

    rewrite_header(path, &header).map_err(|e| DarkLibError::HeaderWriteFailed(e.to_string()))
}

/// One row of the library listing.
#[derive(Clone, Debug)]
pub struct MasterEntry {
    pub path: PathBuf,
    pub camera: Option<String>,
    pub temperature_c: Option<f64>,
    pub exposure_s: Option<f64>,
    pub gain: Option<i64>,
    pub binning: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub n_frames_used: Option<usize>,
    pub stack_signature: Option<String>,
}

/// Enumerate the masters in the library root (non-recursive), sorted by
/// exposure ascending then temperature descending.
pub fn list_masters(library_root: &Path) -> Result<Vec<MasterEntry>> {
    let mut entries = Vec::new();
    if !library_root.is_dir() {
        return Ok(entries);
    }
    for dir_entry in fs::read_dir(library_root)? {
        let path = dir_entry?.path();
        let is_fits = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "fit" | "fits" | "fts"))
            .unwrap_or(false);
        if !path.is_file() || !is_fits {
            continue;
        }
        let header = match FitsHeader::open(&path) {
            Ok(h) => h,
            Err(e) => {
                warn!("cannot read master header {}: {e}", path.display());
                continue;
            }
        };
        entries.push(MasterEntry {
            camera: header
                .get_str("CAMERA")
                .or_else(|| header.get_str("INSTRUME"))
                .map(str::to_string),
            temperature_c: header.get_real("CCD-TEMP"),
            exposure_s: header.get_real("EXPTIME"),
            gain: header.get_int("GAIN"),
            binning: header.get_str("BINNING").map(str::to_string),
            created_at: header.get_str("DATE-OBS").and_then(parse_timestamp),
            n_frames_used: header.get_int("NDARKS").map(|n| n.max(0) as usize),
            stack_signature: header.get_str("STACKCMD").map(str::to_string),
            path,
        });
    }
    entries.sort_by(|a, b| {
        let ea = a.exposure_s.unwrap_or(f64::MAX);
        let eb = b.exposure_s.unwrap_or(f64::MAX);
        ea.total_cmp(&eb).then_with(|| {
            let ta = a.temperature_c.unwrap_or(f64::MIN);
            let tb = b.temperature_c.unwrap_or(f64::MIN);
            tb.total_cmp(&ta)
        })
    });
    Ok(entries)
}
