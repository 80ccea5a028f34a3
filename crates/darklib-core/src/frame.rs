//! Frame metadata and the acquisition equivalence key.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::fits::FitsHeader;

/// Exposures at or below this are treated as bias frames when the header
/// carries no explicit image-kind hint.
pub const BIAS_EXPOSURE_CEILING_S: f64 = 0.05;

/// Temperature keywords, probed in order. Capture software disagrees on
/// the spelling.
const TEMPERATURE_KEYWORDS: [&str; 6] = [
    "CCD-TEMP",
    "CCDTEMP",
    "SET-TEMP",
    "CCD_TEMP",
    "SENSOR-TEMP",
    "TEMP",
];

const CAMERA_KEYWORDS: [&str; 3] = ["INSTRUME", "INSTRUMENT", "CAMERA"];

/// Sensor binning (horizontal, vertical).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Binning {
    pub h: u32,
    pub v: u32,
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.h, self.v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Dark,
    Bias,
    Other,
}

/// Metadata of one input frame, extracted from its header by the scanner.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub path: PathBuf,
    pub acquired_at: DateTime<Utc>,
    pub camera_id: String,
    pub binning: Binning,
    pub gain: i64,
    pub exposure_s: f64,
    pub temperature_c: f64,
    pub is_cfa: bool,
    pub kind: FrameKind,
}

impl FrameInfo {
    /// Extract frame metadata from a FITS header.
    ///
    /// Returns `None` when a required field (timestamp, temperature,
    /// exposure, gain or camera) is missing or unparseable.
    pub fn from_header(path: &Path, header: &FitsHeader) -> Option<Self> {
        let acquired_at = parse_timestamp(header.get_str("DATE-OBS")?)?;
        let temperature_c = TEMPERATURE_KEYWORDS
            .iter()
            .find_map(|k| header.get_real(k))?;
        let exposure_s = header
            .get_real("EXPTIME")
            .or_else(|| header.get_real("EXPOSURE"))?;
        let gain = header.get_real("GAIN")?.round() as i64;
        let camera_raw = CAMERA_KEYWORDS.iter().find_map(|k| header.get_str(k))?;
        let camera_id = normalize_camera_id(camera_raw);
        if camera_id.is_empty() {
            return None;
        }
        let binning = read_binning(header);
        let is_cfa =
            header.contains("BAYERPAT") || header.get_logical("CFA").unwrap_or(false);
        let kind = match header.get_str("IMAGETYP") {
            Some(hint) => {
                let hint = hint.to_ascii_lowercase();
                if hint.contains("dark") {
                    FrameKind::Dark
                } else if hint.contains("bias") {
                    FrameKind::Bias
                } else {
                    FrameKind::Other
                }
            }
            None if exposure_s <= BIAS_EXPOSURE_CEILING_S => FrameKind::Bias,
            None => FrameKind::Dark,
        };
        Some(Self {
            path: path.to_path_buf(),
            acquired_at,
            camera_id,
            binning,
            gain,
            exposure_s,
            temperature_c,
            is_cfa,
            kind,
        })
    }
}

fn read_binning(header: &FitsHeader) -> Binning {
    if let Some(h) = header.get_int("XBINNING") {
        let v = header.get_int("YBINNING").unwrap_or(h);
        return Binning {
            h: h.max(1) as u32,
            v: v.max(1) as u32,
        };
    }
    if let Some(s) = header.get_str("BINNING") {
        if let Some((h, v)) = s.split_once('x') {
            if let (Ok(h), Ok(v)) = (h.trim().parse(), v.trim().parse()) {
                return Binning { h, v };
            }
        }
    }
    Binning { h: 1, v: 1 }
}

/// Parse a FITS DATE-OBS timestamp. Accepts RFC 3339 as well as the bare
/// `YYYY-MM-DDThh:mm:ss[.fff]` form (assumed UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Normalise a camera identifier for use in group keys and filenames:
/// non-ASCII bytes are dropped, every other non-alphanumeric becomes `_`,
/// trailing underscores are trimmed.
pub fn normalize_camera_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if c.is_ascii() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Quantise `x` onto a grid of step `q`, rounding half-values to even to
/// avoid drift at bucket boundaries.
pub fn quantize(x: f64, q: f64) -> f64 {
    (x / q).round_ties_even() * q
}

/// The acquisition equivalence class. Frames with equal keys may be
/// stacked together.
///
/// Exposure and quantised temperature are held in integral milli-units so
/// the key is `Eq + Ord + Hash` without floating-point comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub camera_id: String,
    pub binning: Binning,
    pub gain: i64,
    exposure_ms: i64,
    temperature_mdeg: i64,
    pub is_cfa: bool,
}

impl GroupKey {
    pub fn of(frame: &FrameInfo, temperature_precision: f64) -> Self {
        let quantised = quantize(frame.temperature_c, temperature_precision);
        Self {
            camera_id: frame.camera_id.clone(),
            binning: frame.binning,
            gain: frame.gain,
            exposure_ms: (frame.exposure_s * 1000.0).round() as i64,
            temperature_mdeg: (quantised * 1000.0).round() as i64,
            is_cfa: frame.is_cfa,
        }
    }

    pub fn exposure_s(&self) -> f64 {
        self.exposure_ms as f64 / 1000.0
    }

    /// Quantised temperature in °C.
    pub fn temperature_c(&self) -> f64 {
        self.temperature_mdeg as f64 / 1000.0
    }

    /// Library filename of the master for this key.
    pub fn filename(&self) -> String {
        format!("{self}.fits")
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_T{}_E{}_G{}_B{}{}",
            self.camera_id,
            self.temperature_c(),
            self.exposure_s(),
            self.gain,
            self.binning,
            if self.is_cfa { "_cfa" } else { "" }
        )
    }
}
