#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use darklib_core::fits::{FitsHeader, FitsValue, BLOCK_SIZE};
use darklib_core::frame::{Binning, FrameInfo, FrameKind};

/// Builder for synthetic 16-bit FITS dark frames.
///
/// Defaults describe a plausible cooled mono camera; override what a test
/// cares about.
pub struct FitsSpec {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
    header: FitsHeader,
}

impl FitsSpec {
    /// A 64x64 dark at -10 C, 300 s, gain 100, binning 1x1.
    pub fn dark(date_obs: &str) -> Self {
        let width = 64;
        let height = 64;
        let mut header = FitsHeader::new();
        header.set_logical("SIMPLE", true);
        header.set_int("BITPIX", 16);
        header.set_int("NAXIS", 2);
        header.set_int("NAXIS1", width as i64);
        header.set_int("NAXIS2", height as i64);
        header.set_int("BZERO", 32768);
        header.set_int("BSCALE", 1);
        header.set_str("DATE-OBS", date_obs);
        header.set_str("IMAGETYP", "Dark");
        header.set_str("INSTRUME", "TestCam");
        header.set_real("CCD-TEMP", -10.0);
        header.set_real("EXPTIME", 300.0);
        header.set_real("GAIN", 100.0);
        header.set_int("XBINNING", 1);
        header.set_int("YBINNING", 1);
        Self {
            width,
            height,
            pixels: noisy_pixels(width * height, 100, 10, 1),
            header,
        }
    }

    pub fn set(mut self, keyword: &str, value: FitsValue) -> Self {
        self.header.set(keyword, value);
        self
    }

    pub fn set_str(self, keyword: &str, value: &str) -> Self {
        self.set(keyword, FitsValue::Str(value.to_string()))
    }

    pub fn set_real(self, keyword: &str, value: f64) -> Self {
        self.set(keyword, FitsValue::Real(value))
    }

    pub fn set_int(self, keyword: &str, value: i64) -> Self {
        self.set(keyword, FitsValue::Int(value))
    }

    pub fn pixels(mut self, pixels: Vec<u16>) -> Self {
        assert_eq!(pixels.len(), self.width * self.height);
        self.pixels = pixels;
        self
    }

    /// Full file bytes: header block(s) plus big-endian BZERO-shifted data.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = self.header.encode();
        for &v in &self.pixels {
            let raw = (v as i32 - 32768) as i16;
            out.extend_from_slice(&raw.to_be_bytes());
        }
        let pad = (BLOCK_SIZE - out.len() % BLOCK_SIZE) % BLOCK_SIZE;
        out.resize(out.len() + pad, 0);
        out
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.bytes()).expect("write synthetic FITS");
    }
}

/// Constant-level pixel field.
pub fn flat_pixels(n: usize, level: u16) -> Vec<u16> {
    vec![level; n]
}

/// Uniform pseudo-noise in `[base - amplitude, base + amplitude]`,
/// deterministic for a given seed.
pub fn noisy_pixels(n: usize, base: u16, amplitude: u16, seed: u64) -> Vec<u16> {
    let span = 2 * amplitude as u64 + 1;
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let offset = ((state >> 33) % span) as i64 - amplitude as i64;
            (base as i64 + offset).clamp(0, u16::MAX as i64) as u16
        })
        .collect()
}

/// Spray `count` saturated pixels over a field, evenly spaced.
pub fn with_hot_pixels(mut pixels: Vec<u16>, count: usize, value: u16) -> Vec<u16> {
    let stride = (pixels.len() / count).max(1);
    for i in 0..count {
        pixels[i * stride] = value;
    }
    pixels
}

/// A bare `FrameInfo` for tests that never touch the filesystem.
pub fn frame_info(path: &str, acquired_at: &str) -> FrameInfo {
    FrameInfo {
        path: PathBuf::from(path),
        acquired_at: parse_utc(acquired_at),
        camera_id: "TestCam".to_string(),
        binning: Binning { h: 1, v: 1 },
        gain: 100,
        exposure_s: 300.0,
        temperature_c: -10.0,
        is_cfa: false,
        kind: FrameKind::Dark,
    }
}

pub fn parse_utc(text: &str) -> DateTime<Utc> {
    darklib_core::frame::parse_timestamp(text).expect("test timestamp")
}
