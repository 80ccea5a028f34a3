//! Run configuration.
//!
//! An immutable parameter record built once by the front-end; the update
//! run is a pure function of this record plus the input set.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::stacker::{EngineMode, StackParams};
use crate::validate::ValidationThresholds;

fn default_max_age_days() -> i64 {
    182
}

fn default_temperature_precision() -> f64 {
    0.5
}

fn default_engine() -> EngineMode {
    EngineMode::Native {
        engine: PathBuf::from("siril"),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Directories scanned recursively for raw dark/bias frames.
    pub input_roots: Vec<PathBuf>,
    /// Where the master frames live.
    pub library_root: PathBuf,
    /// Scratch space for staging and engine output.
    pub work_dir: PathBuf,
    /// Frames older than this relative to the newest scanned frame are
    /// ignored.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    /// Grid step for temperature bucketing, in °C.
    #[serde(default = "default_temperature_precision")]
    pub temperature_precision: f64,
    /// A group with at least this many frames rebuilds a dated master
    /// even without exceeding its frame count. 0 disables the criterion.
    #[serde(default)]
    pub min_frames_threshold: usize,
    /// Rebuild every group regardless of the existing masters.
    #[serde(default)]
    pub force: bool,
    /// Plan and log everything, but never spawn the engine or touch the
    /// library.
    #[serde(default)]
    pub dry_run: bool,
    /// Log every file the scanner skipped.
    #[serde(default)]
    pub log_skipped: bool,
    #[serde(default)]
    pub validation: ValidationThresholds,
    #[serde(default)]
    pub stacking: StackParams,
    #[serde(default = "default_engine")]
    pub engine: EngineMode,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            input_roots: Vec::new(),
            library_root: PathBuf::from("darklib"),
            work_dir: std::env::temp_dir().join("darklib-work"),
            max_age_days: default_max_age_days(),
            temperature_precision: default_temperature_precision(),
            min_frames_threshold: 0,
            force: false,
            dry_run: false,
            log_skipped: false,
            validation: ValidationThresholds::default(),
            stacking: StackParams::default(),
            engine: default_engine(),
        }
    }
}
