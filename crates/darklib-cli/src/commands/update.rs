use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use darklib_core::cancel::CancellationToken;
use darklib_core::config::UpdateConfig;
use darklib_core::pipeline::run_update;
use darklib_core::stacker::{
    EngineMode, OutputNorm, RejectionMethod, StackMethod, StackParams,
};

use crate::summary::print_report;

#[derive(Args)]
pub struct UpdateArgs {
    /// Directories containing raw dark/bias frames
    #[arg(long = "input-dir", value_name = "DIR")]
    pub input_dirs: Vec<PathBuf>,

    /// Master dark library directory
    #[arg(long, value_name = "DIR")]
    pub library: Option<PathBuf>,

    /// Scratch directory for staging and engine output
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Run config file (TOML); command-line options override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum age in days relative to the newest scanned frame
    #[arg(long)]
    pub max_age: Option<i64>,

    /// Temperature bucket size in degrees C
    #[arg(long)]
    pub temperature_precision: Option<f64>,

    /// Rebuild a dated master once a group reaches this many frames
    /// (0 = only when the group has more frames than the master)
    #[arg(long)]
    pub min_frames: Option<usize>,

    /// Rebuild all masters regardless of dates and frame counts
    #[arg(long)]
    pub force: bool,

    /// Plan and log without invoking the engine or touching the library
    #[arg(long)]
    pub dry_run: bool,

    /// Log files the scanner skipped
    #[arg(long)]
    pub log_skipped: bool,

    /// Stacking method
    #[arg(long, value_enum)]
    pub stack_method: Option<StackMethodArg>,

    /// Pixel rejection method
    #[arg(long, value_enum)]
    pub rejection_method: Option<RejectionMethodArg>,

    /// First rejection parameter
    #[arg(long)]
    pub rejection_param1: Option<f64>,

    /// Second rejection parameter
    #[arg(long)]
    pub rejection_param2: Option<f64>,

    /// Output normalisation
    #[arg(long, value_enum)]
    pub output_norm: Option<OutputNormArg>,

    /// How the stacking engine is launched
    #[arg(long, value_enum)]
    pub engine_mode: Option<EngineModeArg>,

    /// Engine executable (native mode) or in-package command name
    #[arg(long, default_value = "siril")]
    pub engine: String,

    /// Container runtime executable (containerised mode)
    #[arg(long, default_value = "flatpak")]
    pub runtime: PathBuf,

    /// Container package id (containerised mode)
    #[arg(long, default_value = "org.siril.Siril")]
    pub package: String,

    /// Bundle path (bundle mode)
    #[arg(long)]
    pub bundle: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StackMethodArg {
    Average,
    Median,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RejectionMethodArg {
    None,
    Sigma,
    WinsorizedSigma,
    Minmax,
    Percentile,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputNormArg {
    Noscale,
    Addscale,
    Rejection,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EngineModeArg {
    Native,
    Containerised,
    Bundle,
}

pub fn run(args: &UpdateArgs) -> Result<()> {
    let config = build_config(args)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, finishing the current group then stopping");
        handler_token.cancel();
    })
    .context("failed to install interrupt handler")?;

    let pb = ProgressBar::hidden();
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Groups [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let report = run_update(&config, &cancel, |index, total, key| {
        if index == 0 {
            pb.set_length(total as u64);
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        pb.set_position(index as u64);
        pb.set_message(key.to_string());
    })?;
    pb.finish_and_clear();

    print_report(&report);

    if report.cancelled {
        bail!("run cancelled by user");
    }
    if !report.success() {
        bail!("{} group(s) failed", report.failures());
    }
    Ok(())
}

fn build_config(args: &UpdateArgs) -> Result<UpdateConfig> {
    let mut config = if let Some(ref path) = args.config {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).context("Invalid run config")?
    } else {
        UpdateConfig::default()
    };

    if !args.input_dirs.is_empty() {
        config.input_roots = args.input_dirs.clone();
    }
    if config.input_roots.is_empty() {
        bail!("no input directories given (use --input-dir or a config file)");
    }
    if let Some(ref library) = args.library {
        config.library_root = library.clone();
    }
    if let Some(ref work_dir) = args.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(max_age) = args.max_age {
        config.max_age_days = max_age;
    }
    if let Some(precision) = args.temperature_precision {
        config.temperature_precision = precision;
    }
    if let Some(min_frames) = args.min_frames {
        config.min_frames_threshold = min_frames;
    }
    config.force |= args.force;
    config.dry_run |= args.dry_run;
    config.log_skipped |= args.log_skipped;

    config.stacking = StackParams {
        stack_method: match args.stack_method {
            Some(StackMethodArg::Average) => StackMethod::Average,
            Some(StackMethodArg::Median) => StackMethod::Median,
            None => config.stacking.stack_method,
        },
        rejection_method: match args.rejection_method {
            Some(RejectionMethodArg::None) => RejectionMethod::None,
            Some(RejectionMethodArg::Sigma) => RejectionMethod::Sigma,
            Some(RejectionMethodArg::WinsorizedSigma) => RejectionMethod::WinsorizedSigma,
            Some(RejectionMethodArg::Minmax) => RejectionMethod::Minmax,
            Some(RejectionMethodArg::Percentile) => RejectionMethod::Percentile,
            None => config.stacking.rejection_method,
        },
        rejection_param1: args
            .rejection_param1
            .unwrap_or(config.stacking.rejection_param1),
        rejection_param2: args
            .rejection_param2
            .unwrap_or(config.stacking.rejection_param2),
        output_norm: match args.output_norm {
            Some(OutputNormArg::Noscale) => OutputNorm::Noscale,
            Some(OutputNormArg::Addscale) => OutputNorm::Addscale,
            Some(OutputNormArg::Rejection) => OutputNorm::Rejection,
            None => config.stacking.output_norm,
        },
    };

    // The engine section of a config file stands unless an engine mode is
    // named on the command line.
    if let Some(mode) = args.engine_mode {
        config.engine = match mode {
            EngineModeArg::Native => EngineMode::Native {
                engine: PathBuf::from(&args.engine),
            },
            EngineModeArg::Containerised => EngineMode::Containerised {
                runtime: args.runtime.clone(),
                engine: args.engine.clone(),
                package: args.package.clone(),
            },
            EngineModeArg::Bundle => {
                let bundle = args
                    .bundle
                    .clone()
                    .context("--bundle is required with --engine-mode bundle")?;
                EngineMode::Bundle { bundle }
            }
        };
    }

    Ok(config)
}
