//! Invocation of the external stacking engine.
//!
//! The engine is a black box driven by a generated script: convert the
//! staged sequence, stack it, save the result at a known intermediate
//! path. Its exit status is authoritative. The stack line doubles as the
//! stack signature persisted in the master's header, so its rendering
//! must be byte-stable across runs.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{DarkLibError, Result};

/// Filename the generated script instructs the engine to save under,
/// relative to the work directory.
pub const STACK_OUTPUT_NAME: &str = "master_dark_tmp.fits";

const SCRIPT_NAME: &str = "stack_script.ssf";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackMethod {
    Average,
    Median,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionMethod {
    None,
    Sigma,
    WinsorizedSigma,
    Minmax,
    Percentile,
}

impl RejectionMethod {
    /// Token the engine's stack command expects.
    fn token(self) -> &'static str {
        match self {
            Self::None => "n",
            Self::Sigma => "s",
            Self::WinsorizedSigma => "w",
            Self::Minmax => "minmax",
            Self::Percentile => "p",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNorm {
    Noscale,
    Addscale,
    Rejection,
}

impl OutputNorm {
    fn token(self) -> &'static str {
        match self {
            Self::Noscale => "noscale",
            Self::Addscale => "addscale",
            Self::Rejection => "rejection",
        }
    }
}

/// Stacking parameters, an immutable record fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackParams {
    pub stack_method: StackMethod,
    pub rejection_method: RejectionMethod,
    pub rejection_param1: f64,
    pub rejection_param2: f64,
    pub output_norm: OutputNorm,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            stack_method: StackMethod::Average,
            rejection_method: RejectionMethod::WinsorizedSigma,
            rejection_param1: 3.0,
            rejection_param2: 3.0,
            output_norm: OutputNorm::Noscale,
        }
    }
}

impl StackParams {
    /// Render the engine's stack command line.
    ///
    /// This string is also the stack signature recorded in the master's
    /// header and compared on later runs; identical parameters must
    /// always render identically.
    pub fn stack_line(&self, cfa: bool) -> String {
        let norm = self.output_norm.token();
        let cfa = if cfa { " -cfa" } else { "" };
        match self.stack_method {
            StackMethod::Median => {
                format!("stack dark median -norm={norm}{cfa} -out={STACK_OUTPUT_NAME}")
            }
            StackMethod::Average => match self.rejection_method {
                RejectionMethod::None => {
                    format!("stack dark rej n -norm={norm}{cfa} -out={STACK_OUTPUT_NAME}")
                }
                rej => format!(
                    "stack dark rej {} {} {} -norm={norm}{cfa} -out={STACK_OUTPUT_NAME}",
                    rej.token(),
                    self.rejection_param1,
                    self.rejection_param2,
                ),
            },
        }
    }
}

/// How the engine binary is launched. Only the argv prefix differs; the
/// script passed is identical across modes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineMode {
    /// Plain executable on this host.
    Native { engine: PathBuf },
    /// Sandboxed package launched through a container runtime.
    Containerised {
        runtime: PathBuf,
        engine: String,
        package: String,
    },
    /// Self-contained application bundle.
    Bundle { bundle: PathBuf },
}

impl EngineMode {
    /// Full argv for one invocation with `script`.
    pub fn argv(&self, script: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = match self {
            Self::Native { engine } => vec![engine.into()],
            Self::Containerised {
                runtime,
                engine,
                package,
            } => vec![
                runtime.into(),
                "run".into(),
                format!("--command={engine}").into(),
                package.into(),
            ],
            Self::Bundle { bundle } => vec![bundle.into()],
        };
        argv.push("-s".into());
        argv.push(script.into());
        argv
    }

    /// The binary that must exist for this mode to work at all.
    fn launcher(&self) -> &Path {
        match self {
            Self::Native { engine } => engine,
            Self::Containerised { runtime, .. } => runtime,
            Self::Bundle { bundle } => bundle,
        }
    }

    /// Verify the launcher binary is reachable. Called once before any
    /// group is processed; a missing engine is fatal to the run.
    pub fn locate(&self) -> Result<()> {
        let launcher = self.launcher();
        if resolve_executable(launcher) {
            Ok(())
        } else {
            Err(DarkLibError::EngineNotFound(
                launcher.display().to_string(),
            ))
        }
    }
}

fn resolve_executable(program: &Path) -> bool {
    if program.components().count() > 1 {
        return program.is_file();
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

/// What one engine run produced.
#[derive(Clone, Debug)]
pub struct StackOutcome {
    /// The stack command actually used; becomes the stack signature.
    pub command: String,
    /// Intermediate output path. `None` on dry runs.
    pub output: Option<PathBuf>,
}

/// Drives the external engine, one group at a time.
///
/// At most one invocation is ever in flight: the engine is multi-threaded
/// itself and two instances contend for RAM and descriptors.
#[derive(Clone, Debug)]
pub struct StackRunner {
    pub mode: EngineMode,
    pub params: StackParams,
    pub dry_run: bool,
}

impl StackRunner {
    /// Stack the staged sequence under `staging_dir` into
    /// `work_dir/master_dark_tmp.fits`.
    pub fn stack_group(
        &self,
        staging_dir: &Path,
        work_dir: &Path,
        cfa: bool,
    ) -> Result<StackOutcome> {
        let stack_line = self.params.stack_line(cfa);
        let script = format!(
            "requires 1.2\n\
             cd \"{staging}\"\n\
             convert dark -out={work}\n\
             cd {work}\n\
             {stack_line}\n",
            staging = staging_dir.display(),
            work = work_dir.display(),
        );
        let script_path = work_dir.join(SCRIPT_NAME);
        fs::write(&script_path, &script)?;

        let argv = self.mode.argv(&script_path);
        let rendered: Vec<String> = argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        if self.dry_run {
            info!(command = rendered.join(" "), "dry-run: engine not invoked");
            return Ok(StackOutcome {
                command: stack_line,
                output: None,
            });
        }

        info!(command = rendered.join(" "), "invoking stacking engine");
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(work_dir)
            .output()?;
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            error!(
                code,
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "stacking engine failed"
            );
            return Err(DarkLibError::StackerExitedNonZero(code));
        }

        let produced = work_dir.join(STACK_OUTPUT_NAME);
        if !produced.is_file() {
            return Err(DarkLibError::OutputMissing(produced));
        }
        Ok(StackOutcome {
            command: stack_line,
            output: Some(produced),
        })
    }
}

/// Move a finished, header-stamped master into its library slot.
///
/// A same-filesystem rename is atomic; across filesystems the file is
/// copied, synced to disk, then the temporary is unlinked.
pub fn publish_master(tmp: &Path, dest: &Path) -> Result<()> {
    match fs::rename(tmp, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(tmp, dest)?;
            fs::File::options().write(true).open(dest)?.sync_all()?;
            fs::remove_file(tmp)?;
            Ok(())
        }
    }
}
