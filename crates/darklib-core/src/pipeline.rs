//! The update run: scan, group, and process each group to completion.
//!
//! Groups are strictly sequential. The stacking engine owns CPU
//! parallelism inside a group; running engines side by side only fights
//! over RAM. Cancellation is observed between groups, so the current
//! engine invocation always finishes or fails on its own terms.

use std::fs;

use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::config::UpdateConfig;
use crate::error::{DarkLibError, Result};
use crate::frame::{FrameInfo, GroupKey};
use crate::group::{group_frames, Group};
use crate::master::{read_master, stamp_master};
use crate::policy::{decide, BuildReason, UpdateDecision};
use crate::report::{BuiltMaster, GroupOutcome, RunReport};
use crate::scanner::scan_roots;
use crate::stacker::{publish_master, StackRunner};
use crate::stage::{stage_frames, ScopedDir};
use crate::validate::validate_group;

/// Run a full library update.
///
/// `progress` is called once per group before it is processed, with
/// `(index, total, key)`. Fatal setup problems return `Err`; per-group
/// problems are recorded in the report and the run continues.
pub fn run_update<F>(
    config: &UpdateConfig,
    cancel: &CancellationToken,
    mut progress: F,
) -> Result<RunReport>
where
    F: FnMut(usize, usize, &GroupKey),
{
    check_fatal_preconditions(config)?;

    let scan = scan_roots(
        &config.input_roots,
        config.max_age_days,
        config.log_skipped,
    )?;
    let mut report = RunReport {
        frames_seen: scan.frames.len(),
        frames_skipped: scan.skipped.len(),
        frames_age_filtered: scan.age_filtered.len(),
        ..RunReport::default()
    };

    let groups = group_frames(scan.frames, config.temperature_precision);
    info!(groups = groups.len(), "grouped frames by acquisition parameters");

    let runner = StackRunner {
        mode: config.engine.clone(),
        params: config.stacking,
        dry_run: config.dry_run,
    };

    let total = groups.len();
    for (index, group) in groups.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(
                "cancellation requested, skipping {} remaining group(s)",
                total - index
            );
            report.cancelled = true;
            break;
        }
        progress(index, total, &group.key);
        process_group(config, &runner, group, &mut report);
    }

    Ok(report)
}

fn check_fatal_preconditions(config: &UpdateConfig) -> Result<()> {
    for root in &config.input_roots {
        if !root.is_dir() {
            return Err(DarkLibError::InputRootMissing(root.clone()));
        }
    }
    fs::create_dir_all(&config.library_root)?;
    if fs::metadata(&config.library_root)?.permissions().readonly() {
        return Err(DarkLibError::LibraryRootUnwritable(
            config.library_root.clone(),
        ));
    }
    fs::create_dir_all(&config.work_dir)?;
    if !config.dry_run {
        config.engine.locate()?;
    }
    Ok(())
}

fn process_group(
    config: &UpdateConfig,
    runner: &StackRunner,
    group: &Group,
    report: &mut RunReport,
) {
    let key = &group.key;
    info!(group = %key, frames = group.len(), "processing group");

    let signature = config.stacking.stack_line(key.is_cfa);
    let master_path = config.library_root.join(key.filename());
    let existing = read_master(&master_path);

    let decision = decide(
        group,
        existing.as_ref(),
        &signature,
        config.min_frames_threshold,
        config.force,
    );
    let build_reason = match decision {
        UpdateDecision::Skip(reason) => {
            info!(group = %key, %reason, "master kept unchanged");
            report.record_outcome(GroupOutcome::Skipped {
                group: key.to_string(),
                reason: reason.to_string(),
            });
            return;
        }
        UpdateDecision::Build(reason) => {
            info!(group = %key, %reason, "master will be rebuilt");
            reason
        }
    };

    // Validation reads pixel data, the expensive part; it runs only once
    // the decision to build is made.
    let (accepted, rejected) = validate_group(group, &config.validation);
    report.record_rejections(key.to_string(), &rejected);

    if accepted.len() < 2 {
        warn!(
            group = %key,
            valid = accepted.len(),
            "too few valid frames after validation, group skipped"
        );
        report.record_outcome(GroupOutcome::Skipped {
            group: key.to_string(),
            reason: "insufficient-valid-frames".to_string(),
        });
        return;
    }

    let built = build_master(config, runner, group, &accepted, &signature, report);
    match built {
        Ok(command) => {
            if !config.dry_run {
                info!(group = %key, master = %master_path.display(), "master updated");
            }
            report.record_outcome(GroupOutcome::Built(BuiltMaster {
                group: key.to_string(),
                master_path,
                n_frames_used: accepted.len(),
                n_frames_total: group.len(),
                forced: build_reason == BuildReason::Forced,
                command,
                dry_run: config.dry_run,
            }));
        }
        Err(e) => {
            warn!(group = %key, error = %e, "group failed, prior master left untouched");
            report.record_outcome(GroupOutcome::Failed {
                group: key.to_string(),
                error: e.to_string(),
            });
        }
    }
}

/// Stage, stack, stamp and publish one group. Returns the stack command
/// used. Any error aborts just this group; the scratch directory is torn
/// down either way.
fn build_master(
    config: &UpdateConfig,
    runner: &StackRunner,
    group: &Group,
    accepted: &[FrameInfo],
    signature: &str,
    report: &mut RunReport,
) -> Result<String> {
    let scratch = ScopedDir::create(&config.work_dir.join("process"))?;
    let staging = scratch.path().join("link");
    stage_frames(&staging, accepted)?;

    let outcome = match runner.stack_group(&staging, scratch.path(), group.key.is_cfa) {
        Ok(outcome) => {
            if outcome.output.is_some() {
                report.engine_invocations += 1;
            }
            outcome
        }
        Err(e) => {
            // The engine did run on these failures; keep the count honest.
            if matches!(
                e,
                DarkLibError::StackerExitedNonZero(_) | DarkLibError::OutputMissing(_)
            ) {
                report.engine_invocations += 1;
            }
            return Err(e);
        }
    };
    if let Some(tmp) = &outcome.output {
        stamp_master(tmp, &group.key, accepted, signature)?;
        publish_master(tmp, &config.library_root.join(group.key.filename()))?;
    }
    Ok(outcome.command)
}
