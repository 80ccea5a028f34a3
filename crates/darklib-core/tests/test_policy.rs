mod common;

use std::path::PathBuf;

use darklib_core::frame::GroupKey;
use darklib_core::group::Group;
use darklib_core::master::MasterInfo;
use darklib_core::policy::{decide, BuildReason, SkipReason, UpdateDecision};

use common::{frame_info, parse_utc};

const SIGNATURE: &str = "stack dark rej w 3 3 -norm=noscale -out=master_dark_tmp.fits";

fn group_of(dates: &[&str]) -> Group {
    let mut frames: Vec<_> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| frame_info(&format!("/data/f{i}.fits"), d))
        .collect();
    frames.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));
    let key = GroupKey::of(&frames[0], 0.5);
    Group { key, frames }
}

fn master(created: &str, n_frames: usize, signature: Option<&str>) -> MasterInfo {
    MasterInfo {
        path: PathBuf::from("/lib/master.fits"),
        created_at: parse_utc(created),
        n_frames_used: n_frames,
        stack_signature: signature.map(str::to_string),
    }
}

#[test]
fn test_force_always_builds() {
    let group = group_of(&["2026-01-10T20:00:00"]);
    let existing = master("2026-01-15T20:00:00", 50, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, true);
    assert_eq!(decision, UpdateDecision::Build(BuildReason::Forced));
}

#[test]
fn test_no_master_builds() {
    let group = group_of(&["2026-01-10T20:00:00"]);
    let decision = decide(&group, None, SIGNATURE, 0, false);
    assert_eq!(decision, UpdateDecision::Build(BuildReason::NoExistingMaster));
}

#[test]
fn test_changed_signature_builds_regardless_of_dates() {
    // Master is newer and larger, but its parameters no longer match.
    let group = group_of(&["2026-01-10T20:00:00", "2026-01-11T20:00:00"]);
    let existing = master(
        "2026-01-15T20:00:00",
        50,
        Some("stack dark median -norm=noscale -out=master_dark_tmp.fits"),
    );
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, false);
    assert_eq!(
        decision,
        UpdateDecision::Build(BuildReason::SignatureDiffers)
    );
}

#[test]
fn test_master_without_signature_builds() {
    let group = group_of(&["2026-01-10T20:00:00"]);
    let existing = master("2026-01-15T20:00:00", 50, None);
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, false);
    assert_eq!(
        decision,
        UpdateDecision::Build(BuildReason::SignatureDiffers)
    );
}

#[test]
fn test_date_not_newer_skips() {
    let group = group_of(&["2026-01-10T20:00:00"]);
    let existing = master("2026-01-10T20:00:00", 1, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, false);
    assert_eq!(decision, UpdateDecision::Skip(SkipReason::DateNotNewer));
}

#[test]
fn test_newer_but_fewer_frames_skips() {
    // Five newer frames against a ten-frame master, threshold disabled.
    let group = group_of(&[
        "2026-01-16T20:00:00",
        "2026-01-16T20:10:00",
        "2026-01-16T20:20:00",
        "2026-01-16T20:30:00",
        "2026-01-16T20:40:00",
    ]);
    let existing = master("2026-01-15T20:00:00", 10, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, false);
    assert_eq!(
        decision,
        UpdateDecision::Skip(SkipReason::DateNewerButInsufficientFrames)
    );
}

#[test]
fn test_newer_with_more_frames_builds() {
    let group = group_of(&["2026-01-16T20:00:00", "2026-01-16T20:10:00"]);
    let existing = master("2026-01-15T20:00:00", 1, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 0, false);
    assert_eq!(
        decision,
        UpdateDecision::Build(BuildReason::FrameCountCriteria)
    );
}

#[test]
fn test_threshold_overrides_frame_count() {
    // Fewer frames than the master used, but the configured threshold is
    // met, so a newer date is enough.
    let group = group_of(&[
        "2026-01-16T20:00:00",
        "2026-01-16T20:10:00",
        "2026-01-16T20:20:00",
    ]);
    let existing = master("2026-01-15T20:00:00", 10, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 3, false);
    assert_eq!(
        decision,
        UpdateDecision::Build(BuildReason::FrameCountCriteria)
    );
}

#[test]
fn test_threshold_not_met_skips() {
    let group = group_of(&["2026-01-16T20:00:00", "2026-01-16T20:10:00"]);
    let existing = master("2026-01-15T20:00:00", 10, Some(SIGNATURE));
    let decision = decide(&group, Some(&existing), SIGNATURE, 3, false);
    assert_eq!(
        decision,
        UpdateDecision::Skip(SkipReason::DateNewerButInsufficientFrames)
    );
}

#[test]
fn test_skip_reason_labels() {
    assert_eq!(SkipReason::DateNotNewer.to_string(), "date-not-newer");
    assert_eq!(
        SkipReason::DateNewerButInsufficientFrames.to_string(),
        "date-newer-but-insufficient-frames"
    );
}
