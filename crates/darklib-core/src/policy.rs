//! Update decision for one group against the existing master.

use std::fmt;

use crate::group::Group;
use crate::master::MasterInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildReason {
    Forced,
    NoExistingMaster,
    SignatureDiffers,
    FrameCountCriteria,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    DateNotNewer,
    DateNewerButInsufficientFrames,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateNotNewer => write!(f, "date-not-newer"),
            Self::DateNewerButInsufficientFrames => {
                write!(f, "date-newer-but-insufficient-frames")
            }
        }
    }
}

impl fmt::Display for BuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::NoExistingMaster => write!(f, "no-existing-master"),
            Self::SignatureDiffers => write!(f, "signature-differs"),
            Self::FrameCountCriteria => write!(f, "frame-count-criteria"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateDecision {
    Build(BuildReason),
    Skip(SkipReason),
}

/// Decide whether `group` justifies (re)building its master.
///
/// Rules, first match wins:
/// 1. forced run;
/// 2. no existing master;
/// 3. the stacking signature changed, so the old master is not comparable;
/// 4. the group brings nothing newer than the master;
/// 5. enough frames (threshold met, or strictly more than the master used);
/// 6. otherwise keep the master.
///
/// A `min_frames_threshold` of 0 disables the threshold criterion, leaving
/// only "strictly more frames than the previous master".
pub fn decide(
    group: &Group,
    existing: Option<&MasterInfo>,
    signature: &str,
    min_frames_threshold: usize,
    force: bool,
) -> UpdateDecision {
    if force {
        return UpdateDecision::Build(BuildReason::Forced);
    }
    let master = match existing {
        None => return UpdateDecision::Build(BuildReason::NoExistingMaster),
        Some(m) => m,
    };
    if master.stack_signature.as_deref() != Some(signature) {
        return UpdateDecision::Build(BuildReason::SignatureDiffers);
    }
    if group.latest() <= master.created_at {
        return UpdateDecision::Skip(SkipReason::DateNotNewer);
    }
    let meets_threshold = min_frames_threshold > 0 && group.len() >= min_frames_threshold;
    if meets_threshold || group.len() > master.n_frames_used {
        return UpdateDecision::Build(BuildReason::FrameCountCriteria);
    }
    UpdateDecision::Skip(SkipReason::DateNewerButInsufficientFrames)
}
