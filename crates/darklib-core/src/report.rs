//! Accumulated outcome of one library update run.
//!
//! The reporter performs no frame I/O; it only records what earlier
//! stages hand it, and the front-end renders it at run end.

use std::path::PathBuf;

use serde::Serialize;

use crate::validate::{ImageStats, RejectedFrame};

/// One successfully (re)built master.
#[derive(Clone, Debug, Serialize)]
pub struct BuiltMaster {
    pub group: String,
    pub master_path: PathBuf,
    pub n_frames_used: usize,
    pub n_frames_total: usize,
    /// The update decision was forced by the operator.
    pub forced: bool,
    /// The stack command used (also the persisted signature).
    pub command: String,
    pub dry_run: bool,
}

/// Per-group result.
#[derive(Clone, Debug, Serialize)]
pub enum GroupOutcome {
    Built(BuiltMaster),
    Skipped { group: String, reason: String },
    Failed { group: String, error: String },
}

/// One rejected frame, reduced to what the summary needs.
#[derive(Clone, Debug, Serialize)]
pub struct RejectionRecord {
    pub path: PathBuf,
    pub reason: String,
    pub stats: Option<ImageStats>,
}

/// Rejections of one group, keyed by its display name.
#[derive(Clone, Debug, Serialize)]
pub struct GroupRejections {
    pub group: String,
    pub frames: Vec<RejectionRecord>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<GroupOutcome>,
    pub rejections: Vec<GroupRejections>,
    /// Calibration frames that entered grouping.
    pub frames_seen: usize,
    /// Files the scanner skipped outright.
    pub frames_skipped: usize,
    /// Frames dropped by the age window.
    pub frames_age_filtered: usize,
    pub engine_invocations: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn record_outcome(&mut self, outcome: GroupOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn record_rejections(&mut self, group: String, rejected: &[RejectedFrame]) {
        if rejected.is_empty() {
            return;
        }
        self.rejections.push(GroupRejections {
            group,
            frames: rejected
                .iter()
                .map(|r| RejectionRecord {
                    path: r.frame.path.clone(),
                    reason: r.reason.to_string(),
                    stats: r.stats,
                })
                .collect(),
        });
    }

    pub fn built(&self) -> impl Iterator<Item = &BuiltMaster> {
        self.outcomes.iter().filter_map(|o| match o {
            GroupOutcome::Built(b) => Some(b),
            _ => None,
        })
    }

    pub fn builds(&self) -> usize {
        self.built().count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, GroupOutcome::Failed { .. }))
            .count()
    }

    pub fn frames_used(&self) -> usize {
        self.built().map(|b| b.n_frames_used).sum()
    }

    pub fn frames_rejected(&self) -> usize {
        self.rejections.iter().map(|g| g.frames.len()).sum()
    }

    /// Share of validated frames among all frames that went through
    /// validation; `None` when nothing was validated.
    pub fn success_rate(&self) -> Option<f64> {
        let used = self.frames_used();
        let processed = used + self.frames_rejected();
        (processed > 0).then(|| used as f64 / processed as f64)
    }

    /// True when every group either built or was legitimately skipped and
    /// the run was not cancelled.
    pub fn success(&self) -> bool {
        !self.cancelled && self.failures() == 0
    }
}
