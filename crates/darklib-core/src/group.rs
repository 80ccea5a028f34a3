//! Partitioning of scanned frames into acquisition-equivalent groups.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::frame::{FrameInfo, GroupKey};

/// A non-empty set of frames sharing one `GroupKey`, newest first.
#[derive(Clone, Debug)]
pub struct Group {
    pub key: GroupKey,
    pub frames: Vec<FrameInfo>,
}

impl Group {
    /// Acquisition timestamp of the newest frame.
    pub fn latest(&self) -> DateTime<Utc> {
        // frames is sorted newest-first and never empty
        self.frames[0].acquired_at
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Partition frames by `GroupKey`.
///
/// Within a group, frames are ordered by acquisition time descending with
/// the path as tiebreak. Groups come back in key order so a run processes
/// them deterministically regardless of scan order.
pub fn group_frames(frames: Vec<FrameInfo>, temperature_precision: f64) -> Vec<Group> {
    let mut buckets: HashMap<GroupKey, Vec<FrameInfo>> = HashMap::new();
    for frame in frames {
        let key = GroupKey::of(&frame, temperature_precision);
        buckets.entry(key).or_default().push(frame);
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .map(|(key, mut frames)| {
            frames.sort_by(|a, b| {
                b.acquired_at
                    .cmp(&a.acquired_at)
                    .then_with(|| a.path.cmp(&b.path))
            });
            Group { key, frames }
        })
        .collect();
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}
