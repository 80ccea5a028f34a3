//! Staging of validated frames for the stacking engine.
//!
//! The engine consumes a densely numbered sequence relative to its
//! working directory, so accepted frames are exposed under stable names
//! in a scratch directory that exists only for the duration of one group.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DarkLibError, Result};
use crate::frame::FrameInfo;

/// A scratch directory that is wiped on creation and removed on drop.
///
/// Teardown runs on every exit path: success, group failure and
/// cancellation alike.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
}

impl ScopedDir {
    /// Create `path` fresh, removing any leftover from an interrupted run.
    /// The directory is private to the owning user.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if self.path.exists() {
                warn!("could not remove scratch dir {}: {e}", self.path.display());
            }
        }
    }
}

/// Populate `dir` with one entry per accepted frame, named
/// `frame_<index:05><ext>` with dense 0-based indices.
///
/// Entries are symbolic links where the platform allows them; a frame
/// whose link cannot be created falls back to a copy. A frame that can be
/// neither linked nor copied aborts the whole group.
pub fn stage_frames(dir: &Path, frames: &[FrameInfo]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut staged = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let ext = frame
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("fits");
        let entry = dir.join(format!("frame_{index:05}.{ext}"));
        if let Err(link_err) = make_link(&frame.path, &entry) {
            debug!(
                "symlink {} -> {} failed ({link_err}), copying instead",
                entry.display(),
                frame.path.display()
            );
            fs::copy(&frame.path, &entry).map_err(|copy_err| {
                DarkLibError::StagingFailed(format!(
                    "{}: link failed ({link_err}), copy failed ({copy_err})",
                    frame.path.display()
                ))
            })?;
        }
        staged.push(entry);
    }
    Ok(staged)
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
