mod common;

use std::fs;

use darklib_core::stage::{stage_frames, ScopedDir};

use common::frame_info;

fn source_frames(dir: &std::path::Path, count: usize) -> Vec<darklib_core::frame::FrameInfo> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("source_{i}.fits"));
            fs::write(&path, format!("frame {i}")).unwrap();
            let mut frame = frame_info(path.to_str().unwrap(), "2026-01-15T20:00:00");
            frame.path = path;
            frame
        })
        .collect()
}

#[test]
fn test_dense_stable_entry_names() {
    let tmp = tempfile::tempdir().unwrap();
    let frames = source_frames(tmp.path(), 3);
    let staging = tmp.path().join("link");

    let staged = stage_frames(&staging, &frames).unwrap();
    let names: Vec<_> = staged
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["frame_00000.fits", "frame_00001.fits", "frame_00002.fits"]
    );
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 3);
}

#[test]
fn test_staged_entries_resolve_to_sources() {
    let tmp = tempfile::tempdir().unwrap();
    let frames = source_frames(tmp.path(), 2);
    let staging = tmp.path().join("link");

    let staged = stage_frames(&staging, &frames).unwrap();
    for (entry, frame) in staged.iter().zip(&frames) {
        let content = fs::read(entry).unwrap();
        assert_eq!(content, fs::read(&frame.path).unwrap());
    }
}

#[test]
fn test_scoped_dir_wipes_leftovers_on_create() {
    let tmp = tempfile::tempdir().unwrap();
    let scratch_path = tmp.path().join("process");
    fs::create_dir_all(&scratch_path).unwrap();
    fs::write(scratch_path.join("leftover.fits"), "stale").unwrap();

    let scratch = ScopedDir::create(&scratch_path).unwrap();
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_scoped_dir_removed_on_drop() {
    let tmp = tempfile::tempdir().unwrap();
    let scratch_path = tmp.path().join("process");
    {
        let scratch = ScopedDir::create(&scratch_path).unwrap();
        fs::write(scratch.path().join("work.fits"), "data").unwrap();
        assert!(scratch_path.exists());
    }
    assert!(!scratch_path.exists());
}

#[cfg(unix)]
#[test]
fn test_scoped_dir_is_owner_private() {
    use std::os::unix::fs::PermissionsExt;
    let tmp = tempfile::tempdir().unwrap();
    let scratch = ScopedDir::create(&tmp.path().join("process")).unwrap();
    let mode = fs::metadata(scratch.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn test_missing_source_aborts_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let mut frames = source_frames(tmp.path(), 1);
    frames.push(frame_info("/nonexistent/gone.fits", "2026-01-15T20:00:00"));
    let staging = tmp.path().join("link");
    // The symlink may be created dangling; reading through it must fail
    // either at staging time or when the entry is consumed.
    match stage_frames(&staging, &frames) {
        Err(_) => {}
        Ok(staged) => {
            assert!(fs::read(&staged[1]).is_err());
        }
    }
}
