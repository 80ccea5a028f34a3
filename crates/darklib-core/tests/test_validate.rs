mod common;

use darklib_core::frame::GroupKey;
use darklib_core::group::group_frames;
use darklib_core::validate::{validate_group, RejectReason, ValidationThresholds};

use common::{flat_pixels, frame_info, noisy_pixels, with_hot_pixels, FitsSpec};

/// Write specs to disk, extract their metadata back off the headers and
/// wrap everything in a single group.
fn group_from_specs(
    dir: &std::path::Path,
    specs: Vec<(&str, FitsSpec)>,
) -> darklib_core::group::Group {
    let mut frames = Vec::new();
    for (name, spec) in specs {
        let path = dir.join(name);
        spec.write_to(&path);
        let header = darklib_core::fits::FitsHeader::open(&path).unwrap();
        frames.push(darklib_core::frame::FrameInfo::from_header(&path, &header).unwrap());
    }
    let mut groups = group_frames(frames, 0.5);
    assert_eq!(groups.len(), 1);
    groups.remove(0)
}

#[test]
fn test_clean_group_fully_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    let group = group_from_specs(
        dir.path(),
        vec![
            ("a.fits", FitsSpec::dark("2026-01-15T20:00:00").pixels(noisy_pixels(n, 100, 10, 1))),
            ("b.fits", FitsSpec::dark("2026-01-15T20:10:00").pixels(noisy_pixels(n, 100, 10, 2))),
        ],
    );
    let (accepted, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(accepted.len(), 2);
    assert!(rejected.is_empty());
}

#[test]
fn test_contaminated_frame_rejected_for_hot_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    // 1.5% of pixels saturated, the signature of a star field.
    let starry = with_hot_pixels(noisy_pixels(n, 100, 10, 3), n * 15 / 1000, 8000);
    let group = group_from_specs(
        dir.path(),
        vec![
            ("a.fits", FitsSpec::dark("2026-01-15T20:00:00").pixels(noisy_pixels(n, 100, 10, 1))),
            ("b.fits", FitsSpec::dark("2026-01-15T20:10:00").pixels(noisy_pixels(n, 100, 10, 2))),
            ("starry.fits", FitsSpec::dark("2026-01-15T20:20:00").pixels(starry)),
        ],
    );

    let (accepted, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(accepted.len() + rejected.len(), group.len());
    assert_eq!(accepted.len(), 2);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::HotPixelFraction);
    assert!(rejected[0].frame.path.ends_with("starry.fits"));
    let stats = rejected[0].stats.expect("stats recorded");
    assert!(stats.hot_pixel_fraction > 0.002);
}

#[test]
fn test_light_leak_rejected_on_median() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    let group = group_from_specs(
        dir.path(),
        vec![(
            "leak.fits",
            FitsSpec::dark("2026-01-15T20:00:00").pixels(flat_pixels(n, 300)),
        )],
    );
    let (_, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::MedianCeiling);
}

#[test]
fn test_gradient_rejected_on_relative_noise() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    // Wide uniform spread: MAD/median far above 0.15 while the median
    // stays under the ceiling.
    let group = group_from_specs(
        dir.path(),
        vec![(
            "gradient.fits",
            FitsSpec::dark("2026-01-15T20:00:00").pixels(noisy_pixels(n, 100, 60, 4)),
        )],
    );
    let (_, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::RelativeNoise);
}

#[test]
fn test_vignetting_rejected_on_central_dispersion() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    // Trimodal field: wide p10..p90 spread with MAD still zero.
    let low = n * 15 / 100;
    let mut pixels = vec![100u16; n];
    for v in pixels.iter_mut().take(low) {
        *v = 40;
    }
    for v in pixels.iter_mut().skip(n - low) {
        *v = 160;
    }
    let group = group_from_specs(
        dir.path(),
        vec![(
            "vignetted.fits",
            FitsSpec::dark("2026-01-15T20:00:00").pixels(pixels),
        )],
    );
    let (_, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::CentralDispersion);
}

#[test]
fn test_zero_frame_rejected_on_median_sign() {
    let dir = tempfile::tempdir().unwrap();
    let group = group_from_specs(
        dir.path(),
        vec![(
            "zero.fits",
            FitsSpec::dark("2026-01-15T20:00:00").pixels(flat_pixels(64 * 64, 0)),
        )],
    );
    let (_, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].reason, RejectReason::NonPositiveMedian);
}

#[test]
fn test_truncated_file_rejected_as_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.fits");
    let bytes = FitsSpec::dark("2026-01-15T20:00:00").bytes();
    std::fs::write(&path, &bytes[..bytes.len() - 2880]).unwrap();

    let mut frame = frame_info(path.to_str().unwrap(), "2026-01-15T20:00:00");
    frame.path = path;
    let key = GroupKey::of(&frame, 0.5);
    let group = darklib_core::group::Group {
        key,
        frames: vec![frame],
    };

    let (accepted, rejected) = validate_group(&group, &ValidationThresholds::default());
    assert!(accepted.is_empty());
    assert_eq!(rejected[0].reason, RejectReason::UnreadablePixels);
    assert!(rejected[0].stats.is_none());
}

#[test]
fn test_accepted_preserves_group_order() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    let group = group_from_specs(
        dir.path(),
        vec![
            ("a.fits", FitsSpec::dark("2026-01-15T22:00:00").pixels(noisy_pixels(n, 100, 10, 1))),
            ("b.fits", FitsSpec::dark("2026-01-15T20:00:00").pixels(noisy_pixels(n, 100, 10, 2))),
            ("c.fits", FitsSpec::dark("2026-01-15T21:00:00").pixels(noisy_pixels(n, 100, 10, 3))),
        ],
    );
    let (accepted, _) = validate_group(&group, &ValidationThresholds::default());
    let group_paths: Vec<_> = group.frames.iter().map(|f| f.path.clone()).collect();
    let accepted_paths: Vec<_> = accepted.iter().map(|f| f.path.clone()).collect();
    assert_eq!(accepted_paths, group_paths);
}

#[test]
fn test_custom_thresholds_apply() {
    let dir = tempfile::tempdir().unwrap();
    let n = 64 * 64;
    let group = group_from_specs(
        dir.path(),
        vec![(
            "a.fits",
            FitsSpec::dark("2026-01-15T20:00:00").pixels(flat_pixels(n, 150)),
        )],
    );
    let strict = ValidationThresholds {
        max_median_adu: 50.0,
        ..ValidationThresholds::default()
    };
    let (_, rejected) = validate_group(&group, &strict);
    assert_eq!(rejected[0].reason, RejectReason::MedianCeiling);

    let lax = ValidationThresholds {
        max_median_adu: 500.0,
        ..ValidationThresholds::default()
    };
    let (accepted, rejected) = validate_group(&group, &lax);
    assert_eq!(accepted.len(), 1);
    assert!(rejected.is_empty());
}
