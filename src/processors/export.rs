//! Windowed export of detected people.
//!
//! Each person segment is padded into a window of scans. The windows are
//! classified again and stacked on a compacted z axis, so the gaps between
//! people do not show up in the exported clouds.

use std::ops::Range;
use std::path::{Path, PathBuf};

use log::info;

use super::segmentation::PersonSegment;
use super::visibility::{classify_scan, ClassifiedCloud};
use crate::config::{ClassifyConfig, ExportConfig};
use crate::core::loaders::Recording;
use crate::core::writers::{self, write_ply};

/// Scan windows around `segments` in a recording of `n_scans` scans.
///
/// Windows are padded by `buffer_people`, the first and last additionally by
/// `buffer_ends`, and clamped to the recording. A window that runs into the
/// next one is cut at the next window's start, but never below its own
/// segment. The result is sorted and non-overlapping.
pub fn export_windows(
    n_scans: usize,
    segments: &[PersonSegment],
    config: &ExportConfig,
) -> Vec<Range<usize>> {
    let last = segments.len().saturating_sub(1);

    let mut windows: Vec<Range<usize>> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let mut before = config.buffer_people;
            let mut after = config.buffer_people;
            if i == 0 {
                before += config.buffer_ends;
            }
            if i == last {
                after += config.buffer_ends;
            }

            let end = segment.scan_end().min(n_scans);
            let start = segment.scan_start.min(end);
            start.saturating_sub(before)..(end + after).min(n_scans)
        })
        .collect();

    for i in 1..windows.len() {
        let own_end = segments[i - 1].scan_end().min(n_scans);
        let next_start = windows[i].start;

        let prev = &mut windows[i - 1];
        prev.end = prev.end.min(next_start).max(own_end);

        let prev_end = prev.end;
        let next = &mut windows[i];
        next.start = next.start.max(prev_end);
        next.end = next.end.max(next.start);
    }

    windows
}

/// Classify the scans inside the export windows.
///
/// z comes from a counter over exported scans only: `counter * 0.1 * z_scale`.
pub fn windowed_clouds(
    recording: &Recording,
    segments: &[PersonSegment],
    export: &ExportConfig,
    classify: &ClassifyConfig,
) -> ClassifiedCloud {
    let windows = export_windows(recording.len(), segments, export);
    let mut out = ClassifiedCloud::new();
    let mut counter = 0usize;

    for window in &windows {
        for scan in &recording.scans()[window.clone()] {
            let z = counter as f32 * 0.1 * export.z_scale;
            classify_scan(scan, z, classify, &mut out);
            counter += 1;
        }
    }

    info!(
        "exported {} scans in {} windows: {} opaque, {} ghosted",
        counter,
        windows.len(),
        out.opaque.len(),
        out.ghosted.len()
    );

    out
}

/// Write the windowed clouds as `{prefix}_opaque.ply` and
/// `{prefix}_transparent.ply` under `out_dir`.
pub fn export_people(
    recording: &Recording,
    segments: &[PersonSegment],
    export: &ExportConfig,
    classify: &ClassifyConfig,
    out_dir: &Path,
    prefix: &str,
) -> writers::Result<(PathBuf, PathBuf)> {
    let clouds = windowed_clouds(recording, segments, export, classify);

    let opaque_path = out_dir.join(format!("{}_opaque.ply", prefix));
    let ghost_path = out_dir.join(format!("{}_transparent.ply", prefix));

    write_ply(&opaque_path, &clouds.opaque)?;
    write_ply(&ghost_path, &clouds.ghosted)?;

    Ok((opaque_path, ghost_path))
}
