//! Spherical projection for a rangefinder on a rotating mount.
//!
//! The scan plane turns about the vertical (y) axis at a known constant speed,
//! so each scan's rotation follows from its elapsed capture time.

use log::{debug, info};

use super::{index_range, ProjectionError};
use crate::config::SphericalConfig;
use crate::core::loaders::{PointCloud, PointColor, Recording};
use crate::core::transforms::{is_culled, rotate_y, rotate_z};

/// Period count standing in for "no end" when `n_periods` is negative.
pub const UNBOUNDED_PERIODS: f32 = 99_999.0;

/// Elapsed time assigned to the "previous" scan before any scan is accepted.
const NO_PREVIOUS_SCAN_S: f32 = -9999.0;

/// Sweep the scans of one or more periods onto a sphere.
///
/// 1. The first scan with `t * speed >= starting_period * period` defines `t0`.
/// 2. Scans are accumulated while `(t - t0) * speed <= (starting_period +
///    n_periods) * period`, optionally skipping duplicates emitted within
///    `duplicate_threshold_s` of the last accepted scan.
/// 3. Each reading is turned upright (180 deg about z), stretched by the
///    alignment angle in proportion to its index, then swung about y by the
///    mount angle at its capture time.
///
/// # Errors
///
/// [`ProjectionError::IntervalNotFound`] when no scan reaches the starting
/// period.
pub fn project_spherical(
    recording: &Recording,
    config: &SphericalConfig,
) -> Result<PointCloud, ProjectionError> {
    let speed = config.speed_deg_per_s;
    let period = config.period_deg;
    let n_periods = if config.n_periods < 0.0 {
        UNBOUNDED_PERIODS
    } else {
        config.n_periods
    };

    let scans = recording.scans();
    let start = scans
        .iter()
        .position(|scan| {
            scan.timestamp_s() * speed as f64 >= (config.starting_period * period) as f64
        })
        .ok_or(ProjectionError::IntervalNotFound {
            starting_period: config.starting_period,
            period,
        })?;

    let t0_ms = scans[start].timestamp_ms;
    let end_angle = (config.starting_period + n_periods) * period;
    let index_count = config.index_count.max(1) as f32;
    let color = PointColor::opaque(config.color);

    let mut cloud = PointCloud::new();
    let mut prev_elapsed = NO_PREVIOUS_SCAN_S;
    let mut accepted = 0usize;
    let mut duplicates = 0usize;

    for scan in &scans[start..] {
        let elapsed = scan.elapsed_s(t0_ms);
        if elapsed * speed > end_angle {
            break;
        }

        if config.cull_duplicate_scans && elapsed - prev_elapsed <= config.duplicate_threshold_s {
            duplicates += 1;
            continue;
        }

        let mut sweep = elapsed * speed;
        if config.clockwise {
            sweep = -sweep;
        }

        let indices = index_range(config.min_index, config.max_index, scan.len());
        for i in indices {
            let [x, y] = scan.points[i];
            if is_culled(x, y, config.cull_distance) {
                continue;
            }

            let mut point = rotate_z([x, y, 0.0], 180.0);
            point = rotate_z(point, config.alignment_angle_deg * i as f32 / index_count);
            point = rotate_y(point, sweep);

            cloud.push(point, color);
        }

        prev_elapsed = elapsed;
        accepted += 1;
    }

    info!(
        "spherical projection: {} scans accepted, {} duplicates skipped, {} points",
        accepted,
        duplicates,
        cloud.len()
    );
    debug!("spherical projection started at scan {} (t0 = {} ms)", start, t0_ms);

    Ok(cloud)
}
