//! Linear projection: scans of a side-scanning capture stacked along z.

use log::debug;

use super::{index_range, select_scans, ProjectionWarning};
use crate::config::LinearConfig;
use crate::core::loaders::{PointCloud, PointColor, Recording};
use crate::core::transforms::{is_culled, StackSpacing};

/// Output of [`project_linear`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProjection {
    pub cloud: PointCloud,
    pub warnings: Vec<ProjectionWarning>,
}

/// Stack the selected scans of a recording into a point cloud.
///
/// Each retained reading `(x, y)` becomes `(x, y, z)` where z is either the
/// elapsed time since the first selected scan or the scan's ordinal in the
/// selection at a nominal 10 scans/sec, scaled by `z_scale`. Points come out
/// in scan order, then reading order.
///
/// # Example
///
/// ```
/// use urg_pipeline::config::LinearConfig;
/// use urg_pipeline::core::loaders::{Recording, Scan};
/// use urg_pipeline::processors::linear::project_linear;
///
/// let recording = Recording::new(vec![Scan::new(0, vec![[300.0, 0.0]])]);
/// let projection = project_linear(&recording, &LinearConfig::default());
/// assert_eq!(projection.cloud.len(), 1);
/// ```
pub fn project_linear(recording: &Recording, config: &LinearConfig) -> LinearProjection {
    let selection = &config.selection;
    let (range, warning) = select_scans(
        recording.len(),
        selection.start_scan,
        selection.end_bound(),
    );

    let scans = &recording.scans()[range];
    let t0_ms = scans.first().map_or(0, |s| s.timestamp_ms);
    let spacing = StackSpacing::new(config.time_dependent, config.z_scale, t0_ms);
    let color = PointColor::opaque(config.color);

    let per_scan = selection.max_index.saturating_sub(selection.min_index);
    let mut cloud = PointCloud::with_capacity(scans.len() * per_scan.min(4096));

    for (ordinal, scan) in scans.iter().enumerate() {
        let z = spacing.z(scan.timestamp_ms, ordinal);
        let indices = index_range(selection.min_index, selection.max_index, scan.len());

        for &[x, y] in &scan.points[indices] {
            if is_culled(x, y, config.cull_distance) {
                continue;
            }
            cloud.push([x, y, z], color);
        }
    }

    debug!(
        "linear projection: {} scans -> {} points",
        scans.len(),
        cloud.len()
    );

    LinearProjection {
        cloud,
        warnings: warning.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanSelection;
    use crate::core::loaders::Scan;

    fn recording() -> Recording {
        Recording::new(vec![
            Scan::new(1000, vec![[100.0, 100.0], [300.0, 0.0], [0.0, 500.0]]),
            Scan::new(1100, vec![[110.0, 100.0], [310.0, 0.0], [0.0, 510.0]]),
            Scan::new(1350, vec![[120.0, 100.0], [320.0, 0.0], [0.0, 520.0]]),
        ])
    }

    fn config(cull_distance: f32, time_dependent: bool) -> LinearConfig {
        LinearConfig {
            cull_distance,
            time_dependent,
            ..LinearConfig::default()
        }
    }

    #[test]
    fn test_cull_distance() {
        let projection = project_linear(&recording(), &config(265.0, false));
        let cloud = &projection.cloud;

        assert_eq!(cloud.len(), 6);
        // (100, 100) is ~141 mm from the sensor and must be dropped
        assert_eq!(cloud.x[0], 300.0);
        assert_eq!(cloud.y[0], 0.0);
        assert_eq!(cloud.z[0], 0.0);
        assert_eq!(cloud.z[2], 3.0);
        assert_eq!(cloud.z[4], 6.0);
        assert!(projection.warnings.is_empty());
    }

    #[test]
    fn test_no_cull_keeps_everything() {
        let projection = project_linear(&recording(), &config(0.0, false));
        assert_eq!(projection.cloud.len(), 3 * 3);
    }

    #[test]
    fn test_time_dependent_z() {
        let projection = project_linear(&recording(), &config(265.0, true));
        let z = &projection.cloud.z;
        assert_eq!(z[0], 0.0);
        assert!((z[2] - 3.0).abs() < 1e-4);
        assert!((z[4] - 10.5).abs() < 1e-4);
    }

    #[test]
    fn test_time_dependent_z_epoch_timestamps() {
        let t0 = 1_700_000_000_000;
        let recording = Recording::new(
            [0, 100, 250]
                .iter()
                .map(|dt| Scan::new(t0 + dt, vec![[300.0, 0.0]]))
                .collect(),
        );
        let z = project_linear(&recording, &config(0.0, true)).cloud.z;

        assert_eq!(z.len(), 3);
        assert_eq!(z[0], 0.0);
        assert!((z[1] - 3.0).abs() < 1e-4);
        assert!((z[2] - 7.5).abs() < 1e-4);
    }

    #[test]
    fn test_scan_and_index_range() {
        let cfg = LinearConfig {
            selection: ScanSelection {
                start_scan: 1,
                end_scan: 2,
                min_index: 1,
                max_index: 3,
            },
            cull_distance: 0.0,
            ..LinearConfig::default()
        };
        let cloud = project_linear(&recording(), &cfg).cloud;

        assert_eq!(cloud.to_coords(), vec![[310.0, 0.0, 0.0], [0.0, 510.0, 0.0]]);
    }

    #[test]
    fn test_end_past_recording_is_clamped() {
        let cfg = LinearConfig {
            selection: ScanSelection {
                end_scan: 40,
                ..ScanSelection::default()
            },
            cull_distance: 0.0,
            ..LinearConfig::default()
        };
        let projection = project_linear(&recording(), &cfg);

        assert_eq!(projection.cloud.len(), 9);
        assert_eq!(
            projection.warnings,
            vec![ProjectionWarning::RangeClamped {
                requested: 40,
                available: 3
            }]
        );
    }

    #[test]
    fn test_point_count_bound_and_idempotence() {
        let rec = recording();
        let cfg = config(265.0, true);
        let first = project_linear(&rec, &cfg);
        let second = project_linear(&rec, &cfg);

        assert!(first.cloud.len() <= rec.len() * 3);
        assert_eq!(first, second);
        assert!(first.cloud.colors.iter().all(|c| c.is_opaque()));
    }
}
