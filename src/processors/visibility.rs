//! Visibility classification: opaque points inside a region of interest,
//! translucent "ghost" points outside it.

use log::debug;

use super::{index_range, select_scans, ProjectionWarning};
use crate::config::ClassifyConfig;
use crate::core::loaders::{PointCloud, PointColor, Recording, Scan};
use crate::core::transforms::StackSpacing;

/// Opaque and ghosted point sets produced by one classification pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedCloud {
    pub opaque: PointCloud,
    pub ghosted: PointCloud,
    pub warnings: Vec<ProjectionWarning>,
}

impl ClassifiedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total points across both sets.
    pub fn len(&self) -> usize {
        self.opaque.len() + self.ghosted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.ghosted.is_empty()
    }
}

/// Spurious "free radial" reading: on the sensor axis, just beyond the region.
#[inline]
fn is_axis_artifact(x: f32, y: f32, config: &ClassifyConfig) -> bool {
    let [band_lo, band_hi] = config.artifact_band_mm;
    let y_max = config.bounds.y_max;
    x.abs() < config.artifact_x_epsilon && y > y_max + band_lo && y <= y_max + band_hi
}

/// Classify one scan at depth `z`, appending to `out`.
///
/// Resampling state is local to the scan: the first ghosted point of every
/// scan is always kept.
pub fn classify_scan(scan: &Scan, z: f32, config: &ClassifyConfig, out: &mut ClassifiedCloud) {
    let opaque = PointColor::opaque(config.opaque_color);
    let ghost = PointColor::translucent(config.ghost_color, config.transparency);

    let selection = &config.selection;
    let indices = index_range(selection.min_index, selection.max_index, scan.len());
    let mut last_ghost: Option<[f32; 2]> = None;

    for &[x, y] in &scan.points[indices] {
        if is_axis_artifact(x, y, config) || y < config.noise_floor_y {
            continue;
        }

        if config.bounds.contains(x, y) {
            out.opaque.push([x, y, z], opaque);
            continue;
        }

        if config.resample {
            if let Some([kx, ky]) = last_ghost {
                if (x - kx).abs() < config.min_proximity && (y - ky).abs() < config.min_proximity {
                    continue;
                }
            }
            last_ghost = Some([x, y]);
        }

        out.ghosted.push([x, y, z], ghost);
    }
}

/// Split the selected scans of a recording into opaque and ghosted clouds.
///
/// z follows the same time-dependent or uniform spacing as the linear
/// projector.
pub fn classify(recording: &Recording, config: &ClassifyConfig) -> ClassifiedCloud {
    let selection = &config.selection;
    let (range, warning) = select_scans(
        recording.len(),
        selection.start_scan,
        selection.end_bound(),
    );

    let scans = &recording.scans()[range];
    let t0_ms = scans.first().map_or(0, |s| s.timestamp_ms);
    let spacing = StackSpacing::new(config.time_dependent, config.z_scale, t0_ms);

    let mut out = ClassifiedCloud::new();
    out.warnings.extend(warning);

    for (ordinal, scan) in scans.iter().enumerate() {
        classify_scan(scan, spacing.z(scan.timestamp_ms, ordinal), config, &mut out);
    }

    debug!(
        "classified {} scans: {} opaque, {} ghosted",
        scans.len(),
        out.opaque.len(),
        out.ghosted.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;

    fn config() -> ClassifyConfig {
        ClassifyConfig {
            bounds: Bounds::new(-100.0, 100.0, 0.0, 400.0),
            transparency: 0.25,
            noise_floor_y: 10.0,
            artifact_x_epsilon: 1.0,
            artifact_band_mm: [0.0, 300.0],
            ..ClassifyConfig::default()
        }
    }

    #[test]
    fn test_split_inside_and_outside() {
        let recording = Recording::new(vec![Scan::new(
            0,
            vec![[50.0, 200.0], [300.0, 200.0], [-100.0, 400.0]],
        )]);
        let out = classify(&recording, &config());

        assert_eq!(out.opaque.to_coords(), vec![[50.0, 200.0, 0.0], [-100.0, 400.0, 0.0]]);
        assert_eq!(out.ghosted.to_coords(), vec![[300.0, 200.0, 0.0]]);
        assert!(out.opaque.colors.iter().all(|c| c.is_opaque()));
        assert_eq!(out.ghosted.colors[0].alpha, 0.25);
    }

    #[test]
    fn test_axis_artifact_and_noise_floor() {
        let recording = Recording::new(vec![Scan::new(
            0,
            vec![
                [0.0, 500.0],  // on axis, inside the band above y_max
                [0.5, 700.0],  // on axis, band upper edge (inclusive)
                [0.0, 701.0],  // on axis, above the band
                [40.0, 500.0], // off axis
                [20.0, 5.0],   // below the noise floor
            ],
        )]);
        let out = classify(&recording, &config());

        assert!(out.opaque.is_empty());
        assert_eq!(out.ghosted.to_coords(), vec![[0.0, 701.0, 0.0], [40.0, 500.0, 0.0]]);
    }

    #[test]
    fn test_resample_drops_nearby_ghosts() {
        let recording = Recording::new(vec![Scan::new(
            0,
            vec![[10.0, 500.0], [11.0, 501.0], [50.0, 500.0]],
        )]);
        let mut cfg = config();
        cfg.artifact_x_epsilon = 0.0;
        cfg.bounds = Bounds::new(-5.0, 5.0, 0.0, 400.0);
        cfg.resample = true;
        cfg.min_proximity = 2.0;

        let out = classify(&recording, &cfg);
        assert_eq!(out.ghosted.to_coords(), vec![[10.0, 500.0, 0.0], [50.0, 500.0, 0.0]]);

        cfg.resample = false;
        assert_eq!(classify(&recording, &cfg).ghosted.len(), 3);
    }

    #[test]
    fn test_resample_compares_against_last_kept() {
        // each step moves 1.5 mm; relative to the last kept point the third is 3 mm away
        let recording = Recording::new(vec![Scan::new(
            0,
            vec![[200.0, 500.0], [201.5, 501.5], [203.0, 503.0]],
        )]);
        let mut cfg = config();
        cfg.resample = true;
        cfg.min_proximity = 2.0;

        let out = classify(&recording, &cfg);
        assert_eq!(out.ghosted.len(), 2);
        assert_eq!(out.ghosted.x[1], 203.0);
    }

    #[test]
    fn test_resample_resets_per_scan() {
        let recording = Recording::new(vec![
            Scan::new(0, vec![[200.0, 500.0]]),
            Scan::new(100, vec![[200.0, 500.0]]),
        ]);
        let mut cfg = config();
        cfg.resample = true;

        let out = classify(&recording, &cfg);
        assert_eq!(out.ghosted.len(), 2);
        assert_eq!(out.ghosted.z, vec![0.0, 3.0]);
    }

    #[test]
    fn test_time_dependent_depth() {
        let recording = Recording::new(vec![
            Scan::new(2000, vec![[0.0, 200.0]]),
            Scan::new(2500, vec![[0.0, 200.0]]),
        ]);
        let mut cfg = config();
        cfg.time_dependent = true;

        let out = classify(&recording, &cfg);
        assert_eq!(out.opaque.z, vec![0.0, 15.0]);

        let t0 = 1_700_000_000_000;
        let recording = Recording::new(vec![
            Scan::new(t0, vec![[0.0, 200.0]]),
            Scan::new(t0 + 500, vec![[0.0, 200.0]]),
        ]);
        assert_eq!(classify(&recording, &cfg).opaque.z, vec![0.0, 15.0]);
    }
}
