//! Configuration types for the scan pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of angular samples in one sweep of the rangefinder.
pub const DEFAULT_SAMPLES_PER_SCAN: usize = 682;

/// Configuration for parsing recorded scan lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Readings per scan. `None` infers the count from the first scan line.
    #[serde(default = "default_samples_per_scan")]
    pub samples_per_scan: Option<usize>,

    /// Number of fields ahead of the first x/y pair (the timestamp column)
    #[serde(default = "default_leading_fields")]
    pub leading_fields: usize,

    /// Skip short lines instead of aborting the whole recording
    #[serde(default)]
    pub skip_incomplete: bool,
}

fn default_samples_per_scan() -> Option<usize> {
    Some(DEFAULT_SAMPLES_PER_SCAN)
}

fn default_leading_fields() -> usize {
    1
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            samples_per_scan: default_samples_per_scan(),
            leading_fields: default_leading_fields(),
            skip_incomplete: false,
        }
    }
}

/// Which scans of a recording, and which readings of each scan, to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSelection {
    /// First scan (inclusive)
    #[serde(default)]
    pub start_scan: usize,

    /// Last scan (exclusive); negative means "to the end"
    #[serde(default = "default_end_scan")]
    pub end_scan: i64,

    /// First reading index (inclusive)
    #[serde(default)]
    pub min_index: usize,

    /// Last reading index (exclusive)
    #[serde(default = "default_max_index")]
    pub max_index: usize,
}

fn default_end_scan() -> i64 {
    -1
}

fn default_max_index() -> usize {
    DEFAULT_SAMPLES_PER_SCAN
}

impl ScanSelection {
    /// Requested end scan, or `None` for "to the end".
    pub fn end_bound(&self) -> Option<usize> {
        if self.end_scan < 0 {
            None
        } else {
            Some(self.end_scan as usize)
        }
    }
}

impl Default for ScanSelection {
    fn default() -> Self {
        Self {
            start_scan: 0,
            end_scan: default_end_scan(),
            min_index: 0,
            max_index: default_max_index(),
        }
    }
}

/// Axis-aligned region of interest in the scan plane (millimeters, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Bounds {
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(-600.0, 600.0, 0.0, 2200.0)
    }
}

/// Configuration for stacking scans along a synthetic time axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConfig {
    #[serde(default)]
    pub selection: ScanSelection,

    /// Distance in mm travelled per second of capture
    #[serde(default = "default_z_scale")]
    pub z_scale: f32,

    /// Space scans by capture time instead of a nominal 10 scans/sec
    #[serde(default)]
    pub time_dependent: bool,

    /// Discard readings closer than this to the sensor (0 disables)
    #[serde(default = "default_cull_distance")]
    pub cull_distance: f32,

    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

fn default_z_scale() -> f32 {
    30.0
}

fn default_cull_distance() -> f32 {
    265.0
}

fn default_color() -> [u8; 3] {
    [255, 255, 255]
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            selection: ScanSelection::default(),
            z_scale: default_z_scale(),
            time_dependent: false,
            cull_distance: default_cull_distance(),
            color: default_color(),
        }
    }
}

/// Configuration for sweeping scans of a rotating sensor onto a sphere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SphericalConfig {
    /// Rotation speed of the sensor mount (degrees / sec)
    #[serde(default = "default_speed")]
    pub speed_deg_per_s: f32,

    /// Angular size of one period (degrees)
    #[serde(default = "default_period")]
    pub period_deg: f32,

    /// Period at which to start loading scans
    #[serde(default)]
    pub starting_period: f32,

    /// Number of periods to load; negative loads everything after the start
    #[serde(default = "default_n_periods")]
    pub n_periods: f32,

    #[serde(default)]
    pub min_index: usize,

    #[serde(default = "default_max_index")]
    pub max_index: usize,

    /// Whether the mount rotated clockwise
    #[serde(default = "default_true")]
    pub clockwise: bool,

    #[serde(default = "default_cull_distance")]
    pub cull_distance: f32,

    /// Angle spread linearly across a scan to seam-align consecutive half sweeps
    #[serde(default)]
    pub alignment_angle_deg: f32,

    /// Drop scans emitted again within `duplicate_threshold_s`
    #[serde(default = "default_true")]
    pub cull_duplicate_scans: bool,

    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold_s: f32,

    /// Reading count the alignment angle is spread over
    #[serde(default = "default_index_count")]
    pub index_count: usize,

    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

fn default_speed() -> f32 {
    225.0 / 64.0
}

fn default_period() -> f32 {
    180.0
}

fn default_n_periods() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_duplicate_threshold() -> f32 {
    0.05
}

fn default_index_count() -> usize {
    DEFAULT_SAMPLES_PER_SCAN
}

impl Default for SphericalConfig {
    fn default() -> Self {
        Self {
            speed_deg_per_s: default_speed(),
            period_deg: default_period(),
            starting_period: 0.0,
            n_periods: default_n_periods(),
            min_index: 0,
            max_index: default_max_index(),
            clockwise: true,
            cull_distance: default_cull_distance(),
            alignment_angle_deg: 0.0,
            cull_duplicate_scans: true,
            duplicate_threshold_s: default_duplicate_threshold(),
            index_count: default_index_count(),
            color: default_color(),
        }
    }
}

/// Configuration for splitting points into opaque and ghosted sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    #[serde(default)]
    pub selection: ScanSelection,

    /// Region whose points are drawn opaque
    #[serde(default)]
    pub bounds: Bounds,

    #[serde(default = "default_z_scale")]
    pub z_scale: f32,

    #[serde(default)]
    pub time_dependent: bool,

    /// Alpha of points outside the region, in [0, 1]
    #[serde(default = "default_transparency")]
    pub transparency: f32,

    /// Thin out ghosted points that barely moved within a scan
    #[serde(default)]
    pub resample: bool,

    /// Resampling threshold on both |dx| and |dy| (mm)
    #[serde(default = "default_min_proximity")]
    pub min_proximity: f32,

    /// Readings with y below this are noise (mm)
    #[serde(default = "default_noise_floor")]
    pub noise_floor_y: f32,

    /// |x| below this counts as "on the axis" for the free-radial artifact
    #[serde(default = "default_artifact_x_epsilon")]
    pub artifact_x_epsilon: f32,

    /// Band above `bounds.y_max` in which on-axis readings are artifacts: (lo, hi]
    #[serde(default = "default_artifact_band")]
    pub artifact_band_mm: [f32; 2],

    #[serde(default = "default_color")]
    pub opaque_color: [u8; 3],

    #[serde(default = "default_color")]
    pub ghost_color: [u8; 3],
}

fn default_transparency() -> f32 {
    0.2
}

fn default_min_proximity() -> f32 {
    20.0
}

fn default_noise_floor() -> f32 {
    10.0
}

fn default_artifact_x_epsilon() -> f32 {
    1.0
}

fn default_artifact_band() -> [f32; 2] {
    [0.0, 300.0]
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            selection: ScanSelection::default(),
            bounds: Bounds::default(),
            z_scale: default_z_scale(),
            time_dependent: false,
            transparency: default_transparency(),
            resample: false,
            min_proximity: default_min_proximity(),
            noise_floor_y: default_noise_floor(),
            artifact_x_epsilon: default_artifact_x_epsilon(),
            artifact_band_mm: default_artifact_band(),
            opaque_color: default_color(),
            ghost_color: default_color(),
        }
    }
}

/// Reading component averaged to track a person's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    #[default]
    Y,
}

/// Configuration for the person segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    #[serde(default)]
    pub start_scan: usize,

    #[serde(default = "default_end_scan")]
    pub end_scan: i64,

    /// Region in which readings count as occupancy evidence
    #[serde(default)]
    pub bounds: Bounds,

    /// A scan needs strictly more in-bounds readings than this
    #[serde(default = "default_min_point_count")]
    pub min_point_count: usize,

    /// Largest jump in average position that still continues a person (mm)
    #[serde(default = "default_max_continuity_distance")]
    pub max_continuity_distance: f32,

    #[serde(default)]
    pub height_axis: Axis,

    #[serde(default = "default_z_scale")]
    pub z_scale: f32,

    /// Weight of the newest scan in the running average
    #[serde(default = "default_smoothing_weight")]
    pub smoothing_weight: f32,
}

fn default_min_point_count() -> usize {
    20
}

fn default_max_continuity_distance() -> f32 {
    150.0
}

fn default_smoothing_weight() -> f32 {
    0.5
}

impl SegmentConfig {
    pub fn end_bound(&self) -> Option<usize> {
        if self.end_scan < 0 {
            None
        } else {
            Some(self.end_scan as usize)
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            start_scan: 0,
            end_scan: default_end_scan(),
            bounds: Bounds::default(),
            min_point_count: default_min_point_count(),
            max_continuity_distance: default_max_continuity_distance(),
            height_axis: Axis::Y,
            z_scale: default_z_scale(),
            smoothing_weight: default_smoothing_weight(),
        }
    }
}

/// Configuration for exporting buffered windows around detected people.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Scans kept before and after every person
    #[serde(default = "default_buffer_people")]
    pub buffer_people: usize,

    /// Extra scans kept before the first and after the last person
    #[serde(default = "default_buffer_ends")]
    pub buffer_ends: usize,

    #[serde(default = "default_z_scale")]
    pub z_scale: f32,
}

fn default_buffer_people() -> usize {
    5
}

fn default_buffer_ends() -> usize {
    20
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            buffer_people: default_buffer_people(),
            buffer_ends: default_buffer_ends(),
            z_scale: default_z_scale(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub linear: LinearConfig,

    #[serde(default)]
    pub spherical: SphericalConfig,

    #[serde(default)]
    pub classify: ClassifyConfig,

    #[serde(default)]
    pub segment: SegmentConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.ingest.samples_per_scan, Some(682));
        assert_eq!(config.ingest.leading_fields, 1);
        assert_eq!(config.linear.z_scale, 30.0);
        assert_eq!(config.spherical.duplicate_threshold_s, 0.05);
        assert_eq!(config.segment.smoothing_weight, 0.5);
        assert_eq!(config.segment.height_axis, Axis::Y);
    }

    #[test]
    fn test_end_bound() {
        let mut selection = ScanSelection::default();
        assert_eq!(selection.end_bound(), None);
        selection.end_scan = 12;
        assert_eq!(selection.end_bound(), Some(12));
    }

    #[test]
    fn test_bounds_inclusive() {
        let bounds = Bounds::new(0.0, 400.0, 0.0, 400.0);
        assert!(bounds.contains(0.0, 400.0));
        assert!(bounds.contains(300.0, 300.0));
        assert!(!bounds.contains(400.1, 10.0));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "segment:\n  min_point_count: 3\n  height_axis: x\nspherical:\n  clockwise: false\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.segment.min_point_count, 3);
        assert_eq!(config.segment.height_axis, Axis::X);
        assert_eq!(config.segment.max_continuity_distance, 150.0);
        assert!(!config.spherical.clockwise);
        assert!(config.spherical.cull_duplicate_scans);
        assert_eq!(config.linear.selection.max_index, 682);
    }

    #[test]
    fn test_yaml_round_trip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        let mut config = PipelineConfig::default();
        config.export.buffer_ends = 7;
        config.to_yaml(&path).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.export.buffer_ends, 7);
    }
}
