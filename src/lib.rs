//! Point cloud reconstruction and person segmentation for 2D rangefinder scans.
//!
//! This crate provides tools for:
//! - Loading recorded URG scans (`timestamp, x0, y0, x1, y1, ...` per line)
//! - Stacking scans into a linear or spherical point cloud
//! - Splitting points into opaque and ghosted sets by region of interest
//! - Detecting people passing through the scan plane and exporting them
//!
//! # Example
//!
//! ```no_run
//! use urg_pipeline::{core::load_recording, processors::segmentation::segment_people};
//! use urg_pipeline::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! let recording = load_recording("hall_recording.csv", &config.ingest).unwrap();
//! let people = segment_people(&recording, &config.segment);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{
    ClassifyConfig, ExportConfig, IngestConfig, LinearConfig, PipelineConfig, SegmentConfig,
    SphericalConfig,
};
pub use core::loaders::{PointCloud, Recording, Scan};
pub use processors::segmentation::PersonSegment;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
