//! Parsers for recorded range-scan CSV files and the point cloud container.
//!
//! A recording holds one scan per line:
//!
//! ```text
//! timestamp_ms, x0, y0, x1, y1, ..., xN-1, yN-1
//! ```
//!
//! Times are milliseconds since the start of the recording, coordinates are
//! millimeters relative to the sensor. The same line rules apply whether a
//! whole file is parsed at once or scans arrive one by one from a live feed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

use crate::config::IngestConfig;

/// Errors that can occur while ingesting scans.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: field {field} is not a number: {value:?}")]
    Parse {
        line: usize,
        field: usize,
        value: String,
    },

    #[error("line {line}: incomplete scan, expected {expected} fields but found {found}")]
    IncompleteScan {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("leading_fields must be at least 1, field 0 holds the timestamp")]
    MissingTimestampField,

    #[error("Empty recording: {0}")]
    EmptyRecording(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One sweep of the rangefinder.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    /// Capture time in milliseconds since the recording epoch.
    pub timestamp_ms: u64,
    /// Cartesian readings `[x, y]` in millimeters, indexed by angular position.
    pub points: Vec<[f32; 2]>,
}

impl Scan {
    pub fn new(timestamp_ms: u64, points: Vec<[f32; 2]>) -> Self {
        Self {
            timestamp_ms,
            points,
        }
    }

    /// Capture time in seconds since the recording epoch.
    #[inline]
    pub fn timestamp_s(&self) -> f64 {
        self.timestamp_ms as f64 / 1000.0
    }

    /// Seconds elapsed since `t0_ms`, computed in whole milliseconds first.
    #[inline]
    pub fn elapsed_s(&self, t0_ms: u64) -> f32 {
        (self.timestamp_ms.saturating_sub(t0_ms) as f64 / 1000.0) as f32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ordered sequence of scans; the index is the scan number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub scans: Vec<Scan>,
}

impl Recording {
    pub fn new(scans: Vec<Scan>) -> Self {
        Self { scans }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    #[inline]
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }
}

/// Line-by-line scan parser.
///
/// Keeps the physical line counter (empty lines included) so errors point at
/// the offending line, and remembers the inferred sample count when the
/// configuration leaves it open.
#[derive(Debug, Clone)]
pub struct ScanParser {
    config: IngestConfig,
    samples_per_scan: Option<usize>,
    line: usize,
}

impl ScanParser {
    pub fn new(config: IngestConfig) -> Self {
        let samples_per_scan = config.samples_per_scan;
        Self {
            config,
            samples_per_scan,
            line: 0,
        }
    }

    /// Number of lines seen so far.
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Sample count in effect, once known.
    #[inline]
    pub fn samples_per_scan(&self) -> Option<usize> {
        self.samples_per_scan
    }

    /// Parse the next line of a recording.
    ///
    /// Returns `Ok(None)` for blank lines. A malformed field or a short line
    /// yields an error and no scan.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Scan>> {
        self.line += 1;
        let line_no = self.line;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        let leading = self.config.leading_fields;
        if leading == 0 {
            return Err(LoaderError::MissingTimestampField);
        }

        let samples = match self.samples_per_scan {
            Some(n) => n,
            None => {
                let inferred = fields.len().saturating_sub(leading) / 2;
                debug!("line {}: inferred {} samples per scan", line_no, inferred);
                self.samples_per_scan = Some(inferred);
                inferred
            }
        };

        let expected = leading + 2 * samples;
        if fields.len() < expected {
            return Err(LoaderError::IncompleteScan {
                line: line_no,
                expected,
                found: fields.len(),
            });
        }

        let timestamp_ms = parse_timestamp(fields[0]).ok_or_else(|| LoaderError::Parse {
            line: line_no,
            field: 0,
            value: fields[0].to_string(),
        })?;

        let mut points = Vec::with_capacity(samples);
        for i in 0..samples {
            let xi = leading + 2 * i;
            let x = parse_coord(fields[xi], line_no, xi)?;
            let y = parse_coord(fields[xi + 1], line_no, xi + 1)?;
            points.push([x, y]);
        }

        Ok(Some(Scan::new(timestamp_ms, points)))
    }
}

fn parse_timestamp(field: &str) -> Option<u64> {
    if let Ok(ms) = field.parse::<u64>() {
        return Some(ms);
    }
    // Some recorders print whole milliseconds as floats ("1500.0")
    match field.parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 0.0 && ms.fract() == 0.0 && ms <= u64::MAX as f64 => {
            Some(ms as u64)
        }
        _ => None,
    }
}

fn parse_coord(field: &str, line: usize, index: usize) -> Result<f32> {
    match field.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LoaderError::Parse {
            line,
            field: index,
            value: field.to_string(),
        }),
    }
}

/// Parse a whole recording held in memory.
///
/// Any malformed field aborts the parse. Incomplete scans abort too unless
/// `config.skip_incomplete` is set, in which case they are logged and dropped.
pub fn parse_recording(text: &str, config: &IngestConfig) -> Result<Recording> {
    let mut parser = ScanParser::new(config.clone());
    let mut scans = Vec::new();

    for line in text.lines() {
        match parser.parse_line(line) {
            Ok(Some(scan)) => scans.push(scan),
            Ok(None) => {}
            Err(LoaderError::IncompleteScan {
                line,
                expected,
                found,
            }) if config.skip_incomplete => {
                warn!(
                    "Skipping incomplete scan on line {} ({} of {} fields)",
                    line, found, expected
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Recording::new(scans))
}

/// Load a recording from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a line is malformed, or the
/// file has no scans at all.
pub fn load_recording<P: AsRef<Path>>(path: P, config: &IngestConfig) -> Result<Recording> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let recording = parse_recording(&text, config)?;

    if recording.is_empty() {
        return Err(LoaderError::EmptyRecording(path.to_path_buf()));
    }

    debug!("{}: {} scans", path.display(), recording.len());
    Ok(recording)
}

/// Color of a single point: RGB plus transparency in `[0, 1]` (1 = opaque).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointColor {
    pub rgb: [u8; 3],
    pub alpha: f32,
}

impl PointColor {
    pub fn opaque(rgb: [u8; 3]) -> Self {
        Self { rgb, alpha: 1.0 }
    }

    pub fn translucent(rgb: [u8; 3], alpha: f32) -> Self {
        Self {
            rgb,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }
}

/// Container for colored 3D point data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
    /// Per-point color.
    pub colors: Vec<PointColor>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, point: [f32; 3], color: PointColor) {
        self.x.push(point[0]);
        self.y.push(point[1]);
        self.z.push(point[2]);
        self.colors.push(color);
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f32; 3]> {
        (0..self.len())
            .map(|i| [self.x[i], self.y[i], self.z[i]])
            .collect()
    }

    /// Iterates over points with their colors in insertion order.
    pub fn points(&self) -> impl Iterator<Item = ([f32; 3], PointColor)> + '_ {
        (0..self.len()).map(move |i| ([self.x[i], self.y[i], self.z[i]], self.colors[i]))
    }
}
