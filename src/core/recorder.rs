//! Writes live capture data to recording files.
//!
//! The sensor feed delivers each sweep as `(range_mm, theta_rad)` pairs. The
//! recorder converts every sweep to Cartesian readings and appends it as one
//! recording line, with times measured from the first recorded sweep.

use std::io::{BufRead, Write};

use log::{debug, warn};
use thiserror::Error;

use super::loaders::Scan;
use super::transforms::polar_to_cartesian;

/// Default time without data after which the feed is considered dead (ms).
pub const DEFAULT_DATA_TIMEOUT_MS: u64 = 1000;

/// Errors that can occur while recording.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: field {field} is not a number: {value:?}")]
    Parse {
        line: usize,
        field: usize,
        value: String,
    },

    #[error("line {line}: odd number of polar fields ({found})")]
    UnpairedField { line: usize, found: usize },
}

/// Appends scans to a recording sink.
pub struct ScanRecorder<W: Write> {
    writer: W,
    time_zero_ms: Option<u64>,
    scan_count: usize,
    last_data_ms: Option<u64>,
    live: bool,
    data_timeout_ms: u64,
}

impl<W: Write> ScanRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            time_zero_ms: None,
            scan_count: 0,
            last_data_ms: None,
            live: false,
            data_timeout_ms: DEFAULT_DATA_TIMEOUT_MS,
        }
    }

    pub fn with_timeout(mut self, data_timeout_ms: u64) -> Self {
        self.data_timeout_ms = data_timeout_ms;
        self
    }

    /// Number of scans written so far.
    #[inline]
    pub fn scan_count(&self) -> usize {
        self.scan_count
    }

    /// Record one sweep received at `now_ms` (any monotonic clock).
    ///
    /// The first sweep defines time zero. Returns the scan as written.
    pub fn record(&mut self, now_ms: u64, readings: &[(f32, f32)]) -> Result<Scan, RecorderError> {
        let time_zero = *self.time_zero_ms.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(time_zero);

        let range_sum: f32 = readings.iter().map(|&(r, _)| r).sum();
        self.live = range_sum != 0.0;
        self.last_data_ms = Some(now_ms);
        if !self.live {
            debug!("scan {} carries no range data", self.scan_count);
        }

        let points = polar_to_cartesian(readings);

        write!(self.writer, "{}", elapsed)?;
        for [x, y] in &points {
            write!(self.writer, ",{},{}", x, y)?;
        }
        writeln!(self.writer)?;

        self.scan_count += 1;
        Ok(Scan::new(elapsed, points))
    }

    /// Whether the feed is delivering non-empty sweeps.
    pub fn is_live(&self, now_ms: u64) -> bool {
        match self.last_data_ms {
            Some(last) => self.live && now_ms.saturating_sub(last) <= self.data_timeout_ms,
            None => false,
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, RecorderError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Convert a polar capture (`timestamp, r0, theta0, r1, theta1, ...`) into a
/// Cartesian recording, using the capture's own timestamps as the clock.
///
/// Returns the number of scans written.
pub fn convert_polar_recording<R: BufRead, W: Write>(
    input: R,
    output: W,
) -> Result<usize, RecorderError> {
    let mut recorder = ScanRecorder::new(output);

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        let values = &fields[1..];
        if values.len() % 2 != 0 {
            return Err(RecorderError::UnpairedField {
                line: line_no,
                found: values.len(),
            });
        }

        let now_ms = fields[0]
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .ok_or_else(|| RecorderError::Parse {
                line: line_no,
                field: 0,
                value: fields[0].to_string(),
            })? as u64;

        let mut readings = Vec::with_capacity(values.len() / 2);
        for (pair_idx, pair) in values.chunks(2).enumerate() {
            let field = 1 + 2 * pair_idx;
            let r = parse_field(pair[0], line_no, field)?;
            let theta = parse_field(pair[1], line_no, field + 1)?;
            readings.push((r, theta));
        }

        recorder.record(now_ms, &readings)?;
    }

    let count = recorder.scan_count();
    if count == 0 {
        warn!("polar capture contained no scans");
    }
    recorder.finish()?;
    Ok(count)
}

fn parse_field(field: &str, line: usize, index: usize) -> Result<f32, RecorderError> {
    field.parse::<f32>().map_err(|_| RecorderError::Parse {
        line,
        field: index,
        value: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::core::loaders::parse_recording;

    #[test]
    fn test_record_relative_timestamps() {
        let mut recorder = ScanRecorder::new(Vec::new());
        recorder.record(5000, &[(100.0, 0.0)]).unwrap();
        let scan = recorder.record(5120, &[(200.0, 0.0)]).unwrap();
        assert_eq!(scan.timestamp_ms, 120);
        assert_eq!(recorder.scan_count(), 2);

        let bytes = recorder.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0,100,0");
        assert_eq!(lines[1], "120,200,0");
    }

    #[test]
    fn test_liveness() {
        let mut recorder = ScanRecorder::new(Vec::new()).with_timeout(1000);
        assert!(!recorder.is_live(0));

        recorder.record(0, &[(100.0, 0.0)]).unwrap();
        assert!(recorder.is_live(500));
        assert!(!recorder.is_live(1500));

        recorder.record(1600, &[(0.0, 0.0), (0.0, 1.0)]).unwrap();
        assert!(!recorder.is_live(1600));
    }

    #[test]
    fn test_recorded_output_parses_back() {
        let mut recorder = ScanRecorder::new(Vec::new());
        recorder.record(10, &[(300.0, 0.0), (150.0, 0.0)]).unwrap();
        recorder.record(110, &[(310.0, 0.0), (160.0, 0.0)]).unwrap();
        let text = String::from_utf8(recorder.finish().unwrap()).unwrap();

        let config = IngestConfig {
            samples_per_scan: None,
            ..IngestConfig::default()
        };
        let recording = parse_recording(&text, &config).unwrap();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.scans[1].timestamp_ms, 100);
        assert_eq!(recording.scans[1].points[1], [160.0, 0.0]);
    }

    #[test]
    fn test_convert_polar_recording() {
        let input = "1000,100,0,200,0\n\n1100,110,0,210,0\n";
        let mut out = Vec::new();
        let count = convert_polar_recording(input.as_bytes(), &mut out).unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0,100,0,200,0\n"));
        assert!(text.contains("100,110,0,210,0"));
    }

    #[test]
    fn test_convert_polar_recording_unpaired() {
        let input = "0,100,0,200\n";
        let err = convert_polar_recording(input.as_bytes(), Vec::new()).unwrap_err();
        assert!(matches!(err, RecorderError::UnpairedField { line: 1, found: 3 }));
    }
}
