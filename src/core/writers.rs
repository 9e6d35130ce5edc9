//! Data writers for PLY and CSV formats.
//!
//! - PLY (Polygon File Format) with ASCII encoding, RGB colors and alpha
//! - CSV summaries of detected person segments

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::PointCloud;
use crate::processors::segmentation::PersonSegment;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Write a point cloud as PLY to any writer.
///
/// Alpha is stored as a `uchar` property (`round(alpha * 255)`), so opaque
/// points carry 255.
pub fn write_ply_to<W: Write>(writer: &mut W, cloud: &PointCloud) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "property uchar alpha")?;
    writeln!(writer, "end_header")?;

    for ([x, y, z], color) in cloud.points() {
        let [r, g, b] = color.rgb;
        let a = (color.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        writeln!(writer, "{:.6} {:.6} {:.6} {} {} {} {}", x, y, z, r, g, b, a)?;
    }

    writer.flush()
}

/// Write point cloud to an ASCII PLY file.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use urg_pipeline::core::loaders::PointCloud;
/// use urg_pipeline::core::writers::write_ply;
/// use std::path::Path;
///
/// let cloud = PointCloud::default();
/// write_ply(Path::new("output.ply"), &cloud).unwrap();
/// ```
pub fn write_ply(path: &Path, cloud: &PointCloud) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    write_ply_to(&mut writer, cloud).map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write person segments to CSV, one row per segment.
pub fn write_segments_csv(path: &Path, segments: &[PersonSegment]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let path_str = path.display().to_string();

    for segment in segments {
        csv_writer
            .serialize(segment)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    // serialize() only emits headers with the first record
    if segments.is_empty() {
        csv_writer
            .write_record(PersonSegment::CSV_HEADER)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::PointColor;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        cloud.push([1.0, 4.0, 7.0], PointColor::opaque([255, 0, 0]));
        cloud.push([2.0, 5.0, 8.0], PointColor::translucent([0, 255, 0], 0.2));
        cloud
    }

    #[test]
    fn test_write_ply_with_alpha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.ply");

        write_ply(&path, &create_test_cloud()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "ply");
        assert_eq!(lines[1], "format ascii 1.0");
        assert_eq!(lines[2], "element vertex 2");
        assert_eq!(lines[9], "property uchar alpha");
        assert_eq!(lines[10], "end_header");
        assert_eq!(lines[11], "1.000000 4.000000 7.000000 255 0 0 255");
        assert_eq!(lines[12], "2.000000 5.000000 8.000000 0 255 0 51");
    }

    #[test]
    fn test_write_ply_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir").join("nested").join("test.ply");

        write_ply(&path, &PointCloud::new()).unwrap();

        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("element vertex 0"));
    }

    #[test]
    fn test_write_segments_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segments.csv");
        let segments = vec![
            PersonSegment {
                scan_start: 3,
                scan_length: 4,
                n_data_points: 80,
                start_location: 9.0,
                running_avg_position: 1200.5,
            },
            PersonSegment {
                scan_start: 20,
                scan_length: 1,
                n_data_points: 21,
                start_location: 60.0,
                running_avg_position: 900.0,
            },
        ];

        write_segments_csv(&path, &segments).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "scan_start,scan_length,n_data_points,start_location,running_avg_position"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("3,4,80,9"));
    }

    #[test]
    fn test_write_empty_segments_csv_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segments.csv");

        write_segments_csv(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("scan_start,"));
    }
}
