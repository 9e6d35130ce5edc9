//! Batch segmentation and export over a directory of recordings.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use super::export::export_people;
use super::segmentation::segment_people;
use crate::config::PipelineConfig;
use crate::core::loaders::{load_recording, LoaderError};
use crate::core::writers::{write_segments_csv, WriteError};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("failed to read directory '{path}': {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid recording pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Files written for one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutput {
    pub input: PathBuf,
    pub n_scans: usize,
    pub n_people: usize,
    pub segments_csv: PathBuf,
    pub opaque_ply: PathBuf,
    pub transparent_ply: PathBuf,
}

/// Outcome of a batch run. Failures never abort the other recordings.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub exported: Vec<RecordingOutput>,
    pub failed: Vec<(PathBuf, BatchError)>,
}

/// Find recording CSVs (`*recording*.csv`, case-insensitive) in `directory`,
/// sorted by path.
pub fn find_recordings(directory: &Path) -> Result<Vec<PathBuf>> {
    let pattern = Regex::new(r"(?i)recording")?;

    let entries = fs::read_dir(directory).map_err(|e| BatchError::ReadDir {
        path: directory.display().to_string(),
        source: e,
    })?;

    let mut recordings: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|stem| pattern.is_match(stem))
                .unwrap_or(false)
        })
        .collect();

    recordings.sort();
    Ok(recordings)
}

/// Segment and export a single recording into `out_dir`, naming the outputs
/// after the input file stem.
pub fn export_recording(input: &Path, out_dir: &Path, config: &PipelineConfig) -> Result<RecordingOutput> {
    let recording = load_recording(input, &config.ingest)?;
    let segments = segment_people(&recording, &config.segment);

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");

    let segments_csv = out_dir.join(format!("{}_segments.csv", stem));
    write_segments_csv(&segments_csv, &segments)?;

    let (opaque_ply, transparent_ply) = export_people(
        &recording,
        &segments,
        &config.export,
        &config.classify,
        out_dir,
        stem,
    )?;

    Ok(RecordingOutput {
        input: input.to_path_buf(),
        n_scans: recording.len(),
        n_people: segments.len(),
        segments_csv,
        opaque_ply,
        transparent_ply,
    })
}

/// Export every input in parallel. Results keep the input order.
pub fn export_batch(inputs: &[PathBuf], out_dir: &Path, config: &PipelineConfig) -> BatchSummary {
    let results: Vec<(PathBuf, Result<RecordingOutput>)> = inputs
        .par_iter()
        .map(|input| (input.clone(), export_recording(input, out_dir, config)))
        .collect();

    let mut summary = BatchSummary::default();
    for (input, result) in results {
        match result {
            Ok(output) => {
                info!(
                    "{}: {} scans, {} people",
                    input.display(),
                    output.n_scans,
                    output.n_people
                );
                summary.exported.push(output);
            }
            Err(e) => {
                error!("{}: {}", input.display(), e);
                summary.failed.push((input, e));
            }
        }
    }

    summary
}
