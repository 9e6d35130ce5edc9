//! Scan processing stages: projection, classification, segmentation, export.

pub mod batch;
pub mod export;
pub mod linear;
pub mod segmentation;
pub mod spherical;
pub mod visibility;

use std::fmt;
use std::ops::Range;

use log::warn;
use thiserror::Error;

/// Non-fatal conditions reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionWarning {
    /// The requested scan range ran past the recording and was clamped.
    RangeClamped { requested: usize, available: usize },
}

impl fmt::Display for ProjectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionWarning::RangeClamped {
                requested,
                available,
            } => write!(
                f,
                "requested scans up to {} but the recording has {}; range clamped",
                requested, available
            ),
        }
    }
}

/// Errors that abort a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(
        "no scan reaches period {starting_period} (period = {period} deg); try a lower starting period"
    )]
    IntervalNotFound { starting_period: f32, period: f32 },
}

/// Resolve a half-open scan range against a recording of `n_scans` scans.
///
/// `end = None` means "to the end". An end (or start) past the recording is
/// clamped and reported; the warning is also logged.
pub fn select_scans(
    n_scans: usize,
    start: usize,
    end: Option<usize>,
) -> (Range<usize>, Option<ProjectionWarning>) {
    let mut warning = None;

    let end = match end {
        Some(requested) if requested > n_scans => {
            warning = Some(ProjectionWarning::RangeClamped {
                requested,
                available: n_scans,
            });
            n_scans
        }
        Some(requested) => requested,
        None => n_scans,
    };

    if start > n_scans && warning.is_none() {
        warning = Some(ProjectionWarning::RangeClamped {
            requested: start,
            available: n_scans,
        });
    }

    if let Some(ref w) = warning {
        warn!("{}", w);
    }

    (start.min(end)..end, warning)
}

/// Reading indices `[min, max)` clamped to a scan of `len` readings.
#[inline]
pub(crate) fn index_range(min_index: usize, max_index: usize, len: usize) -> Range<usize> {
    let end = max_index.min(len);
    min_index.min(end)..end
}
