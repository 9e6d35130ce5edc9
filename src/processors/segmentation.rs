//! Single-pass person segmentation over a recording.
//!
//! Every scan is reduced to the number of readings inside a bounding box and
//! the sum of their positions along the height axis. A person starts when a
//! scan has enough in-bounds readings, continues while the average position
//! stays close to its running average, and ends when either condition fails.

use log::{debug, info};
use serde::Serialize;

use super::select_scans;
use crate::config::{Axis, Bounds, SegmentConfig};
use crate::core::loaders::{Recording, Scan};

/// A contiguous run of scans attributed to one person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonSegment {
    /// First scan of the segment
    pub scan_start: usize,
    /// Number of scans in the segment (at least 1)
    pub scan_length: usize,
    /// In-bounds readings accumulated over the segment
    pub n_data_points: usize,
    /// Position of the first scan along the stacking axis (mm)
    pub start_location: f32,
    /// Smoothed average position along the height axis (mm)
    pub running_avg_position: f32,
}

impl PersonSegment {
    pub const CSV_HEADER: [&'static str; 5] = [
        "scan_start",
        "scan_length",
        "n_data_points",
        "start_location",
        "running_avg_position",
    ];

    /// One past the last scan of the segment.
    #[inline]
    pub fn scan_end(&self) -> usize {
        self.scan_start + self.scan_length
    }
}

/// Occupancy evidence of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScanStats {
    pub n_in_bounds: usize,
    pub sum_of_positions: f32,
}

impl ScanStats {
    /// Average position of the in-bounds readings, if there are any.
    pub fn average(&self) -> Option<f32> {
        if self.n_in_bounds == 0 {
            None
        } else {
            Some(self.sum_of_positions / self.n_in_bounds as f32)
        }
    }
}

/// Count and sum the readings of a scan that fall inside `bounds`.
pub fn scan_stats(scan: &Scan, bounds: &Bounds, axis: Axis) -> ScanStats {
    scan.points
        .iter()
        .filter(|&&[x, y]| bounds.contains(x, y))
        .fold(ScanStats::default(), |mut stats, &[x, y]| {
            stats.n_in_bounds += 1;
            stats.sum_of_positions += match axis {
                Axis::X => x,
                Axis::Y => y,
            };
            stats
        })
}

/// The segmenter's state machine, holding at most one running person.
#[derive(Debug, Clone)]
pub struct PersonTracker {
    min_point_count: usize,
    max_continuity_distance: f32,
    smoothing_weight: f32,
    z_scale: f32,
    running: Option<PersonSegment>,
}

impl PersonTracker {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            min_point_count: config.min_point_count,
            max_continuity_distance: config.max_continuity_distance,
            smoothing_weight: config.smoothing_weight,
            z_scale: config.z_scale,
            running: None,
        }
    }

    /// The person currently being tracked, if any.
    pub fn running(&self) -> Option<&PersonSegment> {
        self.running.as_ref()
    }

    fn start(&self, scan_index: usize, stats: ScanStats, avg: f32) -> PersonSegment {
        PersonSegment {
            scan_start: scan_index,
            scan_length: 1,
            n_data_points: stats.n_in_bounds,
            start_location: scan_index as f32 * 0.1 * self.z_scale,
            running_avg_position: avg,
        }
    }

    /// Feed the statistics of scan `scan_index`.
    ///
    /// Returns the segment finalized by this scan, if the scan ended one.
    pub fn observe(&mut self, scan_index: usize, stats: ScanStats) -> Option<PersonSegment> {
        let avg = match stats.average() {
            Some(avg) if stats.n_in_bounds > self.min_point_count => avg,
            _ => return self.running.take(),
        };

        let continues = self
            .running
            .as_ref()
            .map(|person| (avg - person.running_avg_position).abs() < self.max_continuity_distance);

        match continues {
            Some(true) => {
                let weight = self.smoothing_weight;
                if let Some(person) = self.running.as_mut() {
                    person.scan_length += 1;
                    person.n_data_points += stats.n_in_bounds;
                    person.running_avg_position =
                        weight * avg + (1.0 - weight) * person.running_avg_position;
                }
                None
            }
            Some(false) => {
                let next = self.start(scan_index, stats, avg);
                self.running.replace(next)
            }
            None => {
                self.running = Some(self.start(scan_index, stats, avg));
                None
            }
        }
    }

    /// End of input: finalize the running person, if any.
    pub fn finish(&mut self) -> Option<PersonSegment> {
        self.running.take()
    }
}

/// Detect person segments in the selected scans of a recording.
///
/// Segments come out sorted by `scan_start`, never overlap, and each covers
/// at least one scan.
pub fn segment_people(recording: &Recording, config: &SegmentConfig) -> Vec<PersonSegment> {
    let (range, _) = select_scans(recording.len(), config.start_scan, config.end_bound());
    let n_scans = range.len();

    let mut tracker = PersonTracker::new(config);
    let mut segments = Vec::new();

    for scan_index in range {
        let stats = scan_stats(
            &recording.scans[scan_index],
            &config.bounds,
            config.height_axis,
        );
        if let Some(done) = tracker.observe(scan_index, stats) {
            debug!(
                "person at scans {}..{} ({} points)",
                done.scan_start,
                done.scan_end(),
                done.n_data_points
            );
            segments.push(done);
        }
    }
    segments.extend(tracker.finish());

    info!("{} people detected over {} scans", segments.len(), n_scans);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_point_count: usize) -> SegmentConfig {
        SegmentConfig {
            bounds: Bounds::new(0.0, 400.0, 0.0, 400.0),
            min_point_count,
            max_continuity_distance: 50.0,
            ..SegmentConfig::default()
        }
    }

    fn scan_at(t: u64, points: Vec<[f32; 2]>) -> Scan {
        Scan::new(t, points)
    }

    #[test]
    fn test_three_scans_one_person() {
        let recording = Recording::new(vec![
            scan_at(0, vec![[300.0, 300.0]]),
            scan_at(100, vec![[300.0, 300.0]]),
            scan_at(250, vec![[300.0, 300.0]]),
        ]);
        let segments = segment_people(&recording, &config(0));

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].scan_start, 0);
        assert_eq!(segments[0].scan_length, 3);
        assert_eq!(segments[0].n_data_points, 3);
        assert_eq!(segments[0].running_avg_position, 300.0);
    }

    #[test]
    fn test_count_equal_to_minimum_is_not_a_person() {
        let recording = Recording::new(vec![
            scan_at(0, vec![[100.0, 100.0], [120.0, 100.0]]),
            scan_at(100, vec![[100.0, 100.0], [120.0, 100.0]]),
        ]);
        assert!(segment_people(&recording, &config(2)).is_empty());
        assert_eq!(segment_people(&recording, &config(1)).len(), 1);
    }

    #[test]
    fn test_gap_ends_person() {
        let recording = Recording::new(vec![
            scan_at(0, vec![[100.0, 200.0]]),
            scan_at(100, vec![[900.0, 200.0]]), // out of bounds
            scan_at(200, vec![[100.0, 200.0]]),
            scan_at(300, vec![[100.0, 200.0]]),
        ]);
        let segments = segment_people(&recording, &config(0));

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].scan_start, segments[0].scan_length), (0, 1));
        assert_eq!((segments[1].scan_start, segments[1].scan_length), (2, 2));
    }

    #[test]
    fn test_discontinuity_splits_person() {
        let recording = Recording::new(vec![
            scan_at(0, vec![[100.0, 100.0]]),
            scan_at(100, vec![[100.0, 140.0]]),
            scan_at(200, vec![[100.0, 300.0]]),
        ]);
        let segments = segment_people(&recording, &config(0));

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].scan_length, 2);
        // 0.5 * 140 + 0.5 * 100
        assert_eq!(segments[0].running_avg_position, 120.0);
        assert_eq!(segments[1].scan_start, 2);
        assert_eq!(segments[1].running_avg_position, 300.0);
    }

    #[test]
    fn test_smoothing_weight_is_configurable() {
        let recording = Recording::new(vec![
            scan_at(0, vec![[100.0, 100.0]]),
            scan_at(100, vec![[100.0, 140.0]]),
        ]);
        let mut cfg = config(0);
        cfg.smoothing_weight = 0.25;
        let segments = segment_people(&recording, &cfg);

        assert_eq!(segments[0].running_avg_position, 110.0);
    }

    #[test]
    fn test_horizontal_axis_and_start_location() {
        let recording = Recording::new(vec![
            scan_at(0, vec![]),
            scan_at(100, vec![]),
            scan_at(200, vec![[50.0, 390.0], [70.0, 10.0]]),
        ]);
        let mut cfg = config(0);
        cfg.height_axis = Axis::X;
        let segments = segment_people(&recording, &cfg);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].running_avg_position, 60.0);
        assert!((segments[0].start_location - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_scan_range_limits_segmentation() {
        let recording = Recording::new(
            (0..6)
                .map(|i| scan_at(i * 100, vec![[200.0, 200.0]]))
                .collect(),
        );
        let mut cfg = config(0);
        cfg.start_scan = 2;
        cfg.end_scan = 4;
        let segments = segment_people(&recording, &cfg);

        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].scan_start, segments[0].scan_length), (2, 2));
    }

    #[test]
    fn test_segments_sorted_and_bounded() {
        let pattern = [1, 1, 0, 1, 0, 0, 1, 1, 1, 0];
        let recording = Recording::new(
            pattern
                .iter()
                .enumerate()
                .map(|(i, &on)| {
                    let x = if on == 1 { 200.0 } else { 900.0 };
                    scan_at(i as u64 * 100, vec![[x, 200.0]])
                })
                .collect(),
        );
        let segments = segment_people(&recording, &config(0));

        assert_eq!(segments.len(), 3);
        let total: usize = segments.iter().map(|s| s.scan_length).sum();
        assert!(total <= recording.len());
        for pair in segments.windows(2) {
            assert!(pair[0].scan_end() <= pair[1].scan_start);
        }
    }

    #[test]
    fn test_tracker_state_is_local() {
        let cfg = config(0);
        let mut tracker = PersonTracker::new(&cfg);
        let stats = ScanStats {
            n_in_bounds: 1,
            sum_of_positions: 200.0,
        };
        assert!(tracker.observe(4, stats).is_none());
        assert_eq!(tracker.running().map(|p| p.scan_start), Some(4));

        let done = tracker.observe(5, ScanStats::default()).unwrap();
        assert_eq!(done.scan_length, 1);
        assert!(tracker.running().is_none());
        assert!(tracker.finish().is_none());
    }
}
