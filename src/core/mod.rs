//! Core data types and I/O operations.

pub mod loaders;
pub mod recorder;
pub mod transforms;
pub mod writers;

pub use loaders::{load_recording, parse_recording, PointCloud, PointColor, Recording, Scan};
pub use recorder::ScanRecorder;
pub use writers::{write_ply, write_segments_csv, WriteError};
