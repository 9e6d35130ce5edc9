//! Coordinate transformations shared by the projectors.
//!
//! Angles are in degrees unless a name says otherwise. Rotations follow the
//! right-hand rule about the named axis.

/// Convert polar readings `(range, theta_rad)` to Cartesian `[x, y]`.
///
/// # Example
///
/// ```
/// use urg_pipeline::core::transforms::polar_to_cartesian;
///
/// let points = polar_to_cartesian(&[(100.0, 0.0)]);
/// assert_eq!(points[0], [100.0, 0.0]);
/// ```
pub fn polar_to_cartesian(readings: &[(f32, f32)]) -> Vec<[f32; 2]> {
    readings
        .iter()
        .map(|&(r, theta)| [r * theta.cos(), r * theta.sin()])
        .collect()
}

/// Rotate a point about the z axis.
#[inline]
pub fn rotate_z(point: [f32; 3], angle_deg: f32) -> [f32; 3] {
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
    [
        point[0] * cos_a - point[1] * sin_a,
        point[0] * sin_a + point[1] * cos_a,
        point[2],
    ]
}

/// Rotate a point about the y axis.
#[inline]
pub fn rotate_y(point: [f32; 3], angle_deg: f32) -> [f32; 3] {
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
    [
        point[0] * cos_a + point[2] * sin_a,
        point[1],
        -point[0] * sin_a + point[2] * cos_a,
    ]
}

/// True when a reading lies closer to the sensor than the cull distance.
///
/// A cull distance of 0 disables culling; the sign is ignored.
#[inline]
pub fn is_culled(x: f32, y: f32, cull_distance: f32) -> bool {
    if cull_distance == 0.0 {
        return false;
    }
    x.hypot(y) < cull_distance.abs()
}

/// How scans are spread along the synthetic z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackSpacing {
    /// z grows with capture time: `(t - t0) * z_scale`, t in seconds.
    TimeDependent { z_scale: f32, t0_ms: u64 },
    /// z assumes a nominal 10 scans/sec: `(ordinal / 10) * z_scale`.
    Uniform { z_scale: f32 },
}

impl StackSpacing {
    pub fn new(time_dependent: bool, z_scale: f32, t0_ms: u64) -> Self {
        if time_dependent {
            StackSpacing::TimeDependent { z_scale, t0_ms }
        } else {
            StackSpacing::Uniform { z_scale }
        }
    }

    /// Depth of a scan given its timestamp and its position within the range.
    ///
    /// Elapsed time is taken in whole milliseconds before conversion, so
    /// epoch-sized timestamps keep their resolution.
    #[inline]
    pub fn z(&self, timestamp_ms: u64, ordinal: usize) -> f32 {
        match *self {
            StackSpacing::TimeDependent { z_scale, t0_ms } => {
                let elapsed_s = timestamp_ms.saturating_sub(t0_ms) as f64 / 1000.0;
                (elapsed_s * z_scale as f64) as f32
            }
            StackSpacing::Uniform { z_scale } => ordinal as f32 / 10.0 * z_scale,
        }
    }
}
