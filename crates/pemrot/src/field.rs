//! Theoretical primary field of the transmitter loop.
//!
//! The de-rotation engine only needs the field vector at a point; any model
//! can be plugged in through [`PrimaryFieldModel`]. [`WireLoopField`] is the
//! built-in finite-segment Biot–Savart model.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// μ0 / 4π expressed so that the result is in nT for metres and amperes.
const MU0_OVER_4PI_NT: f64 = 100.0;

/// Transmitter loop vertices (easting, northing, elevation). The loop is
/// closed implicitly from the last vertex back to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransmitterLoop {
    pub vertices: Vec<Point3<f64>>,
}

impl TransmitterLoop {
    pub fn new(vertices: Vec<Point3<f64>>) -> Self {
        Self { vertices }
    }

    /// A loop needs at least three vertices to enclose an area.
    pub fn is_complete(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Closed wire segments in vertex order.
    pub fn wires(&self) -> impl Iterator<Item = (Point3<f64>, Point3<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// Source of the theoretical primary field at a point.
///
/// Implementations return the static field in nT for a loop current in
/// amperes; the engine rescales it for the survey kind.
///
/// # Example
///
/// ```
/// use nalgebra::{Point3, Vector3};
/// use pemrot::{PrimaryFieldModel, TransmitterLoop};
///
/// struct Uniform;
///
/// impl PrimaryFieldModel for Uniform {
///     fn field_at(&self, _lp: &TransmitterLoop, _p: Point3<f64>, current: f64) -> Vector3<f64> {
///         Vector3::new(0.0, 0.0, current)
///     }
/// }
/// ```
pub trait PrimaryFieldModel {
    fn field_at(&self, tx_loop: &TransmitterLoop, point: Point3<f64>, current_a: f64)
        -> Vector3<f64>;
}

/// Biot–Savart sum over the straight wires of the loop.
#[derive(Debug, Clone, Copy)]
pub struct WireLoopField {
    /// Wires closer than this to the point (in metres) are skipped.
    pub min_distance: f64,
}

impl Default for WireLoopField {
    fn default() -> Self {
        Self { min_distance: 1e-6 }
    }
}

impl PrimaryFieldModel for WireLoopField {
    fn field_at(
        &self,
        tx_loop: &TransmitterLoop,
        point: Point3<f64>,
        current_a: f64,
    ) -> Vector3<f64> {
        let mut total = Vector3::zeros();
        for (a, b) in tx_loop.wires() {
            if let Some(f) = wire_field(a, b, point, self.min_distance) {
                total += f;
            }
        }
        total * (MU0_OVER_4PI_NT * current_a)
    }
}

/// Field of a unit current from `a` to `b` at `p`, without the μ0 I / 4π
/// factor.
fn wire_field(a: Point3<f64>, b: Point3<f64>, p: Point3<f64>, min_distance: f64) -> Option<Vector3<f64>> {
    let ra = a - p;
    let rb = b - p;
    let na = ra.norm();
    let nb = rb.norm();
    let cross = ra.cross(&rb);
    let denom = na * nb * (na * nb + ra.dot(&rb));
    if na < min_distance || nb < min_distance || cross.norm() < min_distance * min_distance {
        return None;
    }
    if !denom.is_finite() || denom.abs() < 1e-300 {
        return None;
    }
    Some(cross * ((na + nb) / denom))
}
