//! Borehole geometry: collar, segment table and projected 3D trace.
//!
//! Angles are degrees at every interface. Azimuth is clockwise from north,
//! dip is positive downward; the projector never re-flips the dip sign a
//! segment table already encodes.

mod projection;

pub use projection::{project, resample};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length unit carried by a segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Metres,
    Feet,
}

/// Surface position of the borehole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collar {
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl Collar {
    pub fn new(easting: f64, northing: f64, elevation: f64) -> Self {
        Self {
            easting,
            northing,
            elevation,
            crs: None,
        }
    }

    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.easting, self.northing, self.elevation)
    }
}

/// One borehole interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub azimuth: f64,
    pub dip: f64,
    pub length: f64,
    /// Cumulative depth at the bottom of the interval.
    pub depth: f64,
}

/// Ordered borehole segments.
///
/// Depth is strictly increasing and `length[i] = depth[i] - depth[i - 1]`;
/// the first segment's length runs from the collar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentTable {
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub units: LengthUnit,
}

impl SegmentTable {
    /// Build a table, checking the depth ordering.
    pub fn new(segments: Vec<Segment>, units: LengthUnit) -> Result<Self> {
        let table = Self { segments, units };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from per-segment attitude and bottom depth, deriving
    /// the segment lengths.
    pub fn from_depths(
        depths: &[f64],
        azimuths: &[f64],
        dips: &[f64],
        units: LengthUnit,
    ) -> Result<Self> {
        if depths.len() != azimuths.len() || depths.len() != dips.len() {
            return Err(Error::InvalidInput(format!(
                "segment columns differ in length ({} depths, {} azimuths, {} dips)",
                depths.len(),
                azimuths.len(),
                dips.len()
            )));
        }
        let segments = depths
            .iter()
            .enumerate()
            .map(|(i, &depth)| Segment {
                azimuth: azimuths[i],
                dip: dips[i],
                length: if i == 0 { depth } else { depth - depths[i - 1] },
                depth,
            })
            .collect();
        Self::new(segments, units)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Checks that all values are finite and depth strictly increases.
    pub fn validate(&self) -> Result<()> {
        for (i, s) in self.segments.iter().enumerate() {
            if ![s.azimuth, s.dip, s.length, s.depth]
                .iter()
                .all(|v| v.is_finite())
            {
                return Err(Error::InvalidInput(format!(
                    "segment {} contains a non-finite value",
                    i
                )));
            }
            if i > 0 && s.depth <= self.segments[i - 1].depth {
                return Err(Error::InvalidInput(format!(
                    "segment depth must strictly increase (segment {}: {} after {})",
                    i,
                    s.depth,
                    self.segments[i - 1].depth
                )));
            }
        }
        Ok(())
    }

    /// Azimuth and dip of the interval containing `depth`.
    ///
    /// Segment `i` covers `(depth[i - 1], depth[i]]`. Depths past the last
    /// segment use the last segment.
    pub fn attitude_at(&self, depth: f64) -> Option<(f64, f64)> {
        let last = self.segments.last()?;
        let idx = self.segments.partition_point(|s| s.depth < depth);
        let s = self.segments.get(idx).unwrap_or(last);
        Some((s.azimuth, s.dip))
    }

    pub fn depths(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.depth).collect()
    }
}

/// One vertex of a projected borehole trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
    pub relative_depth: f64,
}

impl TracePoint {
    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.easting, self.northing, self.elevation)
    }
}

/// 3D polyline derived from a collar and segment table.
///
/// Always regenerable from its inputs; never a source of truth.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectedTrace {
    pub points: Vec<TracePoint>,
    pub units: LengthUnit,
}

impl ProjectedTrace {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position at a relative depth along the hole.
    ///
    /// Interpolates linearly between vertices, clamps above the collar and
    /// extrapolates along the last leg below the final vertex.
    pub fn point_at_depth(&self, depth: f64) -> Option<Point3<f64>> {
        let first = self.points.first()?;
        if self.points.len() == 1 || depth <= first.relative_depth {
            return Some(first.position());
        }

        let idx = self.points.partition_point(|p| p.relative_depth < depth);
        let (a, b) = if idx >= self.points.len() {
            let n = self.points.len();
            (&self.points[n - 2], &self.points[n - 1])
        } else {
            (&self.points[idx - 1], &self.points[idx])
        };

        let span = b.relative_depth - a.relative_depth;
        if span.abs() < 1e-12 {
            return Some(b.position());
        }
        let t = (depth - a.relative_depth) / span;
        let pa = a.position();
        let pb = b.position();
        Some(pa + (pb - pa) * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn table() -> SegmentTable {
        SegmentTable::from_depths(
            &[10.0, 20.0, 30.0],
            &[0.0, 10.0, 20.0],
            &[60.0, 62.0, 64.0],
            LengthUnit::Metres,
        )
        .expect("table")
    }

    #[test]
    fn from_depths_derives_lengths() {
        let t = table();
        let lengths: Vec<f64> = t.segments.iter().map(|s| s.length).collect();
        assert_eq!(lengths, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn non_increasing_depth_is_rejected() {
        let err = SegmentTable::from_depths(
            &[10.0, 10.0],
            &[0.0, 0.0],
            &[90.0, 90.0],
            LengthUnit::Metres,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn attitude_lookup_uses_covering_segment() {
        let t = table();
        assert_eq!(t.attitude_at(0.0), Some((0.0, 60.0)));
        assert_eq!(t.attitude_at(10.0), Some((0.0, 60.0)));
        assert_eq!(t.attitude_at(10.5), Some((10.0, 62.0)));
        assert_eq!(t.attitude_at(99.0), Some((20.0, 64.0)));
        assert_eq!(SegmentTable::default().attitude_at(5.0), None);
    }

    #[test]
    fn point_at_depth_interpolates_and_extrapolates() {
        let trace = ProjectedTrace {
            points: vec![
                TracePoint {
                    easting: 0.0,
                    northing: 0.0,
                    elevation: 0.0,
                    relative_depth: 0.0,
                },
                TracePoint {
                    easting: 0.0,
                    northing: 0.0,
                    elevation: -100.0,
                    relative_depth: 100.0,
                },
            ],
            units: LengthUnit::Metres,
        };
        let mid = trace.point_at_depth(25.0).expect("mid");
        assert_abs_diff_eq!(mid.z, -25.0, epsilon = 1e-12);
        let below = trace.point_at_depth(150.0).expect("below");
        assert_abs_diff_eq!(below.z, -150.0, epsilon = 1e-12);
        let above = trace.point_at_depth(-5.0).expect("above");
        assert_abs_diff_eq!(above.z, 0.0, epsilon = 1e-12);
        assert!(ProjectedTrace::default().point_at_depth(1.0).is_none());
    }
}
