//! Straight-segment projection of a segment table from the collar.

use super::{Collar, ProjectedTrace, Segment, SegmentTable, TracePoint};
use crate::angles::{normalize_degrees, smooth_sequence};
use crate::error::{Error, Result};

/// Projects `segments` from `collar` into a 3D polyline.
///
/// With `num_segments`, the table is first resampled onto a uniform depth
/// grid (see [`resample`]). Returns `Ok(None)` when there is no collar or no
/// segment yet; that is a valid "no geometry" state.
pub fn project(
    collar: Option<&Collar>,
    segments: &SegmentTable,
    num_segments: Option<usize>,
) -> Result<Option<ProjectedTrace>> {
    let collar = match collar {
        Some(c) if !segments.is_empty() => c,
        _ => return Ok(None),
    };
    segments.validate()?;

    let resampled;
    let table = match num_segments {
        Some(n) => {
            resampled = resample(segments, n)?;
            &resampled
        }
        None => segments,
    };

    let mut points = Vec::with_capacity(table.len() + 1);
    let mut cur = TracePoint {
        easting: collar.easting,
        northing: collar.northing,
        elevation: collar.elevation,
        relative_depth: 0.0,
    };
    points.push(cur);

    for s in &table.segments {
        let az = s.azimuth.to_radians();
        let dip = s.dip.to_radians();
        let dz = s.length * dip.sin();
        let horizontal = s.length * dip.cos();
        cur.easting += horizontal * az.sin();
        cur.northing += horizontal * az.cos();
        cur.elevation -= dz;
        cur.relative_depth += s.length;
        points.push(cur);
    }

    tracing::debug!(
        "Projected {} segments to {} trace points",
        table.len(),
        points.len()
    );

    Ok(Some(ProjectedTrace {
        points,
        units: table.units,
    }))
}

/// Resamples a segment table onto `num_segments` uniformly spaced depths
/// spanning the first and last segment depths.
///
/// Azimuth and dip are linearly interpolated. Azimuths are made continuous
/// across north before interpolating and normalized into [0, 360) after, so
/// 350° to 10° passes through 0°, not 180°. The first resampled segment
/// keeps the original first length; the rest use the grid spacing.
pub fn resample(segments: &SegmentTable, num_segments: usize) -> Result<SegmentTable> {
    if num_segments == 0 {
        return Err(Error::InvalidInput(
            "number of resampled segments must be at least 1".into(),
        ));
    }
    let (first, last) = match (segments.segments.first(), segments.segments.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(Error::InvalidInput(
                "cannot resample an empty segment table".into(),
            ))
        }
    };

    let depths = segments.depths();
    let raw: Vec<f64> = segments.segments.iter().map(|s| s.azimuth).collect();
    let azimuths = smooth_sequence(&raw)?;
    let dips: Vec<f64> = segments.segments.iter().map(|s| s.dip).collect();

    let step = if num_segments > 1 {
        (last.depth - first.depth) / (num_segments - 1) as f64
    } else {
        0.0
    };

    let mut out: Vec<Segment> = Vec::with_capacity(num_segments);
    for i in 0..num_segments {
        let depth = if i + 1 == num_segments {
            last.depth
        } else {
            first.depth + step * i as f64
        };
        let length = match out.last() {
            None => first.length,
            Some(prev) => depth - prev.depth,
        };
        out.push(Segment {
            azimuth: normalize_degrees(interp(depth, &depths, &azimuths)),
            dip: interp(depth, &depths, &dips),
            length,
            depth,
        });
    }

    Ok(SegmentTable {
        segments: out,
        units: segments.units,
    })
}

/// Piecewise-linear interpolation with clamping outside `xs`.
/// `xs` must be increasing.
fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    if n == 1 || x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LengthUnit;
    use approx::assert_abs_diff_eq;

    fn single(azimuth: f64, dip: f64, length: f64) -> SegmentTable {
        SegmentTable::from_depths(&[length], &[azimuth], &[dip], LengthUnit::Metres)
            .expect("table")
    }

    #[test]
    fn straight_down_hole() {
        let collar = Collar::new(0.0, 0.0, 0.0);
        let trace = project(Some(&collar), &single(0.0, 90.0, 100.0), None)
            .expect("project")
            .expect("trace");
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.points[0].relative_depth, 0.0);
        let p = trace.points[1];
        assert_abs_diff_eq!(p.easting, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.northing, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.elevation, -100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.relative_depth, 100.0, epsilon = 1e-12);
    }

    #[test]
    fn first_point_is_collar() {
        let collar = Collar::new(500.0, 7000.0, 320.0);
        let trace = project(Some(&collar), &single(45.0, 60.0, 10.0), None)
            .expect("project")
            .expect("trace");
        let p0 = trace.points[0];
        assert_eq!((p0.easting, p0.northing, p0.elevation), (500.0, 7000.0, 320.0));
    }

    #[test]
    fn inclined_hole_moves_along_azimuth() {
        let collar = Collar::new(0.0, 0.0, 0.0);
        let trace = project(Some(&collar), &single(90.0, 30.0, 100.0), None)
            .expect("project")
            .expect("trace");
        let p = trace.points[1];
        assert_abs_diff_eq!(p.easting, 100.0 * 30f64.to_radians().cos(), epsilon = 1e-9);
        assert_abs_diff_eq!(p.northing, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.elevation, -50.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_inputs_give_no_trace() {
        let collar = Collar::new(0.0, 0.0, 0.0);
        assert!(project(Some(&collar), &SegmentTable::default(), None)
            .expect("empty segments")
            .is_none());
        assert!(project(None, &single(0.0, 90.0, 10.0), None)
            .expect("no collar")
            .is_none());
    }

    #[test]
    fn resample_builds_uniform_grid() {
        let table = SegmentTable::from_depths(
            &[10.0, 50.0, 110.0],
            &[0.0, 40.0, 100.0],
            &[80.0, 70.0, 60.0],
            LengthUnit::Feet,
        )
        .expect("table");
        let r = resample(&table, 5).expect("resample");
        assert_eq!(r.units, LengthUnit::Feet);
        assert_eq!(r.depths(), vec![10.0, 35.0, 60.0, 85.0, 110.0]);
        assert_eq!(r.segments[0].length, 10.0);
        assert_abs_diff_eq!(r.segments[1].length, 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.segments[1].azimuth, 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.segments[2].azimuth, 50.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.segments[2].dip, 68.333333333333, epsilon = 1e-9);
        assert_abs_diff_eq!(r.segments[4].dip, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn resample_interpolates_azimuth_across_north() {
        let table = SegmentTable::from_depths(
            &[10.0, 30.0],
            &[350.0, 10.0],
            &[60.0, 60.0],
            LengthUnit::Metres,
        )
        .expect("table");
        let r = resample(&table, 5).expect("resample");
        let az: Vec<f64> = r.segments.iter().map(|s| s.azimuth).collect();
        for (got, want) in az.iter().zip([350.0, 355.0, 0.0, 5.0, 10.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn resample_to_zero_is_invalid() {
        let err = resample(&single(0.0, 90.0, 10.0), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn resampled_projection_reaches_same_depth() {
        let table = SegmentTable::from_depths(
            &[5.0, 25.0, 60.0],
            &[10.0, 12.0, 15.0],
            &[70.0, 70.0, 70.0],
            LengthUnit::Metres,
        )
        .expect("table");
        let collar = Collar::new(0.0, 0.0, 0.0);
        let trace = project(Some(&collar), &table, Some(12))
            .expect("project")
            .expect("trace");
        assert_eq!(trace.len(), 13);
        let end = trace.points.last().expect("end").relative_depth;
        assert_abs_diff_eq!(end, 60.0, epsilon = 1e-9);
    }
}
