//! Collapse a dense depth/azimuth/dip (DAD) curve into borehole segments.
//!
//! The walk accumulates absolute depth, azimuth and dip change since the last
//! emitted point and emits a new segment whenever one accumulator reaches its
//! threshold. The first and last curve points are always emitted.

use serde::{Deserialize, Serialize};

use crate::angles::{normalize_degrees, smooth_sequence};
use crate::config::SegmentBuilderConfig;
use crate::error::{Error, Result};
use crate::geometry::{LengthUnit, SegmentTable};

/// Dense depth/azimuth/dip samples, e.g. from an imported DAD file or an
/// edited spline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DenseCurve {
    pub depth: Vec<f64>,
    pub azimuth: Vec<f64>,
    pub dip: Vec<f64>,
}

impl DenseCurve {
    /// Parse whitespace- or comma-separated `depth azimuth dip` rows.
    ///
    /// Blank lines and `#` comments are skipped; the first content line may
    /// be a column header.
    pub fn from_dad_str(text: &str) -> Result<Self> {
        let mut curve = DenseCurve::default();
        let mut seen_content = false;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .collect();
            let parsed: Option<Vec<f64>> = cols.iter().map(|t| t.parse::<f64>().ok()).collect();
            match parsed {
                Some(v) if v.len() >= 3 => {
                    curve.depth.push(v[0]);
                    curve.azimuth.push(v[1]);
                    curve.dip.push(v[2]);
                }
                None if !seen_content => {}
                _ => {
                    return Err(Error::Parse(format!(
                        "DAD line {}: expected 'depth azimuth dip', got '{}'",
                        lineno + 1,
                        line
                    )))
                }
            }
            seen_content = true;
        }
        Ok(curve)
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }
}

/// Builds minimal segment tables from dense curves.
#[derive(Debug, Clone, Default)]
pub struct SegmentBuilder {
    config: SegmentBuilderConfig,
}

impl SegmentBuilder {
    pub fn new(config: SegmentBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentBuilderConfig {
        &self.config
    }

    pub fn from_curve(&self, curve: &DenseCurve, units: LengthUnit) -> Result<SegmentTable> {
        self.from_dense_curve(&curve.depth, &curve.azimuth, &curve.dip, units)
    }

    /// Collapse the curve into segments.
    ///
    /// Azimuths are smoothed across north before accumulating, and written
    /// back normalized into [0, 360). Depth, azimuth and dip are rounded to
    /// the configured number of decimals; lengths are derived from the
    /// rounded depths, so the output always passes
    /// [`SegmentTable::validate`].
    pub fn from_dense_curve(
        &self,
        depth: &[f64],
        azimuth: &[f64],
        dip: &[f64],
        units: LengthUnit,
    ) -> Result<SegmentTable> {
        validate_curve(depth, azimuth, dip)?;
        let azimuth = smooth_sequence(azimuth)?;
        let cfg = &self.config;
        let n = depth.len();

        let mut picked = vec![0usize];
        let (mut acc_depth, mut acc_az, mut acc_dip) = (0.0f64, 0.0f64, 0.0f64);
        for i in 0..n - 1 {
            acc_depth += (depth[i + 1] - depth[i]).abs();
            acc_az += (azimuth[i + 1] - azimuth[i]).abs();
            acc_dip += (dip[i + 1] - dip[i]).abs();
            if acc_depth >= cfg.depth_threshold
                || acc_az >= cfg.azimuth_threshold_deg
                || acc_dip >= cfg.dip_threshold_deg
            {
                picked.push(i + 1);
                acc_depth = 0.0;
                acc_az = 0.0;
                acc_dip = 0.0;
            }
        }
        if picked.last() != Some(&(n - 1)) {
            picked.push(n - 1);
        }

        // Rounding can land two picks on one depth; the later pick is dropped,
        // except the final curve point, which replaces its predecessor.
        let round = |v: f64| round_to(v, cfg.decimals);
        let mut depths: Vec<f64> = Vec::with_capacity(picked.len());
        let mut azimuths: Vec<f64> = Vec::with_capacity(picked.len());
        let mut dips: Vec<f64> = Vec::with_capacity(picked.len());
        for &i in &picked {
            let d = round(depth[i]);
            let az = round(normalize_degrees(azimuth[i]));
            let az = if az >= 360.0 { 0.0 } else { az };
            let dp = round(dip[i]);
            match depths.last() {
                Some(&prev) if d <= prev => {
                    if i == n - 1 {
                        let k = depths.len() - 1;
                        depths[k] = d;
                        azimuths[k] = az;
                        dips[k] = dp;
                    }
                }
                _ => {
                    depths.push(d);
                    azimuths.push(az);
                    dips.push(dp);
                }
            }
        }
        let table = SegmentTable::from_depths(&depths, &azimuths, &dips, units)?;

        tracing::debug!(
            "Collapsed {} curve points into {} segments",
            n,
            table.len()
        );
        Ok(table)
    }
}

fn validate_curve(depth: &[f64], azimuth: &[f64], dip: &[f64]) -> Result<()> {
    if depth.is_empty() {
        return Err(Error::InvalidInput("dense curve is empty".into()));
    }
    if depth.len() != azimuth.len() || depth.len() != dip.len() {
        return Err(Error::InvalidInput(format!(
            "dense curve columns differ in length ({} depths, {} azimuths, {} dips)",
            depth.len(),
            azimuth.len(),
            dip.len()
        )));
    }
    if depth
        .iter()
        .chain(azimuth)
        .chain(dip)
        .any(|v| !v.is_finite())
    {
        return Err(Error::InvalidInput("dense curve contains non-finite values".into()));
    }
    if depth.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::InvalidInput(
            "dense curve depth must strictly increase".into(),
        ));
    }
    Ok(())
}

fn round_to(v: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (v * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn build(depth: &[f64], az: &[f64], dip: &[f64]) -> SegmentTable {
        SegmentBuilder::default()
            .from_dense_curve(depth, az, dip, LengthUnit::Metres)
            .expect("segments")
    }

    #[test]
    fn straight_hole_splits_on_depth() {
        let depth: Vec<f64> = (0..=50).map(|i| i as f64).collect();
        let az = vec![45.0; depth.len()];
        let dip = vec![70.0; depth.len()];
        let t = build(&depth, &az, &dip);
        assert_eq!(t.depths(), vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(t.segments[0].length, 0.0);
        assert!(t.segments[1..].iter().all(|s| s.length == 10.0));
    }

    #[test]
    fn azimuth_change_forces_a_segment() {
        let depth = [0.0, 1.0, 2.0, 3.0];
        let az = [10.0, 10.4, 11.1, 11.2];
        let dip = [60.0; 4];
        let t = build(&depth, &az, &dip);
        // accumulated azimuth reaches 1.1° at index 2
        assert_eq!(t.depths(), vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn endpoint_is_always_kept() {
        let depth = [5.0, 6.0, 7.25];
        let az = [0.0, 0.0, 0.0];
        let dip = [80.0, 80.0, 80.0];
        let t = build(&depth, &az, &dip);
        let last = t.segments.last().expect("last");
        assert_eq!(last.depth, 7.25);
        assert_eq!(t.segments[0].length, 5.0);
        assert_eq!(last.length, 2.25);
    }

    #[test]
    fn single_point_curve() {
        let t = build(&[12.0], &[90.0], &[45.0]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.segments[0].length, 12.0);
    }

    #[test]
    fn wraparound_does_not_split_every_sample() {
        let depth = [0.0, 1.0, 2.0, 3.0];
        let az = [359.8, 359.9, 0.0, 0.1];
        let dip = [60.0; 4];
        let t = build(&depth, &az, &dip);
        assert_eq!(t.depths(), vec![0.0, 3.0]);
        assert_eq!(t.segments[1].azimuth, 0.1);
    }

    #[test]
    fn output_is_rounded() {
        let t = build(&[1.23456, 40.0], &[10.0049, 10.0], &[60.987, 61.0]);
        assert_eq!(t.segments[0].depth, 1.23);
        assert_eq!(t.segments[0].azimuth, 10.0);
        assert_eq!(t.segments[0].dip, 60.99);
        assert_abs_diff_eq!(t.segments[1].length, 38.77, epsilon = 1e-12);
    }

    #[test]
    fn dip_change_forces_a_segment() {
        let depth = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let az = [30.0; 6];
        let dip = [60.0, 60.3, 60.6, 60.9, 61.2, 61.5];
        let t = build(&depth, &az, &dip);
        // accumulated dip reaches 1.2° at index 4
        assert_eq!(t.depths(), vec![0.0, 4.0, 5.0]);
        assert_eq!(t.segments[1].dip, 61.2);
    }

    #[test]
    fn picks_closer_than_the_rounding_step_collapse() {
        let t = build(&[0.0, 0.001, 0.002, 100.0], &[0.0, 5.0, 10.0, 10.0], &[60.0; 4]);
        t.validate().expect("strictly increasing depth");
        assert_eq!(t.depths(), vec![0.0, 100.0]);
        assert_eq!(t.segments[1].length, 100.0);

        // the final point wins over a colliding earlier pick
        let t = build(
            &[0.0, 1.0, 9.998, 10.001],
            &[0.0, 5.0, 5.0, 5.0],
            &[60.0, 60.0, 62.0, 62.5],
        );
        t.validate().expect("strictly increasing depth");
        assert_eq!(t.depths(), vec![0.0, 1.0, 10.0]);
        let last = t.segments.last().expect("last");
        assert_eq!(last.dip, 62.5);

        let collar = crate::geometry::Collar::new(0.0, 0.0, 0.0);
        assert!(crate::geometry::project(Some(&collar), &t, None)
            .expect("project")
            .is_some());
    }

    #[test]
    fn lengths_follow_the_rounded_depths() {
        let t = build(&[1.234, 12.236, 24.0], &[0.0; 3], &[60.0; 3]);
        assert_eq!(t.depths(), vec![1.23, 12.24, 24.0]);
        assert_abs_diff_eq!(t.segments[0].length, t.segments[0].depth, epsilon = 1e-12);
        for w in t.segments.windows(2) {
            assert_abs_diff_eq!(w[1].length, w[1].depth - w[0].depth, epsilon = 1e-12);
        }
    }

    #[test]
    fn invalid_curves_are_rejected() {
        let b = SegmentBuilder::default();
        assert!(matches!(
            b.from_dense_curve(&[], &[], &[], LengthUnit::Metres),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            b.from_dense_curve(&[1.0, 2.0], &[0.0], &[0.0, 0.0], LengthUnit::Metres),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            b.from_dense_curve(&[2.0, 1.0], &[0.0, 0.0], &[0.0, 0.0], LengthUnit::Metres),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn parses_dad_text() {
        let text = "Depth Azimuth Dip\n# surveyed\n0 10 60\n\n10.5, 11, 61 \n";
        let c = DenseCurve::from_dad_str(text).expect("dad");
        assert_eq!(c.depth, vec![0.0, 10.5]);
        assert_eq!(c.azimuth, vec![10.0, 11.0]);
        assert_eq!(c.dip, vec![60.0, 61.0]);
        assert!(matches!(
            DenseCurve::from_dad_str("0 1 2\nbad row here\n"),
            Err(Error::Parse(_))
        ));
    }
}
