//! PP-based roll-angle candidates.
//!
//! The theoretical primary field at a station is rotated into the hole
//! frame and compared with the measured PP (on-time channels during the
//! ramp). For induction surveys a cleaned PP is also derived by removing
//! the off-time response one ramp length later.

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use super::candidates::pp_roll;
use super::groups::StationGroup;
use super::rotate::{rotate_xy, stack_weighted_mean};
use crate::error::{Error, Result};
use crate::field::PrimaryFieldModel;
use crate::geometry::{project, ProjectedTrace};
use crate::survey::{ChannelTime, Survey, SurveyKind};

use super::SurveyGeometry;

/// Tolerance (µs) when testing channel windows against the ramp.
const TIMING_EPS_US: f64 = 1e-6;

/// Per-group values behind the PP candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpDiagnostics {
    pub station: String,
    pub tool_id: String,
    /// Theoretical field in the hole frame (X, Y, Z).
    pub theory: [f64; 3],
    /// Measured PP (X, Y) in the raw sensor frame.
    pub measured: [f64; 2],
    /// Cleaned PP (X, Y); induction surveys only.
    pub cleaned: Option<[f64; 2]>,
    /// Attitude (azimuth, dip) used for the hole frame.
    pub attitude: [f64; 2],
}

/// Everything PP computation needs, built once per preparation.
pub(super) struct PpContext<'a> {
    geometry: &'a SurveyGeometry,
    field: &'a dyn PrimaryFieldModel,
    trace: ProjectedTrace,
    pp_channels: Vec<usize>,
    clean_channels: Vec<usize>,
    /// Converts the model's nT into survey units.
    scale: f64,
    current_a: f64,
    fluxgate: bool,
    /// Sorted station depths, used to find the next station down-hole.
    station_depths: Vec<f64>,
}

impl<'a> PpContext<'a> {
    /// Build the context, or explain which input is missing.
    pub(super) fn build(
        survey: &Survey,
        geometry: &'a SurveyGeometry,
        field: &'a dyn PrimaryFieldModel,
        groups: &[StationGroup],
    ) -> Result<Self> {
        if let Some(missing) = geometry.missing_parts() {
            return Err(Error::MissingGeometry(missing));
        }
        if survey.ramp_us <= 0.0 {
            return Err(Error::MissingGeometry(
                "ramp time must be positive for PP de-rotation".into(),
            ));
        }
        let pp_channels = pp_channel_indices(&survey.channel_times, survey.ramp_us);
        if pp_channels.is_empty() {
            return Err(Error::MissingGeometry(
                "no channel lies inside the ramp; PP cannot be measured".into(),
            ));
        }
        let fluxgate = survey.kind == SurveyKind::Fluxgate;
        let clean_channels = if fluxgate {
            Vec::new()
        } else {
            cleaning_channel_indices(&survey.channel_times, &pp_channels, survey.ramp_us)
        };

        let trace = project(geometry.collar.as_ref(), &geometry.segments, None)?
            .ok_or_else(|| Error::MissingGeometry("borehole trace is empty".into()))?;

        let scale = match survey.kind {
            SurveyKind::Fluxgate => 1e3,
            SurveyKind::Induction => 1.0 / (survey.ramp_us * 1e-6),
        };

        let mut station_depths: Vec<f64> = groups.iter().filter_map(|g| g.depth).collect();
        station_depths.sort_by(|a, b| a.total_cmp(b));
        station_depths.dedup();

        Ok(Self {
            geometry,
            field,
            trace,
            pp_channels,
            clean_channels,
            scale,
            current_a: survey.current_a,
            fluxgate,
            station_depths,
        })
    }

    fn next_depth(&self, depth: f64) -> f64 {
        let idx = self.station_depths.partition_point(|&d| d <= depth);
        self.station_depths.get(idx).copied().unwrap_or(depth)
    }

    /// Compute the PP candidates of one group and store them on its tool.
    ///
    /// Returns `None` when the group has no usable depth, PP or field.
    pub(super) fn fill_group(
        &self,
        survey: &mut Survey,
        group: &StationGroup,
    ) -> Result<Option<PpDiagnostics>> {
        let Some(depth) = group.depth else {
            tracing::debug!("Station {}: label is not a depth, no PP candidate", group.station);
            return Ok(None);
        };
        let Some(position) = self.trace.point_at_depth(depth) else {
            return Ok(None);
        };
        let Some((azimuth, dip)) = self.geometry.segments.attitude_at(self.next_depth(depth))
        else {
            return Ok(None);
        };

        let world = self
            .field
            .field_at(&self.geometry.tx_loop, position, self.current_a)
            * self.scale;
        let local = hole_frame(azimuth, dip) * world;
        if !local.iter().all(|v| v.is_finite()) || local.xy().norm() <= 0.0 {
            tracing::debug!("Station {}: degenerate theoretical field", group.station);
            return Ok(None);
        }

        let Some(mut measured) = self.window_sum(survey, group, &self.pp_channels) else {
            return Ok(None);
        };
        let mut cleaned = if self.fluxgate || self.clean_channels.is_empty() {
            None
        } else {
            self.window_sum(survey, group, &self.clean_channels)
                .map(|c| [measured[0] - c[0], measured[1] - c[1]])
        };

        let tool = survey.tool_mut(group.tool)?;
        // candidates are referenced to the raw sensor frame
        if let (true, Some(angle)) = (tool.derotated, tool.angle_used) {
            measured = unrotate(measured, angle);
            cleaned = cleaned.map(|c| unrotate(c, angle));
        }

        let theory_xy = [local.x, local.y];
        tool.measured_pp_roll_angle = Some(pp_roll(theory_xy, measured));
        tool.cleaned_pp_roll_angle = cleaned.map(|c| pp_roll(theory_xy, c));
        tool.pp_dip = Some(-dip);

        Ok(Some(PpDiagnostics {
            station: group.station.clone(),
            tool_id: group.tool_id.clone(),
            theory: [local.x, local.y, local.z],
            measured,
            cleaned,
            attitude: [azimuth, dip],
        }))
    }

    /// Stack-weighted (X, Y) sum over the given channels.
    fn window_sum(
        &self,
        survey: &Survey,
        group: &StationGroup,
        channels: &[usize],
    ) -> Option<[f64; 2]> {
        let sum = |idx: &[usize]| -> Option<f64> {
            let mean = stack_weighted_mean(&survey.readings, idx);
            let mut total = 0.0;
            for &ch in channels {
                total += mean.get(ch)?;
            }
            Some(total)
        };
        Some([sum(&group.x)?, sum(&group.y)?])
    }
}

fn unrotate(v: [f64; 2], angle_deg: f64) -> [f64; 2] {
    let (x, y) = rotate_xy(v[0], v[1], -angle_deg);
    [x, y]
}

/// Channels fully inside the ramp window `[-ramp, 0]`.
pub fn pp_channel_indices(channels: &[ChannelTime], ramp_us: f64) -> Vec<usize> {
    channels
        .iter()
        .enumerate()
        .filter(|(_, c)| c.start_us >= -ramp_us - TIMING_EPS_US && c.end_us <= TIMING_EPS_US)
        .map(|(i, _)| i)
        .collect()
}

/// For each PP channel, the channel containing its centre time shifted by
/// one ramp length. PP channels themselves are never selected.
pub fn cleaning_channel_indices(channels: &[ChannelTime], pp: &[usize], ramp_us: f64) -> Vec<usize> {
    pp.iter()
        .filter_map(|&i| {
            let t = channels[i].centre_us() + ramp_us;
            channels
                .iter()
                .enumerate()
                .find(|(j, c)| !pp.contains(j) && c.contains(t))
                .map(|(j, _)| j)
        })
        .collect()
}

/// Rotation from world (east, north, up) into the hole frame.
///
/// Z points down-hole, Y is horizontal to the right of the hole direction
/// and X = Y × Z points toward the top of the hole.
pub fn hole_frame(azimuth_deg: f64, dip_deg: f64) -> Rotation3<f64> {
    let (sa, ca) = azimuth_deg.to_radians().sin_cos();
    let (sd, cd) = dip_deg.to_radians().sin_cos();
    let z = Vector3::new(cd * sa, cd * ca, -sd);
    let y = Vector3::new(ca, -sa, 0.0);
    let x = y.cross(&z);
    Rotation3::from_matrix_unchecked(Matrix3::from_rows(&[
        x.transpose(),
        y.transpose(),
        z.transpose(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ch(start_us: f64, end_us: f64) -> ChannelTime {
        ChannelTime { start_us, end_us }
    }

    #[test]
    fn pp_window_is_inside_the_ramp() {
        let channels = [
            ch(-1500.0, -1000.0),
            ch(-1000.0, 0.0),
            ch(0.0, 100.0),
            ch(100.0, 500.0),
            ch(500.0, 1500.0),
        ];
        assert_eq!(pp_channel_indices(&channels, 1500.0), vec![0, 1]);
        assert_eq!(pp_channel_indices(&channels, 500.0), Vec::<usize>::new());
    }

    #[test]
    fn cleaning_channels_sit_one_ramp_later() {
        let channels = [
            ch(-1000.0, 0.0),
            ch(0.0, 200.0),
            ch(200.0, 800.0),
            ch(800.0, 2000.0),
        ];
        let pp = pp_channel_indices(&channels, 1000.0);
        assert_eq!(pp, vec![0]);
        // centre -500 µs + 1000 µs ramp = 500 µs
        assert_eq!(cleaning_channel_indices(&channels, &pp, 1000.0), vec![2]);
    }

    #[test]
    fn hole_frame_is_a_proper_rotation() {
        for (az, dip) in [(0.0, 90.0), (37.0, 61.0), (290.0, 15.0)] {
            let r = hole_frame(az, dip);
            let m = r.matrix();
            assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!((m * m.transpose() - Matrix3::identity()).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn vertical_hole_frame_axes() {
        let r = hole_frame(0.0, 90.0);
        let up = r * Vector3::new(0.0, 0.0, 1.0);
        assert_abs_diff_eq!(up.z, -1.0, epsilon = 1e-12);
        let east = r * Vector3::new(1.0, 0.0, 0.0);
        assert_abs_diff_eq!(east.y, 1.0, epsilon = 1e-12);
        let north = r * Vector3::new(0.0, 1.0, 0.0);
        assert_abs_diff_eq!(north.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn inclined_hole_down_axis_follows_azimuth() {
        let r = hole_frame(90.0, 45.0);
        let along = Vector3::new(45f64.to_radians().cos(), 0.0, -45f64.to_radians().sin());
        let local = r * along;
        assert_abs_diff_eq!(local.z, 1.0, epsilon = 1e-12);
    }
}
