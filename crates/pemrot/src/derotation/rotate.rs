//! Applying a roll angle to a group's X/Y readings.

use serde::{Deserialize, Serialize};

use super::candidates::candidate_angle;
use super::groups::{IneligibleGroup, IneligibleReason, StationGroup};
use super::{PreparedData, RotationMethod};
use crate::error::{Error, Result};
use crate::rad_tool::RotationType;
use crate::survey::{Reading, Survey, SurveyKind};

/// Prefix shared by all rotation provenance notes.
pub const ROTATION_NOTE_PREFIX: &str = "XY data ";

/// Outcome of one rotation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatedData {
    pub method: RotationMethod,
    pub soa: f64,
    /// Number of groups whose readings were rotated.
    pub rotated: usize,
    /// Groups rotated with the averaged pairing fallback.
    pub unequal_stacking: usize,
    /// Groups left untouched by this pass.
    pub skipped: Vec<IneligibleGroup>,
}

/// Rotates the (x, y) vector counter-clockwise by `angle_deg`.
#[inline]
pub fn rotate_xy(x: f64, y: f64, angle_deg: f64) -> (f64, f64) {
    let (s, c) = angle_deg.to_radians().sin_cos();
    (x * c - y * s, x * s + y * c)
}

/// Channel-wise stack-weighted mean of the given readings.
///
/// Falls back to a plain mean when no reading reports stacks.
pub(crate) fn stack_weighted_mean(readings: &[Reading], indices: &[usize]) -> Vec<f64> {
    let Some(&first) = indices.first() else {
        return Vec::new();
    };
    let n = readings[first].values.len();
    let total_stacks: f64 = indices.iter().map(|&i| readings[i].stacks as f64).sum();
    let mut out = vec![0.0; n];
    for &i in indices {
        let w = if total_stacks > 0.0 {
            readings[i].stacks as f64 / total_stacks
        } else {
            1.0 / indices.len() as f64
        };
        for (o, v) in out.iter_mut().zip(&readings[i].values) {
            *o += w * v;
        }
    }
    out
}

/// Rotate every X/Y reading of `group` by `angle_deg`.
///
/// With equal X and Y counts the readings are paired in order. Otherwise
/// each reading is paired with the stack-weighted mean of the other
/// component. Returns `true` when the fallback was used.
pub(super) fn rotate_group_readings(survey: &mut Survey, group: &StationGroup, angle_deg: f64) -> bool {
    let (s, c) = angle_deg.to_radians().sin_cos();
    let readings = &mut survey.readings;

    if group.has_equal_stacking() {
        for (&xi, &yi) in group.x.iter().zip(&group.y) {
            let mut xv = std::mem::take(&mut readings[xi].values);
            let mut yv = std::mem::take(&mut readings[yi].values);
            for (x, y) in xv.iter_mut().zip(yv.iter_mut()) {
                let (nx, ny) = (*x * c - *y * s, *x * s + *y * c);
                *x = nx;
                *y = ny;
            }
            readings[xi].values = xv;
            readings[yi].values = yv;
        }
        return false;
    }

    tracing::warn!(
        "Station {} tool {}: {} X vs {} Y readings, rotating against averaged partner",
        group.station,
        group.tool_id,
        group.x.len(),
        group.y.len()
    );
    let x_mean = stack_weighted_mean(readings, &group.x);
    let y_mean = stack_weighted_mean(readings, &group.y);
    for &xi in &group.x {
        for (x, y) in readings[xi].values.iter_mut().zip(&y_mean) {
            *x = *x * c - y * s;
        }
    }
    for &yi in &group.y {
        for (y, x) in readings[yi].values.iter_mut().zip(&x_mean) {
            *y = x * s + *y * c;
        }
    }
    true
}

/// Check the whole pass can run before anything is mutated.
fn check_preconditions(
    prepared: &PreparedData,
    survey: &Survey,
    method: RotationMethod,
) -> Result<()> {
    match method {
        RotationMethod::PpRaw | RotationMethod::PpCleaned if !prepared.pp_available => {
            return Err(Error::MissingGeometry(format!(
                "{} rotation needs loop, collar, segments and ramp timing",
                method.description()
            )));
        }
        RotationMethod::PpCleaned if survey.kind == SurveyKind::Fluxgate => {
            return Err(Error::InvalidInput(
                "cleaned PP is only defined for induction surveys".into(),
            ));
        }
        _ => {}
    }

    match method {
        RotationMethod::Unrotate => {
            let mut any_rotated = false;
            for g in &prepared.groups {
                let tool = survey.tool(g.tool)?;
                if !tool.derotated {
                    continue;
                }
                any_rotated = true;
                if !tool.has_raw_sensors() {
                    return Err(Error::InvalidState(format!(
                        "station {} tool {} is a processed D5 record and cannot be un-rotated",
                        g.station, g.tool_id
                    )));
                }
            }
            if !any_rotated {
                return Err(Error::InvalidState(
                    "no de-rotated group to un-rotate".into(),
                ));
            }
        }
        RotationMethod::Soa => {}
        _ => {
            for g in &prepared.groups {
                if survey.tool(g.tool)?.derotated {
                    return Err(Error::InvalidState(format!(
                        "station {} tool {} is already de-rotated; un-rotate first or apply a sensor offset",
                        g.station, g.tool_id
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Apply `method` to every prepared group.
pub(super) fn apply(
    prepared: &PreparedData,
    survey: &mut Survey,
    method: RotationMethod,
    soa: f64,
) -> Result<RotatedData> {
    check_preconditions(prepared, survey, method)?;

    let mut out = RotatedData {
        method,
        soa,
        rotated: 0,
        unequal_stacking: 0,
        skipped: Vec::new(),
    };

    for g in &prepared.groups {
        let tool = survey.tool_mut(g.tool)?;
        let applied = match method {
            RotationMethod::Unrotate => {
                let Some(previous) = tool.angle_used.filter(|_| tool.derotated) else {
                    continue;
                };
                tool.angle_used = None;
                tool.derotated = false;
                tool.rotation_type = RotationType::Unrotate;
                -previous
            }
            RotationMethod::Soa => {
                let previous = if tool.derotated { tool.angle_used } else { None };
                tool.angle_used = Some(previous.unwrap_or(0.0) + soa);
                if !tool.derotated {
                    tool.rotation_type = RotationType::Soa;
                    tool.derotated = true;
                }
                soa
            }
            _ => {
                let Some(candidate) = candidate_angle(tool, method) else {
                    out.skipped.push(IneligibleGroup {
                        station: g.station.clone(),
                        tool_id: g.tool_id.clone(),
                        reason: IneligibleReason::MissingCandidate,
                    });
                    continue;
                };
                let angle = candidate + soa;
                tool.angle_used = Some(angle);
                tool.rotation_type = method.rotation_type();
                tool.derotated = true;
                angle
            }
        };

        if rotate_group_readings(survey, g, applied) {
            out.unequal_stacking += 1;
        }
        out.rotated += 1;
    }

    survey.sensor_offset = match method {
        RotationMethod::Unrotate => 0.0,
        RotationMethod::Soa => survey.sensor_offset + soa,
        _ => soa,
    };
    let note = provenance_note(survey, prepared);
    survey.replace_notes(ROTATION_NOTE_PREFIX, note);

    if !out.skipped.is_empty() {
        tracing::warn!(
            "{} groups have no {} angle and were left unrotated",
            out.skipped.len(),
            method.description()
        );
    }
    tracing::info!(
        "Rotated {} groups using {} (soa {:.2}°)",
        out.rotated,
        method.description(),
        soa
    );
    Ok(out)
}

/// Note describing the survey's current rotation state, if any.
fn provenance_note(survey: &Survey, prepared: &PreparedData) -> Option<String> {
    let rotation_type = prepared
        .groups
        .iter()
        .filter_map(|g| survey.tools.get(g.tool.0))
        .find(|t| t.derotated)
        .map(|t| t.rotation_type)?;

    let method = match rotation_type {
        RotationType::Acc => "accelerometer",
        RotationType::Mag => "magnetometer",
        RotationType::PpRaw => "measured PP",
        RotationType::PpCleaned => "cleaned PP",
        RotationType::Soa => {
            return Some(format!(
                "{}rotated by a sensor offset angle of {:.2}°",
                ROTATION_NOTE_PREFIX, survey.sensor_offset
            ))
        }
        RotationType::None | RotationType::Unrotate => return None,
    };
    let mut note = format!("{}de-rotated using {}", ROTATION_NOTE_PREFIX, method);
    if survey.sensor_offset != 0.0 {
        note.push_str(&format!(
            " with a sensor offset angle of {:.2}°",
            survey.sensor_offset
        ));
    }
    Some(note)
}
