//! Roll-angle candidates from the RAD tool's mechanical sensors.

use nalgebra::Vector3;

use super::RotationMethod;
use crate::angles::normalize_degrees;
use crate::rad_tool::RadTool;

/// Dip reported for magnetometer-based roll angles.
pub(super) const MAG_DIP_DEG: f64 = -90.0;

/// Accelerometer roll angle and dip in degrees, roll in [0, 360).
///
/// Returns `None` for a zero or non-finite vector.
pub fn accelerometer_roll(v: &Vector3<f64>) -> Option<(f64, f64)> {
    let norm = v.norm();
    if !norm.is_finite() || norm <= 0.0 {
        return None;
    }
    let theta = v.y.atan2(v.z).to_degrees();
    let cc_roll = if v.y < 0.0 { 360.0 - theta } else { theta };
    let roll = if v.y > 0.0 { 360.0 - cc_roll } else { cc_roll };
    let dip = (v.x / norm).clamp(-1.0, 1.0).acos().to_degrees() - 90.0;
    Some((normalize_degrees(roll), dip))
}

/// Magnetometer roll angle in degrees and the fixed vertical dip.
///
/// A negative angle is negated rather than wrapped by +360, unlike every
/// other normalization in the crate. Kept as recorded in processed files.
pub fn magnetometer_roll(v: &Vector3<f64>) -> Option<(f64, f64)> {
    if !v.iter().all(|c| c.is_finite()) || v.norm() <= 0.0 {
        return None;
    }
    let cc_roll = (-v.y).atan2(-v.z).to_degrees();
    let mut roll = if v.y < 0.0 { 360.0 - cc_roll } else { cc_roll };
    if roll > 360.0 {
        roll -= 360.0;
    }
    if roll < 0.0 {
        roll = -roll;
    }
    Some((roll, MAG_DIP_DEG))
}

/// Roll angle a PP comparison implies: the angle that turns the measured
/// XY vector onto the theoretical one, in [0, 360).
pub fn pp_roll(theory_xy: [f64; 2], measured_xy: [f64; 2]) -> f64 {
    let mut roll =
        (theory_xy[1].atan2(theory_xy[0]) - measured_xy[1].atan2(measured_xy[0])).to_degrees();
    if roll < 0.0 {
        roll += 360.0;
    }
    roll
}

/// Fill the accelerometer and magnetometer candidates of a tool.
pub(super) fn fill_sensor_candidates(tool: &mut RadTool) {
    if let Some((roll, dip)) = accelerometer_roll(&tool.accelerometer) {
        tool.acc_roll_angle = Some(roll);
        tool.acc_dip = Some(dip);
    }
    if let Some((roll, dip)) = tool.magnetometer.as_ref().and_then(magnetometer_roll) {
        tool.mag_roll_angle = Some(roll);
        tool.mag_dip = Some(dip);
    }
}

/// Candidate angle a method selects, if the tool has one.
pub(super) fn candidate_angle(tool: &RadTool, method: RotationMethod) -> Option<f64> {
    match method {
        RotationMethod::Acc => tool.acc_roll_angle,
        RotationMethod::Mag => tool.mag_roll_angle,
        RotationMethod::PpRaw => tool.measured_pp_roll_angle,
        RotationMethod::PpCleaned => tool.cleaned_pp_roll_angle,
        RotationMethod::Soa | RotationMethod::Unrotate => None,
    }
}
