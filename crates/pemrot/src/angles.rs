//! Angle wraparound reconciliation for azimuth and roll sequences.
//!
//! Azimuths and roll angles are modulo 360°, so a physically continuous
//! sequence can jump from 359° to 1°. These helpers pick, for every value,
//! the 360°-equivalent closest to a reference so the sequence stays
//! continuous. Output values may lie outside [0, 360).

use crate::error::{Error, Result};

/// Distance beyond which a reconciled value gets one more 360° shift.
const DRIFT_LIMIT_DEG: f64 = 300.0;

/// Normalizes an angle in degrees into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let norm = angle.rem_euclid(360.0);
    if norm >= 360.0 {
        0.0
    } else {
        norm
    }
}

/// Returns whichever of `candidate`, `candidate - 360` and `candidate + 360`
/// lies closest to `reference`.
///
/// Ties keep the untransformed candidate. If the winner is still more than
/// 300° away (the reference has drifted far outside [0, 360)), it is moved
/// one more turn toward the reference.
pub fn reconcile_to_reference(reference: f64, candidate: f64) -> f64 {
    let mut best = candidate;
    let mut best_dist = (candidate - reference).abs();
    for shifted in [candidate - 360.0, candidate + 360.0] {
        let dist = (shifted - reference).abs();
        if dist < best_dist {
            best = shifted;
            best_dist = dist;
        }
    }

    if best_dist > DRIFT_LIMIT_DEG {
        if reference > best {
            best += 360.0;
        } else {
            best -= 360.0;
        }
    }
    best
}

/// Makes a sequence continuous by reconciling every value against the
/// previous output.
///
/// If every output ends up negative, 360 is added to all of them so azimuth
/// traces stay in a non-negative band.
pub fn smooth_sequence(values: &[f64]) -> Result<Vec<f64>> {
    let (&first, rest) = values
        .split_first()
        .ok_or_else(|| Error::InvalidInput("cannot smooth an empty angle sequence".into()))?;

    let mut out = Vec::with_capacity(values.len());
    out.push(first);
    let mut last = first;
    for &v in rest {
        last = reconcile_to_reference(last, v);
        out.push(last);
    }

    if out.iter().all(|v| *v < 0.0) {
        for v in out.iter_mut() {
            *v += 360.0;
        }
    }
    Ok(out)
}

/// Reconciles every value against the running mean of the values accepted
/// so far.
///
/// Used for roll-angle profiles, where single outliers should not drag the
/// reference around. No all-negative correction is applied.
pub fn reconcile_to_running_mean(values: &[f64]) -> Result<Vec<f64>> {
    let (&first, rest) = values
        .split_first()
        .ok_or_else(|| Error::InvalidInput("cannot reconcile an empty angle sequence".into()))?;

    let mut out = Vec::with_capacity(values.len());
    out.push(first);
    let mut sum = first;
    for &v in rest {
        let mean = sum / out.len() as f64;
        let r = reconcile_to_reference(mean, v);
        sum += r;
        out.push(r);
    }
    Ok(out)
}
