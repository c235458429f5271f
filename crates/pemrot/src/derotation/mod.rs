//! XY de-rotation of borehole survey readings.
//!
//! [`DerotationEngine::prepare`] groups readings by station and tool-reading
//! id, links every group to one shared RAD tool and fills its roll-angle
//! candidates. [`DerotationEngine::rotate`] applies one candidate (plus a
//! sensor offset angle) to the X/Y channel values in place.

mod candidates;
mod groups;
mod primary_pulse;
mod rotate;


pub use candidates::{accelerometer_roll, magnetometer_roll, pp_roll};
pub use groups::{IneligibleGroup, IneligibleReason, StationGroup};
pub use primary_pulse::{cleaning_channel_indices, hole_frame, pp_channel_indices, PpDiagnostics};
pub use rotate::{rotate_xy, RotatedData, ROTATION_NOTE_PREFIX};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::angles::reconcile_to_running_mean;
use crate::config::DerotationConfig;
use crate::error::{Error, Result};
use crate::field::{PrimaryFieldModel, TransmitterLoop, WireLoopField};
use crate::geometry::{Collar, SegmentTable};
use crate::rad_tool::RotationType;
use crate::survey::Survey;

use candidates::{candidate_angle, fill_sensor_candidates};
use primary_pulse::PpContext;

/// Source of the angle applied by [`DerotationEngine::rotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMethod {
    /// Accelerometer roll angle.
    Acc,
    /// Magnetometer roll angle.
    Mag,
    /// Roll angle from the measured primary pulse.
    PpRaw,
    /// Roll angle from the cleaned primary pulse (induction only).
    PpCleaned,
    /// Only the sensor offset angle, on top of the current state.
    Soa,
    /// Undo the current rotation.
    Unrotate,
}

impl RotationMethod {
    /// Rotation flag stored on the tool after this method is applied.
    pub fn rotation_type(self) -> RotationType {
        match self {
            Self::Acc => RotationType::Acc,
            Self::Mag => RotationType::Mag,
            Self::PpRaw => RotationType::PpRaw,
            Self::PpCleaned => RotationType::PpCleaned,
            Self::Soa => RotationType::Soa,
            Self::Unrotate => RotationType::Unrotate,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Acc => "accelerometer",
            Self::Mag => "magnetometer",
            Self::PpRaw => "measured PP",
            Self::PpCleaned => "cleaned PP",
            Self::Soa => "sensor offset",
            Self::Unrotate => "un-rotation",
        }
    }
}

/// Loop and borehole geometry needed for PP candidates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurveyGeometry {
    pub tx_loop: TransmitterLoop,
    pub collar: Option<Collar>,
    pub segments: SegmentTable,
}

impl SurveyGeometry {
    /// Names the missing parts, or `None` when the geometry is complete.
    pub fn missing_parts(&self) -> Option<String> {
        let mut missing = Vec::new();
        if !self.tx_loop.is_complete() {
            missing.push("transmitter loop");
        }
        if self.collar.is_none() {
            missing.push("collar");
        }
        if self.segments.is_empty() {
            missing.push("borehole segments");
        }
        if missing.is_empty() {
            None
        } else {
            Some(format!("no {}", missing.join(", ")))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_parts().is_none()
    }
}

/// One station's candidate angle in an angle profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    pub station: String,
    pub tool_id: String,
    pub depth: Option<f64>,
    /// Candidate angle reconciled against the running mean of the profile.
    pub angle: f64,
}

/// Result of [`DerotationEngine::prepare`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreparedData {
    /// Groups with both X and Y readings and a shared tool.
    pub groups: Vec<StationGroup>,
    /// Groups left out, with the reason.
    pub ineligible: Vec<IneligibleGroup>,
    /// `true` when PP candidates were computed.
    pub pp_available: bool,
    pub pp: Vec<PpDiagnostics>,
    /// Fingerprint of the reading table and raw tool sensors at preparation
    /// time.
    #[serde(default)]
    pub layout: u64,
}

impl PreparedData {
    /// Per-group candidate angles of `method`, made continuous across
    /// north with a running-mean reference.
    ///
    /// Groups without a candidate are left out.
    pub fn angle_profile(&self, survey: &Survey, method: RotationMethod) -> Result<Vec<AngleSample>> {
        if matches!(method, RotationMethod::Soa | RotationMethod::Unrotate) {
            return Err(Error::InvalidInput(format!(
                "{} has no per-station angle",
                method.description()
            )));
        }
        let mut samples = Vec::new();
        for g in &self.groups {
            if let Some(angle) = candidate_angle(survey.tool(g.tool)?, method) {
                samples.push(AngleSample {
                    station: g.station.clone(),
                    tool_id: g.tool_id.clone(),
                    depth: g.depth,
                    angle,
                });
            }
        }
        if samples.is_empty() {
            return Ok(samples);
        }
        let raw: Vec<f64> = samples.iter().map(|s| s.angle).collect();
        for (s, angle) in samples.iter_mut().zip(reconcile_to_running_mean(&raw)?) {
            s.angle = angle;
        }
        Ok(samples)
    }

    /// `true` when this preparation still describes `survey`.
    fn matches(&self, survey: &Survey) -> bool {
        if self.layout != survey_layout(survey) {
            return false;
        }
        let linked = |i: usize, tool| {
            survey
                .readings
                .get(i)
                .is_some_and(|r| r.tool == Some(tool))
        };
        self.groups
            .iter()
            .all(|g| g.x.iter().chain(&g.y).all(|&i| linked(i, g.tool)))
    }
}

/// Hash of everything grouping and the sensor candidates depend on.
fn survey_layout(survey: &Survey) -> u64 {
    let mut h = DefaultHasher::new();
    survey.readings.len().hash(&mut h);
    for r in &survey.readings {
        r.station.hash(&mut h);
        r.tool_id.hash(&mut h);
        r.component.hash(&mut h);
        r.values.len().hash(&mut h);
        r.tool.hash(&mut h);
    }
    survey.tools.len().hash(&mut h);
    for t in &survey.tools {
        for v in t.accelerometer.iter() {
            v.to_bits().hash(&mut h);
        }
        if let Some(m) = &t.magnetometer {
            for v in m.iter() {
                v.to_bits().hash(&mut h);
            }
        }
    }
    h.finish()
}

/// Prepares and rotates the XY readings of one survey.
///
/// # Example
///
/// ```
/// use pemrot::{DerotationConfig, DerotationEngine, RotationMethod, SurveyGeometry};
/// use pemrot::survey::{Component, ReadingRecord, Survey, SurveyKind};
///
/// let record = |component, values: Vec<f64>| ReadingRecord {
///     station: "100".into(),
///     component,
///     tool_id: "1".into(),
///     stacks: 1,
///     values,
///     tool_fields: Some("D7 0 0 0 1 0 0 0".into()),
/// };
/// let mut survey = Survey::from_records(
///     SurveyKind::Induction,
///     vec![record(Component::X, vec![1.0]), record(Component::Y, vec![0.0])],
/// );
///
/// let mut engine = DerotationEngine::new(DerotationConfig::default(), SurveyGeometry::default());
/// let rotated = engine.rotate(&mut survey, RotationMethod::Acc, 0.0).unwrap();
/// assert_eq!(rotated.rotated, 1);
/// ```
pub struct DerotationEngine {
    config: DerotationConfig,
    geometry: SurveyGeometry,
    field: Box<dyn PrimaryFieldModel>,
    prepared: Option<PreparedData>,
}

impl DerotationEngine {
    /// Engine using the built-in wire-loop field model.
    pub fn new(config: DerotationConfig, geometry: SurveyGeometry) -> Self {
        Self::with_field_model(config, geometry, Box::new(WireLoopField::default()))
    }

    /// Engine with a custom primary field model.
    pub fn with_field_model(
        config: DerotationConfig,
        geometry: SurveyGeometry,
        field: Box<dyn PrimaryFieldModel>,
    ) -> Self {
        Self {
            config,
            geometry,
            field,
            prepared: None,
        }
    }

    pub fn config(&self) -> &DerotationConfig {
        &self.config
    }

    pub fn geometry(&self) -> &SurveyGeometry {
        &self.geometry
    }

    /// Result of the last [`prepare`](Self::prepare), if any.
    pub fn prepared(&self) -> Option<&PreparedData> {
        self.prepared.as_ref()
    }

    /// Group the readings and compute every roll-angle candidate.
    ///
    /// Accelerometer and magnetometer candidates are always computed. PP
    /// candidates need complete geometry and ramp timing; without them they
    /// are skipped, or `MissingGeometry` is returned when the config
    /// requires PP.
    pub fn prepare(&mut self, survey: &mut Survey) -> Result<&PreparedData> {
        let (groups, ineligible) = groups::group_readings(survey);

        let pp_ctx = if survey.has_pp_timing() {
            PpContext::build(survey, &self.geometry, self.field.as_ref(), &groups)
        } else {
            Err(Error::MissingGeometry(
                "survey has no ramp time or channel times".into(),
            ))
        };
        let pp_ctx = match pp_ctx {
            Ok(ctx) => Some(ctx),
            Err(Error::MissingGeometry(msg)) if !self.config.require_pp => {
                tracing::info!("PP candidates skipped: {}", msg);
                None
            }
            Err(e) => return Err(e),
        };

        for g in &groups {
            let tool = survey.tool_mut(g.tool)?;
            tool.measured_pp_roll_angle = None;
            tool.cleaned_pp_roll_angle = None;
            tool.pp_dip = None;
            fill_sensor_candidates(tool);
        }

        let mut pp = Vec::new();
        if let Some(ctx) = &pp_ctx {
            for g in &groups {
                if let Some(d) = ctx.fill_group(survey, g)? {
                    pp.push(d);
                }
            }
        }

        if !ineligible.is_empty() {
            tracing::warn!(
                "{} station groups lack an X/Y pair or a tool and will not be de-rotated",
                ineligible.len()
            );
        }
        tracing::info!(
            "Prepared {} station groups ({} with PP candidates)",
            groups.len(),
            pp.len()
        );

        let prepared = PreparedData {
            groups,
            ineligible,
            pp_available: pp_ctx.is_some(),
            pp,
            layout: survey_layout(survey),
        };
        Ok(self.prepared.insert(prepared))
    }

    /// Apply `method` with sensor offset `soa` (degrees) to every group.
    ///
    /// Runs [`prepare`](Self::prepare) first when it has not been run for
    /// this survey, or when the survey's readings, tool links or raw
    /// sensors changed since.
    pub fn rotate(
        &mut self,
        survey: &mut Survey,
        method: RotationMethod,
        soa: f64,
    ) -> Result<RotatedData> {
        if !soa.is_finite() {
            return Err(Error::InvalidInput(format!("sensor offset {} is not finite", soa)));
        }
        if !self.prepared.as_ref().is_some_and(|p| p.matches(survey)) {
            tracing::debug!("Survey not prepared, preparing before rotation");
            self.prepare(survey)?;
        }
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| Error::InvalidState("preparation produced no data".into()))?;
        rotate::apply(prepared, survey, method, soa)
    }
}
