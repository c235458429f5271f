//! JSON survey documents.
//!
//! A document carries the reading table handed over by the file parsers
//! together with the header values and geometry the engine needs.

use std::io::BufWriter;
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::derotation::SurveyGeometry;
use crate::error::{Error, Result};
use crate::field::TransmitterLoop;
use crate::geometry::{Collar, SegmentTable};
use crate::survey::{ChannelTime, ParseFailure, ReadingRecord, Survey, SurveyKind};

/// Schema tag written into every document.
pub const SURVEY_SCHEMA_V1: &str = "pemrot.survey.v1";

fn default_schema() -> String {
    SURVEY_SCHEMA_V1.to_string()
}

/// On-disk form of a survey and its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyDocument {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub kind: SurveyKind,
    #[serde(default)]
    pub ramp_us: f64,
    #[serde(default)]
    pub current_a: f64,
    #[serde(default)]
    pub channel_times: Vec<ChannelTime>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub sensor_offset: f64,
    pub readings: Vec<ReadingRecord>,
    /// Transmitter loop vertices as `[easting, northing, elevation]`.
    #[serde(default, rename = "loop", skip_serializing_if = "Vec::is_empty")]
    pub tx_loop: Vec<Point3<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collar: Option<Collar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentTable>,
}

impl Default for SurveyDocument {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            kind: SurveyKind::default(),
            ramp_us: 0.0,
            current_a: 0.0,
            channel_times: Vec::new(),
            notes: Vec::new(),
            sensor_offset: 0.0,
            readings: Vec::new(),
            tx_loop: Vec::new(),
            collar: None,
            segments: None,
        }
    }
}

impl SurveyDocument {
    pub fn from_json_str(data: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(data)?;
        if doc.schema != SURVEY_SCHEMA_V1 {
            return Err(Error::Parse(format!(
                "unsupported survey schema '{}' (expected '{}')",
                doc.schema, SURVEY_SCHEMA_V1
            )));
        }
        if let Some(segments) = &doc.segments {
            segments.validate()?;
        }
        Ok(doc)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn write_json_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Geometry part of the document.
    pub fn geometry(&self) -> SurveyGeometry {
        SurveyGeometry {
            tx_loop: TransmitterLoop::new(self.tx_loop.clone()),
            collar: self.collar.clone(),
            segments: self.segments.clone().unwrap_or_default(),
        }
    }

    /// Parse the tool records and build the in-memory survey.
    ///
    /// Tool records that fail to parse are listed in the returned survey's
    /// `parse_failures`.
    pub fn into_survey(self) -> (Survey, SurveyGeometry) {
        let geometry = self.geometry();
        let mut survey = Survey::from_records(self.kind, self.readings);
        survey.ramp_us = self.ramp_us;
        survey.current_a = self.current_a;
        survey.channel_times = self.channel_times;
        survey.notes = self.notes;
        survey.sensor_offset = self.sensor_offset;
        (survey, geometry)
    }

    /// Document for a survey and its geometry, tools in text form.
    pub fn from_survey(survey: &Survey, geometry: &SurveyGeometry) -> Self {
        Self {
            schema: default_schema(),
            kind: survey.kind,
            ramp_us: survey.ramp_us,
            current_a: survey.current_a,
            channel_times: survey.channel_times.clone(),
            notes: survey.notes.clone(),
            sensor_offset: survey.sensor_offset,
            readings: survey.to_records(),
            tx_loop: geometry.tx_loop.vertices.clone(),
            collar: geometry.collar.clone(),
            segments: (!geometry.segments.is_empty()).then(|| geometry.segments.clone()),
        }
    }
}

/// Summarise parse failures for a log line.
pub fn describe_parse_failures(failures: &[ParseFailure]) -> Option<String> {
    let first = failures.first()?;
    Some(format!(
        "{} tool records failed to parse (first: record {} at station {}: {})",
        failures.len(),
        first.record,
        first.station,
        first.message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rad_tool::RotationType;

    const DOC: &str = r#"{
        "kind": "fluxgate",
        "ramp_us": 1500.0,
        "current_a": 20.0,
        "channel_times": [{"start_us": -1500.0, "end_us": 0.0}],
        "notes": ["Loop 1"],
        "readings": [
            {"station": "100", "component": "X", "tool_id": "1", "stacks": 8,
             "values": [1.0], "tool_fields": "D7 1 0 2 1 3 0 50000"},
            {"station": "100", "component": "Y", "tool_id": "1",
             "values": [2.0], "tool_fields": "D7 1 0 2"}
        ],
        "loop": [[0, 0, 0], [100, 0, 0], [100, 100, 0]],
        "collar": {"easting": 50.0, "northing": 50.0, "elevation": 300.0},
        "segments": {"segments": [{"azimuth": 0.0, "dip": 60.0, "length": 100.0, "depth": 100.0}]}
    }"#;

    #[test]
    fn document_builds_survey_and_geometry() {
        let doc = SurveyDocument::from_json_str(DOC).expect("doc");
        assert_eq!(doc.schema, SURVEY_SCHEMA_V1);
        let (survey, geometry) = doc.into_survey();
        assert_eq!(survey.kind, SurveyKind::Fluxgate);
        assert_eq!(survey.readings.len(), 2);
        assert_eq!(survey.readings[1].stacks, 1);
        assert_eq!(survey.parse_failures.len(), 1);
        assert!(describe_parse_failures(&survey.parse_failures)
            .expect("summary")
            .starts_with("1 tool records failed"));
        assert!(geometry.is_complete());
        assert_eq!(geometry.tx_loop.vertices[1], Point3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn survey_round_trips_through_json() {
        let (mut survey, geometry) = SurveyDocument::from_json_str(DOC).expect("doc").into_survey();
        survey.tools[0].rotation_type = RotationType::Acc;
        survey.tools[0].angle_used = Some(12.5);
        survey.tools[0].derotated = true;

        let json = serde_json::to_string(&SurveyDocument::from_survey(&survey, &geometry))
            .expect("encode");
        let (back, back_geometry) = SurveyDocument::from_json_str(&json)
            .expect("decode")
            .into_survey();
        assert_eq!(back_geometry, geometry);
        assert_eq!(back.notes, survey.notes);
        let tool = back.tool(back.readings[0].tool.expect("tool")).expect("tool");
        assert_eq!(tool.rotation_type, RotationType::Acc);
        assert_eq!(tool.angle_used, Some(12.5));
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let err = SurveyDocument::from_json_str(r#"{"schema": "other", "readings": []}"#)
            .expect_err("schema");
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn invalid_segments_are_rejected() {
        let doc = r#"{"readings": [], "segments": {"segments": [
            {"azimuth": 0.0, "dip": 60.0, "length": 10.0, "depth": 10.0},
            {"azimuth": 0.0, "dip": 60.0, "length": 0.0, "depth": 10.0}
        ]}}"#;
        assert!(matches!(
            SurveyDocument::from_json_str(doc),
            Err(Error::InvalidInput(_))
        ));
    }
}
