//! In-memory survey tables handed over by the file parsers.
//!
//! Readings reference their RAD tool through an index into
//! [`Survey::tools`]. Several readings may point at the same tool; this is
//! how a station/tool-id group shares one set of angles.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rad_tool::{RadTool, ToolIndex};

/// Sensor component of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    X,
    Y,
    Z,
}

/// Receiver type of the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyKind {
    /// dB/dt coil receiver (nT/s).
    #[default]
    Induction,
    /// B-field fluxgate receiver (pT).
    Fluxgate,
}

/// Channel window in microseconds relative to the end of the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelTime {
    pub start_us: f64,
    pub end_us: f64,
}

impl ChannelTime {
    pub fn centre_us(&self) -> f64 {
        0.5 * (self.start_us + self.end_us)
    }

    pub fn contains(&self, t_us: f64) -> bool {
        t_us >= self.start_us && t_us <= self.end_us
    }
}

/// One stacked reading of one component at one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station: String,
    pub component: Component,
    /// Tool-reading identity; readings sharing station and tool id are
    /// rotated together.
    pub tool_id: String,
    pub stacks: u32,
    /// Per-channel amplitudes.
    pub values: Vec<f64>,
    pub tool: Option<ToolIndex>,
}

/// Reading as exchanged with the parser layer, tool still in text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub station: String,
    pub component: Component,
    pub tool_id: String,
    #[serde(default = "default_stacks")]
    pub stacks: u32,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_fields: Option<String>,
}

fn default_stacks() -> u32 {
    1
}

/// A record whose tool fields could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub record: usize,
    pub station: String,
    pub message: String,
}

/// Reading table, tool arena and the header values de-rotation needs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Survey {
    pub kind: SurveyKind,
    /// Ramp (turn-off) time in microseconds.
    pub ramp_us: f64,
    /// Transmitter current in amperes.
    pub current_a: f64,
    pub channel_times: Vec<ChannelTime>,
    pub notes: Vec<String>,
    pub readings: Vec<Reading>,
    pub tools: Vec<RadTool>,
    /// Cumulative sensor offset angle applied to the current rotation.
    #[serde(default)]
    pub sensor_offset: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_failures: Vec<ParseFailure>,
}

impl Survey {
    /// Build the reading table from parser records.
    ///
    /// A malformed tool record only drops that reading's tool; the failure
    /// is kept in [`Survey::parse_failures`] and the other records continue.
    pub fn from_records(kind: SurveyKind, records: Vec<ReadingRecord>) -> Self {
        let mut survey = Survey {
            kind,
            ..Default::default()
        };
        for (i, rec) in records.into_iter().enumerate() {
            let tool = match rec.tool_fields.as_deref().map(RadTool::parse) {
                Some(Ok(t)) => Some(survey.push_tool(t)),
                Some(Err(e)) => {
                    tracing::warn!("Station {} record {}: {}", rec.station, i, e);
                    survey.parse_failures.push(ParseFailure {
                        record: i,
                        station: rec.station.clone(),
                        message: e.to_string(),
                    });
                    None
                }
                None => None,
            };
            survey.readings.push(Reading {
                station: rec.station,
                component: rec.component,
                tool_id: rec.tool_id,
                stacks: rec.stacks,
                values: rec.values,
                tool,
            });
        }
        if !survey.parse_failures.is_empty() {
            tracing::warn!(
                "{} of {} tool records could not be parsed",
                survey.parse_failures.len(),
                survey.readings.len()
            );
        }
        survey
    }

    /// Convert back to parser records, writing each tool in its text layout.
    pub fn to_records(&self) -> Vec<ReadingRecord> {
        self.readings
            .iter()
            .map(|r| ReadingRecord {
                station: r.station.clone(),
                component: r.component,
                tool_id: r.tool_id.clone(),
                stacks: r.stacks,
                values: r.values.clone(),
                tool_fields: r
                    .tool
                    .and_then(|idx| self.tools.get(idx.0))
                    .map(RadTool::to_raw_fields),
            })
            .collect()
    }

    pub fn push_tool(&mut self, tool: RadTool) -> ToolIndex {
        self.tools.push(tool);
        ToolIndex(self.tools.len() - 1)
    }

    pub fn tool(&self, idx: ToolIndex) -> Result<&RadTool> {
        self.tools
            .get(idx.0)
            .ok_or_else(|| Error::InvalidInput(format!("tool index {} out of range", idx.0)))
    }

    pub fn tool_mut(&mut self, idx: ToolIndex) -> Result<&mut RadTool> {
        self.tools
            .get_mut(idx.0)
            .ok_or_else(|| Error::InvalidInput(format!("tool index {} out of range", idx.0)))
    }

    /// Replace every note starting with `prefix` by `note`.
    pub fn replace_notes(&mut self, prefix: &str, note: Option<String>) {
        self.notes.retain(|n| !n.starts_with(prefix));
        if let Some(n) = note {
            self.notes.push(n);
        }
    }

    /// `true` when PP windows can be derived for this survey.
    pub fn has_pp_timing(&self) -> bool {
        self.ramp_us > 0.0 && !self.channel_times.is_empty()
    }
}

/// Relative depth encoded by a borehole station label.
///
/// Leading sign and digits (with an optional fraction) are used; trailing
/// letters such as a component suffix are ignored.
pub fn station_depth(station: &str) -> Option<f64> {
    let s = station.trim();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(station: &str, component: Component, tool: Option<&str>) -> ReadingRecord {
        ReadingRecord {
            station: station.to_string(),
            component,
            tool_id: "1".to_string(),
            stacks: 8,
            values: vec![1.0, 2.0],
            tool_fields: tool.map(str::to_string),
        }
    }

    #[test]
    fn bad_tool_record_does_not_stop_others() {
        let survey = Survey::from_records(
            SurveyKind::Induction,
            vec![
                record("100", Component::X, Some("D7 1 0 2 1 3 0 50000")),
                record("100", Component::Y, Some("D7 1 0 2")),
                record("100", Component::Z, None),
            ],
        );
        assert_eq!(survey.readings.len(), 3);
        assert_eq!(survey.tools.len(), 1);
        assert_eq!(survey.readings[0].tool, Some(ToolIndex(0)));
        assert_eq!(survey.readings[1].tool, None);
        assert_eq!(survey.parse_failures.len(), 1);
        assert_eq!(survey.parse_failures[0].record, 1);
    }

    #[test]
    fn records_round_trip_through_survey() {
        let records = vec![
            record("100", Component::X, Some("D5 0 1 0 270 0 R1 270")),
            record("100", Component::Y, None),
        ];
        let survey = Survey::from_records(SurveyKind::Fluxgate, records);
        let back = survey.to_records();
        assert_eq!(back[1].tool_fields, None);
        let tool = RadTool::parse(back[0].tool_fields.as_deref().expect("fields")).expect("parse");
        assert_eq!(tool.angle_used, Some(270.0));
    }

    #[test]
    fn replace_notes_keeps_unrelated_notes() {
        let mut survey = Survey::default();
        survey.notes = vec!["loop 1".into(), "XY data de-rotated using accelerometer".into()];
        survey.replace_notes("XY data", Some("XY data de-rotated using magnetometer".into()));
        assert_eq!(
            survey.notes,
            vec!["loop 1".to_string(), "XY data de-rotated using magnetometer".to_string()]
        );
        survey.replace_notes("XY data", None);
        assert_eq!(survey.notes, vec!["loop 1".to_string()]);
    }

    #[test]
    fn station_labels_to_depth() {
        assert_eq!(station_depth("100"), Some(100.0));
        assert_eq!(station_depth(" 12.5 "), Some(12.5));
        assert_eq!(station_depth("250N"), Some(250.0));
        assert_eq!(station_depth("-5"), Some(-5.0));
        assert_eq!(station_depth("A1"), None);
    }
}
