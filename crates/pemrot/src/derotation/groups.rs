//! Grouping of readings by station and tool-reading id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rad_tool::ToolIndex;
use crate::survey::{station_depth, Component, Survey};

/// X/Y readings of one station and tool-reading id, rotated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationGroup {
    pub station: String,
    pub tool_id: String,
    /// Relative depth parsed from the station label.
    pub depth: Option<f64>,
    /// Indices of X readings in the survey table.
    pub x: Vec<usize>,
    /// Indices of Y readings in the survey table.
    pub y: Vec<usize>,
    /// Tool shared by every X and Y reading of the group.
    pub tool: ToolIndex,
}

impl StationGroup {
    pub fn has_equal_stacking(&self) -> bool {
        self.x.len() == self.y.len()
    }
}

/// Why a group is left out of de-rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    MissingX,
    MissingY,
    /// None of the X/Y readings carries a parsed RAD tool.
    MissingTool,
    /// X and Y readings have different channel counts.
    ChannelMismatch,
    /// The requested rotation method has no angle for this group.
    MissingCandidate,
}

/// A group left out of de-rotation, reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IneligibleGroup {
    pub station: String,
    pub tool_id: String,
    pub reason: IneligibleReason,
}

#[derive(Default)]
struct Pending {
    x: Vec<usize>,
    y: Vec<usize>,
}

/// Group X/Y readings and point every reading of an eligible group at one
/// shared tool.
///
/// The shared tool is the first X reading's tool, falling back to the first
/// Y reading's. Groups are returned in first-seen order.
pub(super) fn group_readings(survey: &mut Survey) -> (Vec<StationGroup>, Vec<IneligibleGroup>) {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut pending: HashMap<(String, String), Pending> = HashMap::new();

    for (i, r) in survey.readings.iter().enumerate() {
        let key = (r.station.clone(), r.tool_id.clone());
        let entry = pending.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Pending::default()
        });
        match r.component {
            Component::X => entry.x.push(i),
            Component::Y => entry.y.push(i),
            Component::Z => {}
        }
    }

    let mut groups = Vec::new();
    let mut ineligible = Vec::new();
    let mut relinked = 0usize;

    for key in order {
        let Some(p) = pending.remove(&key) else {
            continue;
        };
        let (station, tool_id) = key;
        let reject = |reason| IneligibleGroup {
            station: station.clone(),
            tool_id: tool_id.clone(),
            reason,
        };

        if p.x.is_empty() && p.y.is_empty() {
            // Z-only station: nothing to rotate, not worth reporting
            continue;
        }
        if p.x.is_empty() {
            ineligible.push(reject(IneligibleReason::MissingX));
            continue;
        }
        if p.y.is_empty() {
            ineligible.push(reject(IneligibleReason::MissingY));
            continue;
        }

        let n_channels = survey.readings[p.x[0]].values.len();
        if p
            .x
            .iter()
            .chain(&p.y)
            .any(|&i| survey.readings[i].values.len() != n_channels)
        {
            ineligible.push(reject(IneligibleReason::ChannelMismatch));
            continue;
        }

        let Some(tool) = p
            .x
            .iter()
            .chain(&p.y)
            .find_map(|&i| survey.readings[i].tool)
        else {
            ineligible.push(reject(IneligibleReason::MissingTool));
            continue;
        };

        for &i in p.x.iter().chain(&p.y) {
            if survey.readings[i].tool != Some(tool) {
                survey.readings[i].tool = Some(tool);
                relinked += 1;
            }
        }

        groups.push(StationGroup {
            depth: station_depth(&station),
            station,
            tool_id,
            x: p.x,
            y: p.y,
            tool,
        });
    }

    if relinked > 0 {
        tracing::debug!("Linked {} readings to their group's shared tool", relinked);
    }
    (groups, ineligible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{ReadingRecord, SurveyKind};

    fn rec(station: &str, tool_id: &str, c: Component, n: usize, tool: bool) -> ReadingRecord {
        ReadingRecord {
            station: station.into(),
            component: c,
            tool_id: tool_id.into(),
            stacks: 4,
            values: vec![1.0; n],
            tool_fields: tool.then(|| "D7 1 0 2 1 3 0 50000".to_string()),
        }
    }

    #[test]
    fn readings_of_a_group_share_one_tool() {
        let mut survey = Survey::from_records(
            SurveyKind::Induction,
            vec![
                rec("100", "1", Component::X, 3, true),
                rec("100", "1", Component::Y, 3, true),
                rec("100", "1", Component::X, 3, true),
                rec("100", "1", Component::Z, 3, true),
            ],
        );
        let (groups, ineligible) = group_readings(&mut survey);
        assert!(ineligible.is_empty());
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.x, vec![0, 2]);
        assert_eq!(g.y, vec![1]);
        assert_eq!(g.depth, Some(100.0));
        for &i in g.x.iter().chain(&g.y) {
            assert_eq!(survey.readings[i].tool, Some(g.tool));
        }
        // Z keeps its own record
        assert_ne!(survey.readings[3].tool, Some(g.tool));
    }

    #[test]
    fn incomplete_groups_are_reported() {
        let mut survey = Survey::from_records(
            SurveyKind::Induction,
            vec![
                rec("100", "1", Component::X, 3, true),
                rec("200", "1", Component::Y, 3, true),
                rec("300", "1", Component::X, 3, true),
                rec("300", "1", Component::Y, 4, true),
                rec("400", "1", Component::X, 3, false),
                rec("400", "1", Component::Y, 3, false),
                rec("500", "1", Component::Z, 3, true),
            ],
        );
        let (groups, ineligible) = group_readings(&mut survey);
        assert!(groups.is_empty());
        let reasons: Vec<_> = ineligible.iter().map(|g| (g.station.as_str(), g.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                ("100", IneligibleReason::MissingY),
                ("200", IneligibleReason::MissingX),
                ("300", IneligibleReason::ChannelMismatch),
                ("400", IneligibleReason::MissingTool),
            ]
        );
    }

    #[test]
    fn tool_ids_split_a_station() {
        let mut survey = Survey::from_records(
            SurveyKind::Induction,
            vec![
                rec("100", "1", Component::X, 2, true),
                rec("100", "1", Component::Y, 2, true),
                rec("100", "2", Component::X, 2, true),
                rec("100", "2", Component::Y, 2, true),
            ],
        );
        let (groups, _) = group_readings(&mut survey);
        assert_eq!(groups.len(), 2);
        assert_ne!(groups[0].tool, groups[1].tool);
    }
}
