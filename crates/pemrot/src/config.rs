//! Tunable parameters for de-rotation and segment building.

use std::path::Path;

use crate::error::Result;

/// Thresholds used when collapsing a dense depth/azimuth/dip curve into
/// borehole segments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentBuilderConfig {
    /// Accumulated depth change that forces a new segment.
    pub depth_threshold: f64,
    /// Accumulated azimuth change (degrees) that forces a new segment.
    pub azimuth_threshold_deg: f64,
    /// Accumulated dip change (degrees) that forces a new segment.
    pub dip_threshold_deg: f64,
    /// Decimal places kept in the output table.
    pub decimals: u32,
}

impl Default for SegmentBuilderConfig {
    fn default() -> Self {
        Self {
            depth_threshold: 10.0,
            azimuth_threshold_deg: 1.0,
            dip_threshold_deg: 1.0,
            decimals: 2,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DerotationConfig {
    /// Fail preparation with `MissingGeometry` instead of silently skipping
    /// the PP candidates when geometry or ramp timing is incomplete.
    pub require_pp: bool,
    pub segments: SegmentBuilderConfig,
}

impl DerotationConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: DerotationConfig =
            serde_json::from_str(r#"{"segments": {"depth_threshold": 5.0}}"#).expect("config");
        assert!(!cfg.require_pp);
        assert_eq!(cfg.segments.depth_threshold, 5.0);
        assert_eq!(cfg.segments.azimuth_threshold_deg, 1.0);
        assert_eq!(cfg.segments.decimals, 2);
    }
}
