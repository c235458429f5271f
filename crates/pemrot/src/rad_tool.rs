//! RAD tool orientation record: sensor vectors plus derived roll angles.
//!
//! One [`RadTool`] exists per tool reading. Readings that share a station and
//! tool-reading id share the same record through a [`ToolIndex`] into the
//! survey's tool arena, so an angle written through one reading is observed
//! by every reading of the group.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sensor-field layout of a raw tool record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolFormat {
    /// Processed layout: `x y z roll dip [R<code> angle]`.
    D5,
    /// Raw sensor layout: `Hx gx Hy gy Hz gz T [roll dip R<code> angle]`.
    D7,
}

impl ToolFormat {
    /// Parse the leading format token (`D5` or `D7`).
    pub fn from_token(token: &str) -> Result<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "D5" => Ok(Self::D5),
            "D7" => Ok(Self::D7),
            other => Err(Error::Parse(format!("unknown tool format '{}'", other))),
        }
    }

    /// Number of fields after the format token, without and with the derived
    /// tail.
    pub fn field_counts(self) -> (usize, usize) {
        match self {
            Self::D5 => (5, 7),
            Self::D7 => (7, 11),
        }
    }

    fn token(self) -> &'static str {
        match self {
            Self::D5 => "D5",
            Self::D7 => "D7",
        }
    }
}

/// How the XY data of a tool group was last rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationType {
    #[default]
    None,
    Acc,
    Mag,
    PpRaw,
    PpCleaned,
    Soa,
    Unrotate,
}

impl RotationType {
    /// Numeric code written in the `R<code>` token.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Acc => 1,
            Self::Mag => 2,
            Self::PpRaw => 3,
            Self::PpCleaned => 4,
            Self::Soa => 5,
            Self::Unrotate => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Acc,
            2 => Self::Mag,
            3 => Self::PpRaw,
            4 => Self::PpCleaned,
            5 => Self::Soa,
            6 => Self::Unrotate,
            _ => return None,
        })
    }

    /// `true` when this code describes data that is currently de-rotated.
    pub fn is_rotated(self) -> bool {
        !matches!(self, Self::None | Self::Unrotate)
    }
}

/// Index of a [`RadTool`] in the survey's tool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolIndex(pub usize);

/// Orientation measurement of one reading station and its derived angles.
///
/// Angles are in degrees. Derived fields stay `None` until the de-rotation
/// engine fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadTool {
    pub format: ToolFormat,
    pub accelerometer: Vector3<f64>,
    /// Absent for D5 records.
    pub magnetometer: Option<Vector3<f64>>,
    /// Absent for D5 records.
    pub total_field: Option<f64>,

    pub acc_roll_angle: Option<f64>,
    pub acc_dip: Option<f64>,
    pub mag_roll_angle: Option<f64>,
    pub mag_dip: Option<f64>,
    pub measured_pp_roll_angle: Option<f64>,
    pub cleaned_pp_roll_angle: Option<f64>,
    pub pp_dip: Option<f64>,

    pub angle_used: Option<f64>,
    pub rotation_type: RotationType,
    pub derotated: bool,
}

impl RadTool {
    fn new(format: ToolFormat, accelerometer: Vector3<f64>) -> Self {
        Self {
            format,
            accelerometer,
            magnetometer: None,
            total_field: None,
            acc_roll_angle: None,
            acc_dip: None,
            mag_roll_angle: None,
            mag_dip: None,
            measured_pp_roll_angle: None,
            cleaned_pp_roll_angle: None,
            pp_dip: None,
            angle_used: None,
            rotation_type: RotationType::None,
            derotated: false,
        }
    }

    /// Parse a whole tool record such as `"D7 12.1 -0.3 ..."`.
    pub fn parse(record: &str) -> Result<Self> {
        let mut tokens = record.split_whitespace();
        let head = tokens
            .next()
            .ok_or_else(|| Error::Parse("empty tool record".to_string()))?;
        let format = ToolFormat::from_token(head)?;
        let fields: Vec<&str> = tokens.collect();
        Self::from_raw_fields(format, &fields)
    }

    /// Build a record from the fields that follow the format token.
    pub fn from_raw_fields(format: ToolFormat, fields: &[&str]) -> Result<Self> {
        let (short, long) = format.field_counts();
        if fields.len() != short && fields.len() != long {
            return Err(Error::Parse(format!(
                "{} record needs {} or {} fields, got {}",
                format.token(),
                short,
                long,
                fields.len()
            )));
        }

        let tool = match format {
            ToolFormat::D7 => {
                let v = parse_floats(&fields[..7])?;
                let mut tool = Self::new(format, Vector3::new(v[1], v[3], v[5]));
                tool.magnetometer = Some(Vector3::new(v[0], v[2], v[4]));
                tool.total_field = Some(v[6]);
                if fields.len() == long {
                    let tail = parse_floats(&[fields[7], fields[8]])?;
                    tool.acc_roll_angle = Some(tail[0]);
                    tool.acc_dip = Some(tail[1]);
                    tool.apply_rotation_tail(fields[9], fields[10])?;
                }
                tool
            }
            ToolFormat::D5 => {
                let v = parse_floats(&fields[..5])?;
                let mut tool = Self::new(format, Vector3::new(v[0], v[1], v[2]));
                tool.acc_roll_angle = Some(v[3]);
                tool.acc_dip = Some(v[4]);
                if fields.len() == long {
                    tool.apply_rotation_tail(fields[5], fields[6])?;
                }
                tool
            }
        };
        Ok(tool)
    }

    fn apply_rotation_tail(&mut self, flag: &str, angle: &str) -> Result<()> {
        let code = flag
            .strip_prefix('R')
            .or_else(|| flag.strip_prefix('r'))
            .and_then(|c| c.parse::<u8>().ok())
            .and_then(RotationType::from_code)
            .ok_or_else(|| Error::Parse(format!("invalid rotation flag '{}'", flag)))?;
        let angle = parse_float(angle)?;
        self.rotation_type = code;
        self.derotated = code.is_rotated();
        self.angle_used = self.derotated.then_some(angle);
        Ok(())
    }

    /// Write the record back in its text layout, including the derived tail.
    pub fn to_raw_fields(&self) -> String {
        let angle = self.angle_used.unwrap_or(0.0);
        let flag = format!("R{}", self.rotation_type.code());
        let roll = self.acc_roll_angle.unwrap_or(0.0);
        let dip = self.acc_dip.unwrap_or(0.0);
        let g = &self.accelerometer;
        match self.format {
            ToolFormat::D7 => {
                let h = self.magnetometer.unwrap_or_else(Vector3::zeros);
                let t = self.total_field.unwrap_or(0.0);
                format!(
                    "D7 {} {} {} {} {} {} {} {} {} {} {}",
                    h.x, g.x, h.y, g.y, h.z, g.z, t, roll, dip, flag, angle
                )
            }
            ToolFormat::D5 => format!(
                "D5 {} {} {} {} {} {} {}",
                g.x, g.y, g.z, roll, dip, flag, angle
            ),
        }
    }

    /// `true` when the record keeps the raw sensor vectors needed to undo a
    /// rotation.
    pub fn has_raw_sensors(&self) -> bool {
        self.format == ToolFormat::D7
    }
}

fn parse_float(token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|e| Error::Parse(format!("invalid number '{}': {}", token, e)))
}

fn parse_floats(tokens: &[&str]) -> Result<Vec<f64>> {
    tokens.iter().map(|t| parse_float(t)).collect()
}
