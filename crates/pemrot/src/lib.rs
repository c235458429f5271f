//! pemrot — RAD-tool roll-angle de-rotation and borehole geometry for
//! down-hole EM surveys.
//!
//! A borehole probe spins as it is lowered, so its X and Y components point
//! in arbitrary directions at every station. The stages are:
//!
//! 1. **RAD tool** – parse the orientation record of every reading
//!    (accelerometer, magnetometer, stored rotation state).
//! 2. **Candidates** – roll angles from the accelerometer, the magnetometer
//!    and, with loop and hole geometry, the measured and cleaned primary
//!    pulse compared with a theoretical field.
//! 3. **Rotation** – apply one candidate plus a sensor offset angle to the
//!    X/Y channel values of each station group, or undo it.
//! 4. **Geometry** – project collar and segment table into a 3D trace and
//!    collapse dense depth/azimuth/dip curves into segment tables.
//!
//! # Public API
//! - [`DerotationEngine`] with [`RotationMethod`] as the main entry point
//! - [`SegmentBuilder`] and [`geometry::project`] for hole geometry
//! - [`PrimaryFieldModel`] to plug in a different primary field model
//! - [`SurveyDocument`] for JSON input and output

pub mod angles;
pub mod config;
pub mod derotation;
pub mod error;
pub mod field;
pub mod geometry;
pub mod io;
pub mod rad_tool;
pub mod segment_builder;
pub mod survey;

pub use config::{DerotationConfig, SegmentBuilderConfig};
pub use derotation::{
    AngleSample, DerotationEngine, IneligibleGroup, IneligibleReason, PreparedData,
    RotatedData, RotationMethod, SurveyGeometry,
};
pub use error::{Error, Result};
pub use field::{PrimaryFieldModel, TransmitterLoop, WireLoopField};
pub use geometry::{Collar, LengthUnit, ProjectedTrace, Segment, SegmentTable};
pub use io::SurveyDocument;
pub use rad_tool::{RadTool, RotationType, ToolFormat};
pub use segment_builder::{DenseCurve, SegmentBuilder};
pub use survey::Survey;
