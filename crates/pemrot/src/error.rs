//! Error type shared by the de-rotation and geometry stages.

/// Errors surfaced by tool parsing, angle reconciliation, projection and
/// de-rotation.
///
/// Data-quality conditions (missing X/Y pairs, unequal stacking, partial
/// geometry) are not errors; they are reported through
/// [`PreparedData`](crate::PreparedData) and the survey parse report.
#[derive(Debug)]
pub enum Error {
    /// A raw tool-reading record does not match the layout of its format.
    Parse(String),
    /// Empty or degenerate input sequence.
    InvalidInput(String),
    /// PP-based work was requested without loop, collar, segments and ramp.
    MissingGeometry(String),
    /// The operation is not valid in the group's current rotation state.
    InvalidState(String),
    /// Reading or writing a document failed.
    Io(std::io::Error),
    /// A JSON document could not be encoded or decoded.
    Json(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "parse error: {}", msg),
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::MissingGeometry(msg) => write!(f, "missing geometry: {}", msg),
            Self::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
