//! Cell output payloads.
//!
//! Outputs arrive from the kernel as `{channel, mimetype, data, timestamp}`.
//! They are decoded once, through [`RawCellOutput`], into a [`CellOutput`]
//! whose `data` is already split by shape: plain text, structured JSON, or a
//! list of classified errors when the mimetype is [`ERROR_MIMETYPE`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::CellStateError;

/// Mimetype marking an output whose data is a list of cell errors.
pub const ERROR_MIMETYPE: &str = "application/vnd.marimo+error";

pub const TEXT_MIMETYPE: &str = "text/plain";
pub const HTML_MIMETYPE: &str = "text/html";
pub const MARKDOWN_MIMETYPE: &str = "text/markdown";

/// Channel an output was produced on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum OutputChannel {
    /// The cell's rendered result.
    #[default]
    Output,
    MarimoError,
    Media,
    /// Debugger session output.
    Pdb,
    Stdin,
    Stdout,
    Stderr,
}

impl OutputChannel {
    /// Console channels carry streamed fragments rather than a rendered result.
    pub fn is_console(&self) -> bool {
        matches!(
            self,
            OutputChannel::Stdout | OutputChannel::Stderr | OutputChannel::Stdin | OutputChannel::Pdb
        )
    }
}

// =============================================================================
// Error entries
// =============================================================================

/// The `type` discriminator of an entry in an error payload.
///
/// Unknown tags are kept in `Other` so they still render and still count as
/// a generic error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Interruption,
    AncestorStopped,
    Other(String),
}

impl Default for ErrorKind {
    fn default() -> Self {
        ErrorKind::Other(String::new())
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Interruption => write!(f, "interruption"),
            ErrorKind::AncestorStopped => write!(f, "ancestor-stopped"),
            ErrorKind::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "interruption" => ErrorKind::Interruption,
            "ancestor-stopped" => ErrorKind::AncestorStopped,
            _ => ErrorKind::Other(s.to_string()),
        })
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_default())
    }
}

/// One entry of an error payload.
///
/// Fields other than `type` (messages, tracebacks, cell references) are kept
/// verbatim in `detail` for renderers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellError {
    #[serde(rename = "type", default)]
    pub kind: ErrorKind,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl CellError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            detail: Map::new(),
        }
    }

    /// Attach a human-readable message.
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.detail.insert("msg".to_string(), Value::String(msg.into()));
        self
    }
}

/// How a run ended, as derived from an error payload.
///
/// Variants are mutually exclusive for a single payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFailure {
    Interrupted,
    StoppedByAncestor,
    Errored,
}

// =============================================================================
// Output payload
// =============================================================================

/// Decoded output data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputData {
    Text(String),
    Errors(Vec<CellError>),
    Json(Value),
}

impl OutputData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutputData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&[CellError]> {
        match self {
            OutputData::Errors(errors) => Some(errors),
            _ => None,
        }
    }
}

/// A rendered output or console fragment.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct CellOutput {
    pub channel: OutputChannel,
    pub mimetype: String,
    #[ts(type = "unknown")]
    pub data: OutputData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl CellOutput {
    /// A `text/plain` output on the given channel.
    pub fn text(channel: OutputChannel, text: impl Into<String>) -> Self {
        Self {
            channel,
            mimetype: TEXT_MIMETYPE.to_string(),
            data: OutputData::Text(text.into()),
            timestamp: None,
        }
    }

    /// A `text/html` output on the main output channel.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            channel: OutputChannel::Output,
            mimetype: HTML_MIMETYPE.to_string(),
            data: OutputData::Text(html.into()),
            timestamp: None,
        }
    }

    /// An error payload on the error channel.
    pub fn errors(errors: Vec<CellError>) -> Self {
        Self {
            channel: OutputChannel::MarimoError,
            mimetype: ERROR_MIMETYPE.to_string(),
            data: OutputData::Errors(errors),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn is_error(&self) -> bool {
        self.mimetype == ERROR_MIMETYPE
    }

    /// Classify an error payload.
    ///
    /// An interruption anywhere in the payload wins over an ancestor stop,
    /// which wins over any other error. Returns `None` for non-error outputs.
    pub fn failure(&self) -> Option<RunFailure> {
        let errors = self.data.errors()?;
        if errors.iter().any(|e| e.kind == ErrorKind::Interruption) {
            Some(RunFailure::Interrupted)
        } else if errors.iter().any(|e| e.kind == ErrorKind::AncestorStopped) {
            Some(RunFailure::StoppedByAncestor)
        } else {
            Some(RunFailure::Errored)
        }
    }
}

/// Output as it appears on the wire, before the data is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCellOutput {
    #[serde(default)]
    pub channel: OutputChannel,
    pub mimetype: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl TryFrom<RawCellOutput> for CellOutput {
    type Error = CellStateError;

    fn try_from(raw: RawCellOutput) -> Result<Self, Self::Error> {
        let data = if raw.mimetype == ERROR_MIMETYPE {
            if !raw.data.is_array() {
                return Err(CellStateError::InvalidOutput(format!(
                    "{} data must be an array, got {}",
                    ERROR_MIMETYPE, raw.data
                )));
            }
            OutputData::Errors(serde_json::from_value(raw.data)?)
        } else {
            match raw.data {
                Value::String(s) => OutputData::Text(s),
                other => OutputData::Json(other),
            }
        };

        Ok(CellOutput {
            channel: raw.channel,
            mimetype: raw.mimetype,
            data,
            timestamp: raw.timestamp,
        })
    }
}

impl<'de> Deserialize<'de> for CellOutput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawCellOutput::deserialize(deserializer)?;
        CellOutput::try_from(raw).map_err(serde::de::Error::custom)
    }
}
