//! Execution messages sent by the kernel for a single cell.
//!
//! On the wire a message looks like:
//!
//! ```json
//! {
//!   "cell_id": "Hbol",
//!   "status": "running",
//!   "output": {"channel": "output", "mimetype": "text/html", "data": "<h1>Hi</h1>"},
//!   "console": {"channel": "stdout", "mimetype": "text/plain", "data": "hi\n"},
//!   "timestamp": 1712345678.25
//! }
//! ```
//!
//! - `status`, `output`, `console` and `timestamp` may be omitted or `null`
//! - `output` may be the string `"clear"` to drop the current output
//! - `console` is a single fragment to append, or an array that replaces the
//!   console (`[]` clears it)
//!
//! [`RawCellMessage`] mirrors that shape. Converting it into a
//! [`CellMessage`] validates the status and the timestamp once, so the
//! reducer only ever sees well-formed intents.

use log::error;
use serde::Deserialize;

use crate::console::ConsoleUpdate;
use crate::error::CellStateError;
use crate::output::{CellOutput, RawCellOutput};
use crate::status::RunStatus;

/// What a message asks to do with a cell's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OutputUpdate {
    #[default]
    Unchanged,
    Clear,
    Set(CellOutput),
}

impl OutputUpdate {
    /// The new payload, if the message carries one.
    pub fn payload(&self) -> Option<&CellOutput> {
        match self {
            OutputUpdate::Set(output) => Some(output),
            _ => None,
        }
    }

    pub fn apply(&self, current: Option<CellOutput>) -> Option<CellOutput> {
        match self {
            OutputUpdate::Unchanged => current,
            OutputUpdate::Clear => None,
            OutputUpdate::Set(output) => Some(output.clone()),
        }
    }
}

/// A validated execution message.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMessage {
    pub cell_id: String,
    pub status: Option<RunStatus>,
    pub output: OutputUpdate,
    pub console: ConsoleUpdate,
    /// Kernel wall-clock time in seconds.
    pub timestamp: Option<f64>,
}

impl CellMessage {
    /// A message that changes nothing.
    pub fn new(cell_id: impl Into<String>) -> Self {
        Self {
            cell_id: cell_id.into(),
            status: None,
            output: OutputUpdate::Unchanged,
            console: ConsoleUpdate::Unchanged,
            timestamp: None,
        }
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_output(mut self, output: CellOutput) -> Self {
        self.output = OutputUpdate::Set(output);
        self
    }

    pub fn clearing_output(mut self) -> Self {
        self.output = OutputUpdate::Clear;
        self
    }

    pub fn with_console(mut self, console: ConsoleUpdate) -> Self {
        self.console = console;
        self
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check that the message carries a timestamp whenever run timing depends on it.
    pub fn validate(&self) -> Result<(), CellStateError> {
        if self.timestamp.is_some() {
            return Ok(());
        }
        match self.status {
            Some(status) if status.requires_timestamp() => {
                Err(CellStateError::MissingTimestamp { status })
            }
            _ if self.output.payload().is_some_and(|o| o.is_error()) => {
                Err(CellStateError::MissingErrorTimestamp)
            }
            _ => Ok(()),
        }
    }

    /// Decode and validate a JSON message.
    pub fn from_json(json: &str) -> Result<Self, CellStateError> {
        let raw: RawCellMessage = serde_json::from_str(json)?;
        raw.try_into()
    }
}

/// Marker for `"output": "clear"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputClear {
    Clear,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOutput {
    Clear(OutputClear),
    Payload(RawCellOutput),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawConsole {
    Many(Vec<RawCellOutput>),
    One(RawCellOutput),
}

/// Message as received from the kernel, before validation.
///
/// `status` stays a plain string here so that an unknown value is reported
/// as a protocol mismatch rather than a generic JSON error.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCellMessage {
    pub cell_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<RawOutput>,
    #[serde(default)]
    pub console: Option<RawConsole>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl TryFrom<RawCellMessage> for CellMessage {
    type Error = CellStateError;

    fn try_from(raw: RawCellMessage) -> Result<Self, Self::Error> {
        let status = match raw.status.as_deref() {
            None => None,
            Some(s) => match s.parse::<RunStatus>() {
                Ok(status) => Some(status),
                Err(e) => {
                    error!("Rejecting message for cell {}: {}", raw.cell_id, e);
                    return Err(e);
                }
            },
        };

        let output = match raw.output {
            None => OutputUpdate::Unchanged,
            Some(RawOutput::Clear(_)) => OutputUpdate::Clear,
            Some(RawOutput::Payload(payload)) => OutputUpdate::Set(payload.try_into()?),
        };

        let console = match raw.console {
            None => ConsoleUpdate::Unchanged,
            Some(RawConsole::Many(fragments)) if fragments.is_empty() => ConsoleUpdate::Clear,
            Some(RawConsole::Many(fragments)) => ConsoleUpdate::Replace(
                fragments
                    .into_iter()
                    .map(CellOutput::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Some(RawConsole::One(fragment)) => ConsoleUpdate::Append(fragment.try_into()?),
        };

        let message = CellMessage {
            cell_id: raw.cell_id,
            status,
            output,
            console,
            timestamp: raw.timestamp,
        };

        if let Err(e) = message.validate() {
            error!("Rejecting message for cell {}: {}", message.cell_id, e);
            return Err(e);
        }
        Ok(message)
    }
}

/// Deserialize through [`RawCellMessage`] so validation always runs.
impl<'de> Deserialize<'de> for CellMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawCellMessage::deserialize(deserializer)?;
        CellMessage::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputChannel, OutputData, ERROR_MIMETYPE};

    #[test]
    fn test_decode_status_only() {
        let msg = CellMessage::from_json(r#"{"cell_id": "a", "status": "queued"}"#).unwrap();
        assert_eq!(msg.cell_id, "a");
        assert_eq!(msg.status, Some(RunStatus::Queued));
        assert_eq!(msg.output, OutputUpdate::Unchanged);
        assert_eq!(msg.console, ConsoleUpdate::Unchanged);
        assert_eq!(msg.timestamp, None);
    }

    #[test]
    fn test_decode_nulls_mean_unchanged() {
        let msg = CellMessage::from_json(
            r#"{"cell_id": "a", "status": null, "output": null, "console": null, "timestamp": 3.0}"#,
        )
        .unwrap();
        assert_eq!(msg.status, None);
        assert_eq!(msg.output, OutputUpdate::Unchanged);
        assert_eq!(msg.console, ConsoleUpdate::Unchanged);
    }

    #[test]
    fn test_decode_output_clear() {
        let msg = CellMessage::from_json(r#"{"cell_id": "a", "output": "clear"}"#).unwrap();
        assert_eq!(msg.output, OutputUpdate::Clear);
    }

    #[test]
    fn test_decode_console_shapes() {
        let append = CellMessage::from_json(
            r#"{"cell_id": "a", "console": {"channel": "stdout", "mimetype": "text/plain", "data": "x"}}"#,
        )
        .unwrap();
        assert_eq!(
            append.console,
            ConsoleUpdate::Append(CellOutput::text(OutputChannel::Stdout, "x"))
        );

        let clear = CellMessage::from_json(r#"{"cell_id": "a", "console": []}"#).unwrap();
        assert_eq!(clear.console, ConsoleUpdate::Clear);

        let replace = CellMessage::from_json(
            r#"{"cell_id": "a", "console": [{"channel": "stderr", "mimetype": "text/plain", "data": "e"}]}"#,
        )
        .unwrap();
        assert_eq!(
            replace.console,
            ConsoleUpdate::Replace(vec![CellOutput::text(OutputChannel::Stderr, "e")])
        );
    }

    #[test]
    fn test_decode_error_output() {
        let json = format!(
            r#"{{"cell_id": "a", "timestamp": 2.0, "output": {{"channel": "marimo-error", "mimetype": "{}", "data": [{{"type": "interruption"}}]}}}}"#,
            ERROR_MIMETYPE
        );
        let msg = CellMessage::from_json(&json).unwrap();
        let output = msg.output.payload().unwrap();
        assert!(output.is_error());
        assert!(matches!(output.data, OutputData::Errors(ref e) if e.len() == 1));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = CellMessage::from_json(r#"{"cell_id": "a", "status": "exploded"}"#).unwrap_err();
        assert!(matches!(err, CellStateError::UnknownStatus(ref s) if s == "exploded"));
    }

    #[test]
    fn test_running_requires_timestamp() {
        let err = CellMessage::from_json(r#"{"cell_id": "a", "status": "running"}"#).unwrap_err();
        assert!(matches!(
            err,
            CellStateError::MissingTimestamp {
                status: RunStatus::Running
            }
        ));
        assert_eq!(
            err.to_string(),
            "Message for status running is missing a timestamp"
        );
    }

    #[test]
    fn test_error_output_requires_timestamp() {
        let msg = CellMessage::new("a").with_output(CellOutput::errors(vec![]));
        let err = msg.validate().unwrap_err();
        assert!(matches!(err, CellStateError::MissingErrorTimestamp));
        assert_eq!(err.to_string(), "Error output is missing a timestamp");
        assert!(msg.at(1.0).validate().is_ok());
    }

    #[test]
    fn test_serde_deserialize_validates() {
        let result: Result<CellMessage, _> =
            serde_json::from_str(r#"{"cell_id": "a", "status": "idle"}"#);
        assert!(result.is_err());

        let msg: CellMessage =
            serde_json::from_str(r#"{"cell_id": "a", "status": "idle", "timestamp": 1}"#).unwrap();
        assert_eq!(msg.timestamp, Some(1.0));
    }

    #[test]
    fn test_missing_cell_id_is_json_error() {
        let err = CellMessage::from_json(r#"{"status": "idle"}"#).unwrap_err();
        assert!(matches!(err, CellStateError::Json(_)));
    }
}
