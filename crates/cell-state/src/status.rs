//! Run status reported by the kernel for a cell.
//!
//! The set of statuses is closed. Parsing an unrecognized value fails with
//! [`CellStateError::UnknownStatus`] so a kernel/frontend version mismatch is
//! caught at the decoding boundary instead of being folded into cell state.

use schemars::JsonSchema;
use ts_rs::TS;

use crate::error::CellStateError;

/// Execution status of a cell as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[ts(export)]
#[ts(type = "\"queued\" | \"running\" | \"idle\" | \"stale\" | \"disabled-transitively\"")]
pub enum RunStatus {
    /// Waiting for the kernel to pick the cell up.
    Queued,
    Running,
    /// Run finished (successfully or not).
    Idle,
    /// Code changed upstream; the cell's output is out of date.
    Stale,
    /// An ancestor is disabled, so this cell won't run.
    DisabledTransitively,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Queued,
        RunStatus::Running,
        RunStatus::Idle,
        RunStatus::Stale,
        RunStatus::DisabledTransitively,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Idle => "idle",
            RunStatus::Stale => "stale",
            RunStatus::DisabledTransitively => "disabled-transitively",
        }
    }

    /// Whether a message with this status must carry a timestamp.
    pub fn requires_timestamp(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Idle)
    }
}

// ── Serde ────────────────────────────────────────────────────────────

impl serde::Serialize for RunStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for RunStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── JSON Schema ─────────────────────────────────────────────────────

impl JsonSchema for RunStatus {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "RunStatus".into()
    }

    fn json_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "enum": ["queued", "running", "idle", "stale", "disabled-transitively"]
        })
    }
}

// ── Display / FromStr ───────────────────────────────────────────────

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = CellStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CellStateError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str() {
        assert_eq!("queued".parse::<RunStatus>().unwrap(), RunStatus::Queued);
        assert_eq!("idle".parse::<RunStatus>().unwrap(), RunStatus::Idle);
        assert_eq!(
            "disabled-transitively".parse::<RunStatus>().unwrap(),
            RunStatus::DisabledTransitively
        );
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let err = "busy".parse::<RunStatus>().unwrap_err();
        assert!(matches!(err, CellStateError::UnknownStatus(ref s) if s == "busy"));
        // Case matters on the wire
        assert!("Running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_display_matches_wire_name() {
        for status in RunStatus::ALL {
            assert_eq!(status.to_string().parse::<RunStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&RunStatus::DisabledTransitively).unwrap(),
            "\"disabled-transitively\""
        );
        assert_eq!(
            serde_json::from_str::<RunStatus>("\"running\"").unwrap(),
            RunStatus::Running
        );
        assert!(serde_json::from_str::<RunStatus>("\"exploded\"").is_err());
    }

    #[test]
    fn test_requires_timestamp() {
        assert!(RunStatus::Running.requires_timestamp());
        assert!(RunStatus::Idle.requires_timestamp());
        assert!(!RunStatus::Queued.requires_timestamp());
        assert!(!RunStatus::Stale.requires_timestamp());
    }
}
