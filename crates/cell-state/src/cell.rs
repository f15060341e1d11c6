//! The per-cell execution snapshot.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::outline::Outline;
use crate::output::CellOutput;
use crate::status::RunStatus;

/// Execution state of one notebook cell.
///
/// Snapshots are values: the reducer never mutates one in place, it builds
/// the next snapshot from the previous one with struct update syntax so any
/// field a transition does not name is carried over unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CellState {
    /// Current source text, owned by the editor.
    pub code: String,
    /// Trimmed code as of the last submission. `None` forces a re-run.
    pub last_code_run: Option<String>,
    pub status: Option<RunStatus>,
    pub output: Option<CellOutput>,
    #[serde(default)]
    pub console_outputs: Vec<CellOutput>,
    /// Derived from `output`, never set directly.
    pub outline: Option<Outline>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub errored: bool,
    #[serde(default)]
    pub stopped: bool,
    /// Kernel wall-clock seconds at which the current run started.
    pub run_start_timestamp: Option<f64>,
    pub run_elapsed_time_ms: Option<f64>,
}

impl CellState {
    /// A freshly added cell that has never run.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    /// Replace the cell's code, tracking whether it diverges from the last run.
    pub fn with_code(&self, code: impl Into<String>) -> Self {
        let code = code.into();
        let edited = self.last_code_run.as_deref() != Some(code.trim());
        Self {
            code,
            edited,
            ..self.clone()
        }
    }

    /// Whether the current code has to be submitted to bring output up to date.
    pub fn needs_run(&self) -> bool {
        self.last_code_run.as_deref() != Some(self.code.trim())
    }

    pub fn is_running(&self) -> bool {
        self.status == Some(RunStatus::Running)
    }
}
