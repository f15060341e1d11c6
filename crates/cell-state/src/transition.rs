//! State transitions for a single cell.
//!
//! [`CellReducer::transition`] folds one kernel message into the previous
//! snapshot. The steps run in a fixed order, and later steps read what
//! earlier ones wrote:
//!
//! 1. status-specific effects (`queued`, `running`, `idle`)
//! 2. output and status assignment
//! 3. error classification of the new output
//! 4. console accumulation
//! 5. outline derivation from the resulting output
//!
//! [`prepare_for_execution`] runs once when the host submits a cell's code,
//! before the kernel reports anything about the run.

use log::debug;

use crate::cell::CellState;
use crate::console::{ChannelCoalescer, ConsoleCoalescer};
use crate::message::CellMessage;
use crate::outline::{HeadingOutline, OutlineExtractor};
use crate::output::RunFailure;
use crate::settings::ReducerSettings;
use crate::status::RunStatus;

/// Milliseconds between a run's start and `now`, both in kernel seconds.
///
/// `None` if the run never recorded a start.
pub fn elapsed_ms(start: Option<f64>, now: Option<f64>) -> Option<f64> {
    Some((now? - start?) * 1000.0)
}

/// Applies kernel messages to cell snapshots.
///
/// Holds the console coalescer and outline extractor the transitions
/// delegate to; it keeps no per-cell state.
#[derive(Debug, Clone, Default)]
pub struct CellReducer<C = ChannelCoalescer, O = HeadingOutline> {
    coalescer: C,
    outline: O,
}

impl CellReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default reducer from settings.
    pub fn from_settings(settings: &ReducerSettings) -> Self {
        Self {
            coalescer: ChannelCoalescer::new(settings.max_console_lines),
            outline: HeadingOutline::new(settings.max_outline_level),
        }
    }
}

impl<C, O> CellReducer<C, O>
where
    C: ConsoleCoalescer,
    O: OutlineExtractor,
{
    pub fn with_collaborators(coalescer: C, outline: O) -> Self {
        Self { coalescer, outline }
    }

    pub fn outline_extractor(&self) -> &O {
        &self.outline
    }

    /// Produce the snapshot that follows `previous` once `message` is applied.
    pub fn transition(&self, previous: &CellState, message: &CellMessage) -> CellState {
        let mut next = previous.clone();

        match message.status {
            Some(RunStatus::Queued) => {
                // last_code_run is left alone: the kernel queues whatever code
                // was registered with it, which may differ from the editor.
                next.interrupted = false;
                next.errored = false;
            }
            Some(RunStatus::Running) => {
                if previous.stopped {
                    next.output = None;
                }
                next.stopped = false;
                next.run_start_timestamp = message.timestamp;
            }
            Some(RunStatus::Idle) => {
                if previous.run_start_timestamp.is_some() {
                    next.run_elapsed_time_ms =
                        elapsed_ms(previous.run_start_timestamp, message.timestamp);
                    next.run_start_timestamp = None;
                }
            }
            // Already consistent from prepare_for_execution.
            Some(RunStatus::Stale) | Some(RunStatus::DisabledTransitively) => {}
            None => {}
        }

        next.output = message.output.apply(next.output);
        next.status = message.status.or(previous.status);

        if let Some(failure) = message.output.payload().and_then(|o| o.failure()) {
            debug!("Cell {} run ended: {:?}", message.cell_id, failure);
            match failure {
                RunFailure::Interrupted => {
                    // Force a re-run even if the code is unchanged.
                    next.last_code_run = None;
                    next.interrupted = true;
                }
                RunFailure::StoppedByAncestor => {
                    next.stopped = true;
                    next.run_elapsed_time_ms =
                        elapsed_ms(previous.run_start_timestamp, message.timestamp);
                }
                RunFailure::Errored => {
                    next.errored = true;
                    next.run_elapsed_time_ms =
                        elapsed_ms(previous.run_start_timestamp, message.timestamp);
                }
            }
        }

        if !message.console.is_unchanged() {
            next.console_outputs = message
                .console
                .apply(&previous.console_outputs, &self.coalescer);
        }

        next.outline = self.outline.extract(next.output.as_ref());
        next
    }

    /// Reset the fields that must not leak from the previous run.
    pub fn prepare_for_execution(&self, previous: &CellState) -> CellState {
        prepare_for_execution(previous)
    }
}

/// Apply one message with the default reducer.
pub fn transition(previous: &CellState, message: &CellMessage) -> CellState {
    CellReducer::new().transition(previous, message)
}

/// Called when a cell's code is registered with the kernel for execution.
///
/// Status, output, console and `stopped` are left for later messages to
/// reconcile.
pub fn prepare_for_execution(previous: &CellState) -> CellState {
    CellState {
        interrupted: false,
        errored: false,
        edited: false,
        run_elapsed_time_ms: None,
        last_code_run: Some(previous.code.trim().to_string()),
        ..previous.clone()
    }
}
