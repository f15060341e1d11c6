//! Per-cell execution state for reactive notebook frontends.
//!
//! The kernel reports a cell's progress as a stream of small messages:
//! status changes, rendered output, streamed console text, and error
//! payloads. This crate folds those messages into a [`CellState`] snapshot
//! per cell so the frontend can render run status, timing, error flags,
//! console output, and a heading outline without re-deriving them.
//!
//! # Entry points
//!
//! - [`prepare_for_execution`]: call when a cell's code is submitted
//! - [`transition`] / [`CellReducer::transition`]: call once per kernel
//!   message, in the order the kernel sent them
//!
//! Both are pure: they take the previous snapshot by reference and return a
//! new one.
//!
//! ```
//! use cell_state::{prepare_for_execution, transition, CellMessage, CellState, RunStatus};
//!
//! let cell = prepare_for_execution(&CellState::new("print('hi')"));
//! let cell = transition(&cell, &CellMessage::new("c1").with_status(RunStatus::Running).at(10.0));
//! let cell = transition(&cell, &CellMessage::new("c1").with_status(RunStatus::Idle).at(10.25));
//! assert_eq!(cell.run_elapsed_time_ms, Some(250.0));
//! ```
//!
//! Messages from the kernel are decoded with [`CellMessage::from_json`],
//! which rejects unknown statuses and missing timestamps before they can
//! reach a snapshot. [`CellStore`] keeps the latest snapshot for every cell
//! of a notebook and routes messages by cell id.

pub mod cell;
pub mod console;
pub mod error;
pub mod message;
pub mod outline;
pub mod output;
pub mod settings;
pub mod status;
pub mod store;
pub mod transition;

pub use cell::CellState;
pub use console::{ChannelCoalescer, ConsoleCoalescer, ConsoleUpdate};
pub use error::{CellStateError, CellStateResult};
pub use message::{CellMessage, OutputUpdate, RawCellMessage};
pub use outline::{HeadingOutline, Outline, OutlineExtractor, OutlineItem, OutlineTarget};
pub use output::{
    CellError, CellOutput, ErrorKind, OutputChannel, OutputData, RunFailure, ERROR_MIMETYPE,
};
pub use settings::ReducerSettings;
pub use status::RunStatus;
pub use store::CellStore;
pub use transition::{prepare_for_execution, transition, CellReducer};
