//! In-memory snapshots for every cell of a notebook.
//!
//! The reducer is pure; something still has to hold the latest snapshot per
//! cell and feed each message to the right one. `CellStore` does that for
//! hosts that don't need anything fancier. Cells are kept in insertion order
//! so iteration matches the notebook layout they were registered in.
//!
//! Messages for one cell must be applied in the order the kernel emitted
//! them. The store does not reorder or deduplicate.

use std::collections::HashMap;

use log::{debug, warn};

use crate::cell::CellState;
use crate::console::{ChannelCoalescer, ConsoleCoalescer};
use crate::error::{CellStateError, CellStateResult};
use crate::message::CellMessage;
use crate::outline::{HeadingOutline, OutlineExtractor};
use crate::transition::CellReducer;

pub struct CellStore<C = ChannelCoalescer, O = HeadingOutline> {
    reducer: CellReducer<C, O>,
    cells: HashMap<String, CellState>,
    order: Vec<String>,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new(CellReducer::new())
    }
}

impl<C, O> CellStore<C, O>
where
    C: ConsoleCoalescer,
    O: OutlineExtractor,
{
    pub fn new(reducer: CellReducer<C, O>) -> Self {
        Self {
            reducer,
            cells: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a cell. Re-registering an existing id replaces its code only.
    pub fn add_cell(&mut self, cell_id: impl Into<String>, code: impl Into<String>) -> &CellState {
        let cell_id = cell_id.into();
        let code = code.into();
        if !self.cells.contains_key(&cell_id) {
            self.order.push(cell_id.clone());
        }
        let next = match self.cells.get(&cell_id) {
            Some(existing) => existing.with_code(code),
            None => CellState::new(code),
        };
        self.cells.insert(cell_id.clone(), next);
        &self.cells[&cell_id]
    }

    pub fn remove_cell(&mut self, cell_id: &str) -> Option<CellState> {
        let removed = self.cells.remove(cell_id)?;
        self.order.retain(|id| id != cell_id);
        Some(removed)
    }

    pub fn get(&self, cell_id: &str) -> Option<&CellState> {
        self.cells.get(cell_id)
    }

    pub fn contains(&self, cell_id: &str) -> bool {
        self.cells.contains_key(cell_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Cells in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellState)> {
        self.order
            .iter()
            .filter_map(|id| self.cells.get(id).map(|cell| (id.as_str(), cell)))
    }

    /// Update a cell's code from the editor.
    pub fn edit_code(&mut self, cell_id: &str, code: impl Into<String>) -> CellStateResult<&CellState> {
        self.replace_with(cell_id, |_, cell| cell.with_code(code))
    }

    /// Mark a cell's current code as submitted to the kernel.
    pub fn submit(&mut self, cell_id: &str) -> CellStateResult<&CellState> {
        self.replace_with(cell_id, |reducer, cell| reducer.prepare_for_execution(cell))
    }

    /// Apply a message to the cell it addresses.
    pub fn apply(&mut self, message: &CellMessage) -> CellStateResult<&CellState> {
        message.validate()?;
        debug!(
            "Applying message to cell {} (status: {:?})",
            message.cell_id, message.status
        );
        self.replace_with(&message.cell_id, |reducer, cell| {
            reducer.transition(cell, message)
        })
    }

    /// Decode a JSON message and apply it.
    ///
    /// Malformed messages, including ones with an unknown status, leave every
    /// cell untouched.
    pub fn apply_json(&mut self, json: &str) -> CellStateResult<&CellState> {
        let message = CellMessage::from_json(json)?;
        self.apply(&message)
    }

    fn replace_with<F>(&mut self, cell_id: &str, f: F) -> CellStateResult<&CellState>
    where
        F: FnOnce(&CellReducer<C, O>, &CellState) -> CellState,
    {
        let Some(cell) = self.cells.get_mut(cell_id) else {
            warn!("No cell registered with id {}", cell_id);
            return Err(CellStateError::UnknownCell(cell_id.to_string()));
        };
        *cell = f(&self.reducer, cell);
        Ok(&*cell)
    }
}
