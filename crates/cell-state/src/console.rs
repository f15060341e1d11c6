//! Console output accumulation.
//!
//! The kernel streams stdout/stderr to the frontend as many small fragments.
//! A message either leaves the console alone, clears it, replaces it
//! outright, or appends one fragment. Appended fragments are passed through a
//! [`ConsoleCoalescer`] so adjacent chunks from the same stream collapse into
//! one entry instead of growing the list without bound.

use crate::output::{CellOutput, OutputData, TEXT_MIMETYPE};

/// What a message asks to do with a cell's console outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConsoleUpdate {
    #[default]
    Unchanged,
    Clear,
    Append(CellOutput),
    Replace(Vec<CellOutput>),
}

impl ConsoleUpdate {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ConsoleUpdate::Unchanged)
    }

    /// Compute the next console outputs from the current ones.
    pub fn apply<C>(&self, current: &[CellOutput], coalescer: &C) -> Vec<CellOutput>
    where
        C: ConsoleCoalescer + ?Sized,
    {
        match self {
            ConsoleUpdate::Unchanged => current.to_vec(),
            ConsoleUpdate::Clear => Vec::new(),
            ConsoleUpdate::Replace(outputs) => outputs.clone(),
            ConsoleUpdate::Append(fragment) => {
                let mut outputs = Vec::with_capacity(current.len() + 1);
                outputs.extend_from_slice(current);
                outputs.push(fragment.clone());
                coalescer.coalesce(outputs)
            }
        }
    }
}

/// Merges streamed console fragments.
///
/// Implementations must preserve relative order and be idempotent when
/// applied to their own output.
pub trait ConsoleCoalescer {
    fn coalesce(&self, outputs: Vec<CellOutput>) -> Vec<CellOutput>;
}

/// Merges adjacent `text/plain` fragments written to the same channel.
///
/// Carriage returns inside a line keep only the text written after the last
/// one, so progress bars show their final state. With `max_lines` set, each
/// merged fragment keeps only its trailing lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCoalescer {
    pub max_lines: Option<usize>,
}

impl ChannelCoalescer {
    pub fn new(max_lines: Option<usize>) -> Self {
        Self { max_lines }
    }
}

impl ConsoleCoalescer for ChannelCoalescer {
    fn coalesce(&self, outputs: Vec<CellOutput>) -> Vec<CellOutput> {
        let mut merged: Vec<CellOutput> = Vec::with_capacity(outputs.len());

        for output in outputs {
            if let Some(last) = merged.last_mut() {
                if can_merge(last, &output) {
                    if let (OutputData::Text(acc), OutputData::Text(next)) =
                        (&mut last.data, &output.data)
                    {
                        acc.push_str(next);
                        last.timestamp = output.timestamp.or(last.timestamp);
                        continue;
                    }
                }
            }
            merged.push(output);
        }

        for output in &mut merged {
            if output.mimetype != TEXT_MIMETYPE {
                continue;
            }
            if let OutputData::Text(text) = &mut output.data {
                let mut next = collapse_carriage_returns(text);
                if let Some(max_lines) = self.max_lines {
                    next = tail_lines(&next, max_lines);
                }
                *text = next;
            }
        }

        merged
    }
}

fn can_merge(a: &CellOutput, b: &CellOutput) -> bool {
    a.channel == b.channel
        && a.mimetype == b.mimetype
        && a.mimetype == TEXT_MIMETYPE
        && matches!(
            (&a.data, &b.data),
            (OutputData::Text(_), OutputData::Text(_))
        )
}

/// Within each line, drop text overwritten by a later `\r`.
///
/// A trailing `\r` is kept so a following fragment can still overwrite the
/// line once it arrives.
fn collapse_carriage_returns(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        let segments: Vec<&str> = body.split('\r').collect();
        match segments.as_slice() {
            [.., before, last] if last.is_empty() => {
                result.push_str(before);
                result.push('\r');
            }
            [.., last] => result.push_str(last),
            [] => {}
        }
        result.push_str(newline);
    }
    result
}

fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    lines[lines.len() - max_lines..].concat()
}
