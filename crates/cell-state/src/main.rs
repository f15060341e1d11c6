//! cell-replay: fold a recorded kernel message stream into cell snapshots.
//!
//! Reads one JSON message per line (from a file or stdin), applies them in
//! order, and prints the resulting snapshot of every cell as JSON. Useful for
//! reproducing frontend state from a captured session.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use anyhow::Context;
use cell_state::settings::{load_settings, load_settings_from, settings_schema};
use cell_state::{CellMessage, CellReducer, CellStore};
use clap::{Parser, Subcommand};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cell-replay")]
#[command(about = "Replay kernel execution messages into cell state snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines message log (default: stdin)
    Replay {
        /// Message log to read
        input: Option<PathBuf>,

        /// Settings file (default: ~/.config/cell-state/settings.json)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Stop at the first malformed message instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Print the JSON schema of the settings file
    Schema,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        None => replay(None, None, false),
        Some(Commands::Replay {
            input,
            settings,
            strict,
        }) => replay(input, settings, strict),
        Some(Commands::Schema) => {
            println!("{}", serde_json::to_string_pretty(&settings_schema())?);
            Ok(())
        }
    }
}

fn replay(input: Option<PathBuf>, settings: Option<PathBuf>, strict: bool) -> anyhow::Result<()> {
    let settings = match settings {
        Some(path) => load_settings_from(&path)?,
        None => load_settings(),
    };
    let mut store = CellStore::new(CellReducer::from_settings(&settings));

    let reader: Box<dyn Read> = match &input {
        Some(path) => Box::new(
            std::fs::File::open(path).with_context(|| format!("failed to open {:?}", path))?,
        ),
        None => Box::new(std::io::stdin()),
    };

    let mut applied = 0usize;
    let mut skipped = 0usize;
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let message = match CellMessage::from_json(&line) {
            Ok(message) => message,
            Err(e) if strict => {
                return Err(e).with_context(|| format!("line {}", index + 1));
            }
            Err(e) => {
                warn!("Skipping line {}: {}", index + 1, e);
                skipped += 1;
                continue;
            }
        };

        // Recorded logs don't include the editor, so cells appear on first message.
        if !store.contains(&message.cell_id) {
            store.add_cell(message.cell_id.clone(), String::new());
        }
        store.apply(&message)?;
        applied += 1;
    }

    info!(
        "Applied {} messages to {} cells ({} skipped)",
        applied,
        store.len(),
        skipped
    );

    let snapshots: serde_json::Map<String, serde_json::Value> = store
        .iter()
        .map(|(id, cell)| serde_json::to_value(cell).map(|value| (id.to_string(), value)))
        .collect::<Result<_, serde_json::Error>>()?;
    println!("{}", serde_json::to_string_pretty(&snapshots)?);
    Ok(())
}
