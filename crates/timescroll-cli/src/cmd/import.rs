use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use timescroll_core::{Event, SqliteEventSource};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines file with one event object per line, or `-` for stdin.
    pub input: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    database: String,
    read: usize,
    inserted: usize,
    duplicates: usize,
}

/// Execute `tscroll import`.
///
/// Blank lines and lines starting with `#` are skipped. Events whose id is
/// already stored are counted as duplicates and left unchanged.
///
/// # Errors
///
/// Returns an error naming the first line that is not a valid event, or if
/// the input or the event store cannot be opened.
pub fn run_import(args: &ImportArgs, db_path: &Path, output: OutputMode) -> Result<()> {
    let events = if args.input.as_os_str() == "-" {
        parse_jsonl(io::stdin().lock())?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        parse_jsonl(BufReader::new(file))?
    };

    let mut store = SqliteEventSource::open(db_path)?;
    let inserted = store.insert_all(&events)?;
    let report = ImportReport {
        database: db_path.display().to_string(),
        read: events.len(),
        inserted,
        duplicates: events.len() - inserted,
    };
    tracing::info!(read = report.read, inserted, "import finished");

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}\t{}\t{}", r.read, r.inserted, r.duplicates),
        |r, w| {
            pretty_section(w, "Import")?;
            pretty_kv(w, "Database", &r.database)?;
            pretty_kv(w, "Read", r.read.to_string())?;
            pretty_kv(w, "Inserted", r.inserted.to_string())?;
            pretty_kv(w, "Duplicates", r.duplicates.to_string())
        },
    )
}

fn parse_jsonl(reader: impl BufRead) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("line {line_no}: not a valid event"))?;
        events.push(event);
    }
    Ok(events)
}
