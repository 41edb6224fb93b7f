use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use timescroll_core::config::CONFIG_RELATIVE_PATH;
use timescroll_core::source::sqlite::LATEST_SCHEMA_VERSION;
use timescroll_core::SqliteEventSource;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.timescroll/config.toml`.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[cache]\n\
    max_entries = 5\n\
    \n\
    [pagination]\n\
    page_size = 100\n\
    max_loaded = 500\n\
    \n\
    [viewport]\n\
    buffer = 5\n\
    default_resolution = 2\n\
    prefetch_upper_fraction = 0.2\n\
    prefetch_lower_fraction = 0.8\n\
    drag_threshold_px = 500.0\n\
    drag_hold_ms = 300\n";

#[derive(Debug, Serialize)]
struct InitReport {
    config: String,
    config_written: bool,
    database: String,
    events: usize,
    schema_version: u32,
}

/// Execute `tscroll init`: write the default config (unless present) and
/// create or migrate the event store.
///
/// # Errors
///
/// Returns an error if a directory, the config file, or the database cannot
/// be created.
pub fn run_init(args: &InitArgs, project_root: &Path, db_path: &Path, output: OutputMode) -> Result<()> {
    let config_path = project_root.join(CONFIG_RELATIVE_PATH);
    let config_written = if config_path.exists() && !args.force {
        if !output.is_json() {
            eprintln!(
                "Note: {} already exists; leaving it untouched (use --force to overwrite).",
                config_path.display()
            );
        }
        false
    } else {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        true
    };

    let store = SqliteEventSource::open(db_path)?;
    let report = InitReport {
        config: config_path.display().to_string(),
        config_written,
        database: db_path.display().to_string(),
        events: store.count()?,
        schema_version: LATEST_SCHEMA_VERSION,
    };
    tracing::info!(database = %report.database, events = report.events, "event store ready");

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}\t{}", r.database, r.events),
        |r, w| {
            pretty_section(w, "Initialized timescroll")?;
            pretty_kv(w, "Config", &r.config)?;
            pretty_kv(w, "Database", &r.database)?;
            pretty_kv(w, "Schema", format!("v{}", r.schema_version))?;
            pretty_kv(w, "Events", r.events.to_string())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use timescroll_core::config::{TimelineConfig, load_project_config};

    #[test]
    fn template_matches_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_RELATIVE_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, CONFIG_TOML).unwrap();
        assert_eq!(load_project_config(dir.path()).unwrap(), TimelineConfig::default());
    }

    #[test]
    fn init_writes_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("store/events.sqlite3");
        run_init(&InitArgs { force: false }, dir.path(), &db, OutputMode::Json).unwrap();
        assert!(dir.path().join(CONFIG_RELATIVE_PATH).is_file());
        assert!(db.is_file());

        std::fs::write(dir.path().join(CONFIG_RELATIVE_PATH), "# custom\n").unwrap();
        run_init(&InitArgs { force: false }, dir.path(), &db, OutputMode::Json).unwrap();
        let kept = std::fs::read_to_string(dir.path().join(CONFIG_RELATIVE_PATH)).unwrap();
        assert_eq!(kept, "# custom\n");
    }
}
