#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use timescroll_core::{TimelineError, timing};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tscroll: browse events through time windows",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit a query timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Alias for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Event store to use instead of `.timescroll/events.sqlite3`.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Create the event store and a default config",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tscroll init\n\n    # Overwrite an existing config\n    tscroll init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Import events from a JSON Lines file",
        after_help = "EXAMPLES:\n    # Import one event object per line\n    tscroll import events.jsonl\n\n    # Read from stdin\n    cat events.jsonl | tscroll import -"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        about = "Show the events visible in a time window",
        after_help = "EXAMPLES:\n    # The month containing a date\n    tscroll browse --date 2024-05-14 --zoom month\n\n    # The following week, two extra pages, compact rows\n    tscroll browse --date 2024-05-14 --zoom week --step 1 --pages 2 --resolution 4\n\n    # An explicit range, scrolled down\n    tscroll browse --start 2024-05-01T00:00:00Z --end 2024-05-02T00:00:00Z --scroll-top 900"
    )]
    Browse(cmd::browse::BrowseArgs),

    #[command(
        about = "Remap a scroll offset across resolution levels",
        after_help = "EXAMPLES:\n    # Where to scroll after switching from level 0 to level 4\n    tscroll rescale --from 0 --to 4 --scroll-top 1200 --client-height 600"
    )]
    Rescale(cmd::rescale::RescaleArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TIMESCROLL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "timescroll=debug,info"
        } else {
            "timescroll=info,warn"
        })
    });

    let format = env::var("TIMESCROLL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| project_root.join(cmd::DEFAULT_DB_RELATIVE_PATH));
    let output = cli.output_mode();

    let command_result = match cli.command {
        Commands::Init(ref args) => timing::timed("cmd.init", || {
            cmd::init::run_init(args, &project_root, &db_path, output)
        }),
        Commands::Import(ref args) => timing::timed("cmd.import", || {
            cmd::import::run_import(args, &db_path, output)
        }),
        Commands::Browse(ref args) => timing::timed("cmd.browse", || {
            cmd::browse::run_browse(args, &project_root, &db_path, output)
        }),
        Commands::Rescale(ref args) => {
            timing::timed("cmd.rescale", || cmd::rescale::run_rescale(args, output))
        }
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.to_text());
        }
    }

    if let Err(err) = &command_result {
        if let Some(timeline_err) = err.downcast_ref::<TimelineError>() {
            output::render_error(output, &CliError::from(timeline_err))?;
            std::process::exit(1);
        }
    }

    command_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["tscroll", "--timing", "rescale", "--from", "0", "--to", "4"]);
        assert!(cli.timing);
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "tscroll",
            "browse",
            "--date",
            "2024-05-14",
            "--format",
            "json",
            "--db",
            "/tmp/x.sqlite3",
        ]);
        assert_eq!(cli.format, Some(OutputMode::Json));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.sqlite3")));
        assert!(matches!(cli.command, Commands::Browse(_)));
    }

    #[test]
    fn verify_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
