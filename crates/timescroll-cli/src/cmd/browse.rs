use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use timescroll_core::config::load_project_config;
use timescroll_core::model::truncate_preview;
use timescroll_core::{Event, Resolution, SqliteEventSource, TimeRange, TimelineController, Zoom};

use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

/// Preview width in pretty rows.
const PRETTY_PREVIEW_CHARS: usize = 48;

#[derive(Args, Debug)]
pub struct BrowseArgs {
    /// Any date inside the window to show (YYYY-MM-DD).
    #[arg(long, required_unless_present = "start", conflicts_with = "start")]
    pub date: Option<NaiveDate>,

    /// Window granularity: year, month, week, or day.
    #[arg(long, default_value = "month")]
    pub zoom: Zoom,

    /// Move this many windows forward (negative: backward) from `--date`.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true, requires = "date")]
    pub step: i32,

    /// Explicit range start (RFC 3339).
    #[arg(long, requires = "end")]
    pub start: Option<DateTime<Utc>>,

    /// Explicit range end, exclusive (RFC 3339).
    #[arg(long, requires = "start")]
    pub end: Option<DateTime<Utc>>,

    /// Density level 0 (most detailed) to 4 (most compact). Defaults to config.
    #[arg(long)]
    pub resolution: Option<u8>,

    /// Viewport scroll offset in pixels.
    #[arg(long, default_value_t = 0.0)]
    pub scroll_top: f64,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 600.0)]
    pub client_height: f64,

    /// Extra forward pages to load after the first.
    #[arg(long, default_value_t = 0)]
    pub pages: usize,
}

#[derive(Debug, Serialize)]
struct BrowseReport<'a> {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    zoom: Zoom,
    resolution: Resolution,
    item_height: f64,
    total: usize,
    loaded: usize,
    offset_cursor: usize,
    has_more: bool,
    window: WindowReport,
    anchor: Option<&'a str>,
    events: Vec<EventRow<'a>>,
}

#[derive(Debug, Serialize)]
struct WindowReport {
    first: usize,
    end: usize,
    offset_top: f64,
    total_height: f64,
}

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    index: usize,
    #[serde(flatten)]
    event: &'a Event,
}

/// Execute `tscroll browse`.
///
/// # Errors
///
/// Returns an error if the range is invalid, the event store is missing, or
/// a fetch fails.
pub fn run_browse(
    args: &BrowseArgs,
    project_root: &Path,
    db_path: &Path,
    output: OutputMode,
) -> Result<()> {
    let config = load_project_config(project_root)?;
    let resolution = match args.resolution {
        Some(level) => Resolution::new(level)?,
        None => config.viewport.default_resolution,
    };
    let range = resolve_range(args)?;

    if !db_path.exists() {
        bail!(
            "No event store at {}. Run `tscroll init` first.",
            db_path.display()
        );
    }
    let store = SqliteEventSource::open(db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    let mut timeline = TimelineController::new(store, &config);
    timeline.set_zoom(args.zoom)?;
    timeline.set_resolution(resolution);
    timeline.set_range(range)?;
    for _ in 0..args.pages {
        if !timeline.has_more() {
            break;
        }
        timeline.load_more()?;
    }

    let window = timeline.get_visible_window(args.scroll_top, args.client_height);
    let report = BrowseReport {
        start: range.start(),
        end: range.end(),
        zoom: args.zoom,
        resolution,
        item_height: window.item_height,
        total: timeline.total(),
        loaded: timeline.events().len(),
        offset_cursor: timeline.offset_cursor(),
        has_more: timeline.has_more(),
        window: WindowReport {
            first: window.range.start,
            end: window.range.end,
            offset_top: window.offset_top,
            total_height: window.total_height,
        },
        anchor: timeline
            .anchor(args.scroll_top, args.client_height)
            .map(|event| event.id.as_str()),
        events: window
            .events
            .iter()
            .enumerate()
            .map(|(i, event)| EventRow {
                index: window.range.start + i,
                event,
            })
            .collect(),
    };

    render_mode(output, &report, write_text, write_pretty)
}

fn resolve_range(args: &BrowseArgs) -> Result<TimeRange> {
    if let (Some(start), Some(end)) = (args.start, args.end) {
        return Ok(TimeRange::new(start, end)?);
    }
    let date = args
        .date
        .ok_or_else(|| anyhow!("pass --date, or both --start and --end"))?;
    let instant = date
        .and_hms_opt(0, 0, 0)
        .context("midnight is always valid")?
        .and_utc();
    let base = TimeRange::containing(instant, args.zoom)
        .ok_or_else(|| anyhow!("no {} window contains {date}", args.zoom))?;
    if args.step == 0 {
        return Ok(base);
    }
    base.step(args.zoom, args.step)
        .ok_or_else(|| anyhow!("stepping {} windows from {date} leaves the calendar", args.step))
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn write_text(report: &BrowseReport<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\tloaded={}\ttotal={}\thas_more={}",
        report.start.to_rfc3339(),
        report.end.to_rfc3339(),
        report.zoom,
        report.loaded,
        report.total,
        report.has_more
    )?;
    for row in &report.events {
        let event = row.event;
        match event.count {
            Some(count) => writeln!(w, "{}\t{}\t{count}", row.index, event.thread_label)?,
            None => writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                row.index,
                event.created_at.to_rfc3339(),
                event.role,
                event.thread_label,
                one_line(&event.content_preview)
            )?,
        }
    }
    Ok(())
}

fn write_pretty(report: &BrowseReport<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(
        w,
        &format!(
            "{} window {} .. {}",
            report.zoom,
            report.start.format("%Y-%m-%d %H:%M"),
            report.end.format("%Y-%m-%d %H:%M")
        ),
    )?;
    pretty_kv(w, "Resolution", format!("{} ({}px rows)", report.resolution, report.item_height))?;
    pretty_kv(w, "Loaded", format!("{} of {}", report.loaded, report.total))?;
    pretty_kv(w, "More", if report.has_more { "yes" } else { "no" })?;
    pretty_kv(
        w,
        "Rows",
        format!("{}..{} at {}px", report.window.first, report.window.end, report.window.offset_top),
    )?;
    if let Some(anchor) = report.anchor {
        pretty_kv(w, "Anchor", anchor)?;
    }
    pretty_rule(w)?;

    if report.events.is_empty() {
        return writeln!(w, "(no events)");
    }
    for row in &report.events {
        let event = row.event;
        if event.is_aggregate() {
            writeln!(
                w,
                "{:>5}  {:<7}  {}",
                row.index, event.thread_label, event.content_preview
            )?;
            continue;
        }
        let who = event.user_name.as_deref().unwrap_or(&event.user_id);
        writeln!(
            w,
            "{:>5}  {}  {:<9}  {:<16}  {}",
            row.index,
            event.created_at.format("%Y-%m-%d %H:%M"),
            event.role,
            truncate_preview(&format!("{who} / {}", event.thread_label), 16),
            truncate_preview(&one_line(&event.content_preview), PRETTY_PREVIEW_CHARS)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(date: &str, zoom: Zoom, step: i32) -> BrowseArgs {
        BrowseArgs {
            date: Some(date.parse().unwrap()),
            zoom,
            step,
            start: None,
            end: None,
            resolution: None,
            scroll_top: 0.0,
            client_height: 600.0,
            pages: 0,
        }
    }

    #[test]
    fn date_resolves_to_zoom_window() {
        let range = resolve_range(&args("2024-05-14", Zoom::Week, 0)).unwrap();
        assert_eq!(range.start().to_rfc3339(), "2024-05-13T00:00:00+00:00");
        assert_eq!(range.end().to_rfc3339(), "2024-05-20T00:00:00+00:00");
    }

    #[test]
    fn step_moves_whole_windows() {
        let range = resolve_range(&args("2024-05-14", Zoom::Month, -1)).unwrap();
        assert_eq!(range.start().to_rfc3339(), "2024-04-01T00:00:00+00:00");
    }

    #[test]
    fn explicit_range_is_validated() {
        let mut a = args("2024-05-14", Zoom::Day, 0);
        a.date = None;
        a.start = Some("2024-05-02T00:00:00Z".parse().unwrap());
        a.end = Some("2024-05-01T00:00:00Z".parse().unwrap());
        let err = resolve_range(&a).unwrap_err();
        assert!(err.downcast_ref::<timescroll_core::TimelineError>().is_some());
    }

    #[test]
    fn one_line_collapses_whitespace() {
        assert_eq!(one_line("a\n  b\tc"), "a b c");
    }
}
