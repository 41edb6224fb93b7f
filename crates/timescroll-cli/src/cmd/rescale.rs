use anyhow::Result;
use clap::Args;
use serde::Serialize;
use timescroll_core::Resolution;
use timescroll_core::density::{center_index, transition_scroll_top};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct RescaleArgs {
    /// Current resolution level (0-4).
    #[arg(long)]
    pub from: u8,

    /// Target resolution level (0-4).
    #[arg(long)]
    pub to: u8,

    /// Current scroll offset in pixels.
    #[arg(long, default_value_t = 0.0)]
    pub scroll_top: f64,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 600.0)]
    pub client_height: f64,
}

#[derive(Debug, Serialize)]
struct RescaleReport {
    from: Resolution,
    to: Resolution,
    from_item_height: f64,
    to_item_height: f64,
    center_index: usize,
    scroll_top: f64,
    new_scroll_top: f64,
}

/// Execute `tscroll rescale`.
///
/// # Errors
///
/// Returns [`timescroll_core::TimelineError::InvalidResolution`] for a level
/// outside 0..=4.
pub fn run_rescale(args: &RescaleArgs, output: OutputMode) -> Result<()> {
    let from = Resolution::new(args.from)?;
    let to = Resolution::new(args.to)?;
    let report = RescaleReport {
        from,
        to,
        from_item_height: from.item_height(),
        to_item_height: to.item_height(),
        center_index: center_index(args.scroll_top, args.client_height, from.item_height()),
        scroll_top: args.scroll_top,
        new_scroll_top: transition_scroll_top(from, to, args.scroll_top, args.client_height),
    };

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}", r.new_scroll_top),
        |r, w| {
            pretty_section(w, &format!("Rescale {} -> {}", r.from, r.to))?;
            pretty_kv(
                w,
                "Row height",
                format!("{}px -> {}px", r.from_item_height, r.to_item_height),
            )?;
            pretty_kv(w, "Centered row", r.center_index.to_string())?;
            pretty_kv(w, "Scroll top", format!("{} -> {}", r.scroll_top, r.new_scroll_top))
        },
    )
}
