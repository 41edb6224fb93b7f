//! Scroll remapping across resolution changes.
//!
//! The item at the vertical center of the viewport before a density change
//! stays centered after it.

use crate::model::Resolution;

/// Index of the item under the viewport's vertical center.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn center_index(scroll_top: f64, client_height: f64, item_height: f64) -> usize {
    if !item_height.is_finite() || item_height <= 0.0 {
        return 0;
    }
    let center = scroll_top.max(0.0) + client_height.max(0.0) / 2.0;
    if center.is_finite() { (center / item_height).floor() as usize } else { 0 }
}

/// New scroll offset after item height changes from `old_item_height` to
/// `new_item_height`:
///
/// ```text
/// center = floor((old_top + client_height / 2) / old_item_height)
/// new_top = max(0, center * new_item_height - client_height / 2)
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn remap_scroll_top(
    old_top: f64,
    client_height: f64,
    old_item_height: f64,
    new_item_height: f64,
) -> f64 {
    if !new_item_height.is_finite() || new_item_height <= 0.0 {
        return 0.0;
    }
    let half = client_height.max(0.0) / 2.0;
    let index = center_index(old_top, client_height, old_item_height);
    let top = (index as f64).mul_add(new_item_height, -half).max(0.0);
    if top.is_finite() { top } else { 0.0 }
}

/// Scroll offset to apply when switching resolution from `from` to `to`.
/// Returns `scroll_top` unchanged when the levels are equal.
#[must_use]
pub fn transition_scroll_top(
    from: Resolution,
    to: Resolution,
    scroll_top: f64,
    client_height: f64,
) -> f64 {
    if from == to {
        return scroll_top;
    }
    remap_scroll_top(scroll_top, client_height, from.item_height(), to.item_height())
}
