//! Plain-text layout of a [`DashboardView`] for terminals.

use crate::view::model::{DashboardView, PinCard, PinGrid};
use std::fmt::Write;

/// Lay out the whole dashboard.
pub fn render_text(view: &DashboardView) -> String {
    let mut out = String::new();

    let _ = write!(out, "Pin Deck  [{}]", view.status.label);
    if let Some(target) = &view.device.target {
        let _ = write!(out, "  target {}", target);
    }
    if let Some(uptime_ms) = view.device.uptime_ms {
        let _ = write!(out, "  uptime {:.1}s", uptime_ms as f64 / 1000.0);
    }
    if let Some(at) = view.device.last_snapshot_at {
        let _ = write!(out, "  snapshot {}", at.format("%H:%M:%S"));
    }
    out.push('\n');

    let _ = writeln!(out, "filter: {}  search: \"{}\"", view.filter, view.search);
    if let Some(error) = &view.device.last_error {
        let _ = writeln!(out, "device error: {}", error);
    }
    out.push('\n');

    match &view.grid {
        PinGrid::NoMatch { message } => {
            let _ = writeln!(out, "  {}", message);
        }
        PinGrid::Cards { cards } => {
            for card in cards {
                out.push_str(&card_line(card));
                out.push('\n');
            }
        }
    }

    out
}

/// One row per pin. Enabled controls are shown in brackets, disabled ones in parentheses.
pub fn card_line(card: &PinCard) -> String {
    let mode = if card.mode_selector.enabled {
        format!("<{}>", card.mode_label)
    } else {
        format!("({})", card.mode_label)
    };
    let action = if card.action.enabled {
        format!("[{}]", card.action.label)
    } else {
        format!("({})", card.action.label)
    };

    format!(
        "{:>9}  {:<9} {:<12} {:<8} {:<15} {}",
        card.title(),
        card.live.label(),
        card.category_label,
        card.gpio_tag,
        mode,
        action
    )
}
