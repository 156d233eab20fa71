//! Presentation of the pin dashboard.
//!
//! The view model is plain data derived from the board state; the text
//! adapter turns it into terminal output and serde turns it into JSON.

pub mod filter;
pub mod model;
pub mod text;

// Re-export commonly used items
pub use filter::{CategoryFilter, PinFilter};
pub use model::{
    render, render_filtered, ActionControl, ActionKind, DashboardView, LiveBadge, ModeSelector,
    PinCard, PinGrid, StatusIndicator,
};
pub use text::render_text;
