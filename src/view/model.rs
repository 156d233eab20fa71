//! Structured, data-only presentation of the dashboard.
//!
//! [`render`] is a pure function of the catalog, the runtime store, the
//! connection status and the filter criteria. It decides every badge, label
//! and enablement; adapters such as [`crate::view::text`] only lay it out.

use crate::board::catalog::{PinCatalog, PinCategory, PinDescriptor};
use crate::board::runtime::{PinMode, RuntimeState, RuntimeStateStore};
use crate::client::connection::ConnectionStatus;
use crate::client::session::DeviceInfo;
use crate::view::filter::{CategoryFilter, PinFilter};
use serde::Serialize;

/// Placeholder text when no pin passes the filter.
pub const NO_MATCH_MESSAGE: &str = "No pins match this filter.";

/// Liveness of a pin as last reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveBadge {
    /// The pin has no GPIO index
    NotApplicable,
    /// Addressable, but no snapshot has mentioned it yet
    Unknown,
    High,
    Low,
}

impl LiveBadge {
    pub fn label(&self) -> &'static str {
        match self {
            LiveBadge::NotApplicable => "N/A",
            LiveBadge::Unknown => "Unknown",
            LiveBadge::High => "High",
            LiveBadge::Low => "Low",
        }
    }

    fn for_pin(pin: &PinDescriptor, runtime: Option<&RuntimeState>) -> Self {
        match (pin.gpio, runtime) {
            (None, _) => LiveBadge::NotApplicable,
            (Some(_), None) => LiveBadge::Unknown,
            (Some(_), Some(state)) if state.value => LiveBadge::High,
            (Some(_), Some(_)) => LiveBadge::Low,
        }
    }
}

/// Mode dropdown of one pin card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeSelector {
    /// GPIO attribute carried by the control, empty for non-addressable pins
    pub data_gpio: String,
    pub selected: PinMode,
    /// Modes offered; input-only lines never offer output
    pub options: Vec<PinMode>,
    pub enabled: bool,
}

/// What the action button of a pin card currently offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NotApplicable,
    Offline,
    Wait,
    Reserved,
    SetOutput,
    Toggle,
}

/// Output toggle button of one pin card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionControl {
    pub kind: ActionKind,
    pub label: &'static str,
    pub enabled: bool,
    pub data_gpio: String,
    /// Level the button will request; only set for enabled toggles
    pub next_value: Option<bool>,
}

impl ActionControl {
    fn disabled(kind: ActionKind, label: &'static str, gpio: Option<u32>) -> Self {
        Self {
            kind,
            label,
            enabled: false,
            data_gpio: gpio.map(|g| g.to_string()).unwrap_or_default(),
            next_value: None,
        }
    }

    /// Encoded next level as carried by the control ("1" high, "0" low).
    pub fn data_next(&self) -> Option<&'static str> {
        self.next_value.map(|next| if next { "1" } else { "0" })
    }

    fn for_pin(pin: &PinDescriptor, runtime: Option<&RuntimeState>, connected: bool) -> Self {
        let Some(gpio) = pin.gpio else {
            return Self::disabled(ActionKind::NotApplicable, "N/A", None);
        };
        if !connected {
            return Self::disabled(ActionKind::Offline, "Offline", Some(gpio));
        }
        let Some(state) = runtime else {
            return Self::disabled(ActionKind::Wait, "Wait", Some(gpio));
        };
        if !state.can_control {
            return Self::disabled(ActionKind::Reserved, "Reserved", Some(gpio));
        }
        if state.mode != PinMode::Output {
            return Self::disabled(ActionKind::SetOutput, "Set Output", Some(gpio));
        }

        Self {
            kind: ActionKind::Toggle,
            label: if state.value { "Set Low" } else { "Set High" },
            enabled: true,
            data_gpio: gpio.to_string(),
            next_value: Some(!state.value),
        }
    }
}

/// Everything shown for one physical pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinCard {
    pub number: u16,
    pub label: String,
    pub gpio: Option<u32>,
    /// "GPIO 14" for IO pins, the plain label otherwise
    pub gpio_tag: String,
    pub live: LiveBadge,
    pub category: PinCategory,
    pub category_label: &'static str,
    pub mode_label: &'static str,
    pub mode_selector: ModeSelector,
    pub action: ActionControl,
}

impl PinCard {
    /// Card heading, e.g. "18: IO14".
    pub fn title(&self) -> String {
        format!("{}: {}", self.number, self.label)
    }
}

/// Body of the pin grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PinGrid {
    NoMatch { message: &'static str },
    Cards { cards: Vec<PinCard> },
}

impl PinGrid {
    /// Cards in display order; empty for the placeholder.
    pub fn cards(&self) -> &[PinCard] {
        match self {
            PinGrid::NoMatch { .. } => &[],
            PinGrid::Cards { cards } => cards,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, PinGrid::NoMatch { .. })
    }
}

/// Connection badge in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusIndicator {
    pub status: ConnectionStatus,
    pub label: &'static str,
}

impl From<ConnectionStatus> for StatusIndicator {
    fn from(status: ConnectionStatus) -> Self {
        Self {
            status,
            label: status.label(),
        }
    }
}

/// Complete presentation of the dashboard at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub status: StatusIndicator,
    pub filter: String,
    pub search: String,
    pub device: DeviceInfo,
    pub grid: PinGrid,
}

/// Render the pin grid for the given state and criteria.
pub fn render(
    catalog: &PinCatalog,
    store: &RuntimeStateStore,
    status: ConnectionStatus,
    category: CategoryFilter,
    query: &str,
) -> PinGrid {
    render_filtered(catalog, store, status, &PinFilter::new(category, query))
}

/// Same as [`render`] with an already normalized filter.
pub fn render_filtered(
    catalog: &PinCatalog,
    store: &RuntimeStateStore,
    status: ConnectionStatus,
    filter: &PinFilter,
) -> PinGrid {
    let connected = status == ConnectionStatus::Connected;
    let cards: Vec<PinCard> = catalog
        .pins()
        .iter()
        .filter(|pin| filter.matches(pin))
        .map(|pin| pin_card(pin, store, connected))
        .collect();

    if cards.is_empty() {
        PinGrid::NoMatch {
            message: NO_MATCH_MESSAGE,
        }
    } else {
        PinGrid::Cards { cards }
    }
}

fn pin_card(pin: &PinDescriptor, store: &RuntimeStateStore, connected: bool) -> PinCard {
    let runtime = pin.gpio.and_then(|gpio| store.get(gpio));
    let selected = runtime.map(|state| state.mode).unwrap_or_default();
    let controllable = runtime.map_or(true, |state| state.can_control);

    PinCard {
        number: pin.number,
        label: pin.label.clone(),
        gpio: pin.gpio,
        gpio_tag: gpio_tag(&pin.label),
        live: LiveBadge::for_pin(pin, runtime),
        category: pin.category,
        category_label: pin.category.badge_label(),
        mode_label: selected.label(),
        mode_selector: ModeSelector {
            data_gpio: pin.gpio.map(|g| g.to_string()).unwrap_or_default(),
            selected,
            options: mode_options(pin.category),
            enabled: pin.is_addressable() && connected && controllable,
        },
        action: ActionControl::for_pin(pin, runtime, connected),
    }
}

fn mode_options(category: PinCategory) -> Vec<PinMode> {
    match category {
        PinCategory::Input => vec![PinMode::Input, PinMode::InputPullup],
        _ => PinMode::ALL.to_vec(),
    }
}

fn gpio_tag(label: &str) -> String {
    match label.strip_prefix("IO") {
        Some(index) => format!("GPIO {}", index),
        None => label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SnapshotPin;
    use serde_json::json;

    fn store_with(entries: serde_json::Value) -> RuntimeStateStore {
        let pins: Vec<SnapshotPin> = entries
            .as_array()
            .unwrap()
            .iter()
            .map(SnapshotPin::from_value)
            .collect();
        let mut store = RuntimeStateStore::new();
        store.merge(&PinCatalog::reference(), &pins);
        store
    }

    fn card<'a>(grid: &'a PinGrid, number: u16) -> &'a PinCard {
        grid.cards().iter().find(|c| c.number == number).unwrap()
    }

    #[test]
    fn test_live_badges() {
        let store = store_with(json!([
            { "gpio": 1, "value": true },
            { "gpio": 2, "value": false }
        ]));
        let grid = render(
            &PinCatalog::reference(),
            &store,
            ConnectionStatus::Connected,
            CategoryFilter::All,
            "",
        );

        assert_eq!(card(&grid, 1).live, LiveBadge::NotApplicable);
        assert_eq!(card(&grid, 5).live, LiveBadge::High);
        assert_eq!(card(&grid, 6).live, LiveBadge::Low);
        assert_eq!(card(&grid, 7).live, LiveBadge::Unknown);
    }

    #[test]
    fn test_action_reasons() {
        let catalog = PinCatalog::reference();
        let store = store_with(json!([
            { "gpio": 1, "mode": "input" },
            { "gpio": 2, "mode": "output", "canControl": false },
            { "gpio": 3, "mode": "output", "value": false }
        ]));

        let grid = render(&catalog, &store, ConnectionStatus::Connected, CategoryFilter::All, "");
        assert_eq!(card(&grid, 1).action.kind, ActionKind::NotApplicable);
        assert_eq!(card(&grid, 5).action.label, "Set Output");
        assert_eq!(card(&grid, 6).action.kind, ActionKind::Reserved);
        assert!(!card(&grid, 6).mode_selector.enabled);
        assert_eq!(card(&grid, 8).action.label, "Wait");

        let toggle = &card(&grid, 7).action;
        assert!(toggle.enabled);
        assert_eq!(toggle.label, "Set High");
        assert_eq!(toggle.next_value, Some(true));
        assert_eq!(toggle.data_next(), Some("1"));

        let grid = render(&catalog, &store, ConnectionStatus::Connecting, CategoryFilter::All, "");
        assert_eq!(card(&grid, 7).action.label, "Offline");
    }

    #[test]
    fn test_mode_selector_defaults_to_input() {
        let grid = render(
            &PinCatalog::reference(),
            &RuntimeStateStore::new(),
            ConnectionStatus::Connected,
            CategoryFilter::All,
            "",
        );
        let io14 = card(&grid, 18);
        assert_eq!(io14.mode_selector.selected, PinMode::Input);
        assert_eq!(io14.mode_label, "Input");
        assert!(io14.mode_selector.enabled);
        assert_eq!(io14.mode_selector.data_gpio, "14");
        assert_eq!(io14.gpio_tag, "GPIO 14");

        let gnd = card(&grid, 1);
        assert!(!gnd.mode_selector.enabled);
        assert_eq!(gnd.mode_selector.data_gpio, "");
        assert_eq!(gnd.gpio_tag, "GND");
    }

    #[test]
    fn test_input_only_pins_never_offer_output() {
        let grid = render(
            &PinCatalog::reference(),
            &RuntimeStateStore::new(),
            ConnectionStatus::Connected,
            CategoryFilter::All,
            "",
        );

        for number in [29, 31] {
            let input_only = card(&grid, number);
            assert_eq!(input_only.category, PinCategory::Input);
            assert_eq!(
                input_only.mode_selector.options,
                vec![PinMode::Input, PinMode::InputPullup]
            );
        }
        assert_eq!(card(&grid, 18).mode_selector.options, PinMode::ALL.to_vec());
    }

    #[test]
    fn test_no_match_placeholder() {
        let grid = render(
            &PinCatalog::reference(),
            &RuntimeStateStore::new(),
            ConnectionStatus::Connected,
            CategoryFilter::Only(PinCategory::Input),
            "gnd",
        );
        assert!(grid.is_no_match());
        assert!(grid.cards().is_empty());
    }

    #[test]
    fn test_serialized_grid_shape() {
        let grid = render(
            &PinCatalog::reference(),
            &RuntimeStateStore::new(),
            ConnectionStatus::Disconnected,
            CategoryFilter::Only(PinCategory::Power),
            "",
        );
        let value = serde_json::to_value(&grid).unwrap();
        assert_eq!(value["kind"], "cards");
        assert_eq!(value["cards"][0]["live"], "not_applicable");
        assert_eq!(value["cards"][0]["category"], "power");
    }
}
