//! Last-known runtime state of addressed GPIOs, fed by device snapshots.

use crate::board::catalog::PinCatalog;
use crate::protocol::SnapshotPin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Electrical mode of a GPIO line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    /// Floating input
    #[default]
    Input,
    /// Input with the internal pull-up enabled
    InputPullup,
    /// Push-pull output
    Output,
}

impl PinMode {
    /// Modes in selector order.
    pub const ALL: [PinMode; 3] = [PinMode::Input, PinMode::InputPullup, PinMode::Output];

    /// Parse the protocol name of a mode.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "input" => Some(PinMode::Input),
            "input_pullup" => Some(PinMode::InputPullup),
            "output" => Some(PinMode::Output),
            _ => None,
        }
    }

    /// Protocol name of the mode.
    pub fn as_wire(&self) -> &'static str {
        match self {
            PinMode::Input => "input",
            PinMode::InputPullup => "input_pullup",
            PinMode::Output => "output",
        }
    }

    /// Human readable mode name.
    pub fn label(&self) -> &'static str {
        match self {
            PinMode::Input => "Input",
            PinMode::InputPullup => "Input Pullup",
            PinMode::Output => "Output",
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Last reported state of one GPIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub mode: PinMode,
    /// Logic level: commanded level for outputs, sampled level for inputs
    pub value: bool,
    /// False when the device refuses mode/value changes on this line
    pub can_control: bool,
}

/// Outcome of merging one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries written into the store
    pub applied: usize,
    /// Entries without a usable GPIO index
    pub discarded: usize,
}

/// Mapping from GPIO index to last-known runtime state.
///
/// Entries are only ever inserted or overwritten by [`merge`](Self::merge);
/// nothing removes them, so a disconnected dashboard keeps showing the last
/// known picture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStateStore {
    entries: BTreeMap<u32, RuntimeState>,
}

impl RuntimeStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, gpio: u32) -> Option<&RuntimeState> {
        self.entries.get(&gpio)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RuntimeState)> {
        self.entries.iter().map(|(gpio, state)| (*gpio, state))
    }

    /// Upsert every snapshot entry that names a catalogued GPIO.
    ///
    /// GPIOs missing from the snapshot keep their previous state.
    pub fn merge(&mut self, catalog: &PinCatalog, pins: &[SnapshotPin]) -> MergeReport {
        let mut report = MergeReport::default();

        for pin in pins {
            let Some(gpio) = pin.gpio_index() else {
                report.discarded += 1;
                continue;
            };
            if !catalog.contains_gpio(gpio) {
                debug!("Ignoring snapshot entry for uncatalogued GPIO {}", gpio);
                report.discarded += 1;
                continue;
            }

            self.entries.insert(
                gpio,
                RuntimeState {
                    mode: pin.mode_or_default(),
                    value: pin.level(),
                    can_control: pin.controllable(),
                },
            );
            report.applied += 1;
        }

        report
    }
}
