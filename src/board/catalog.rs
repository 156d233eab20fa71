//! Static descriptor table of the board's physical pins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Fixed classification of a physical pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinCategory {
    /// Supply and ground rails
    Power,
    /// Boot, reset and strapping pins
    System,
    /// General purpose bidirectional I/O
    Digital,
    /// GPIO that is read-only at the hardware level
    Input,
}

impl PinCategory {
    /// All categories, in selector order.
    pub const ALL: [PinCategory; 4] = [
        PinCategory::Power,
        PinCategory::System,
        PinCategory::Digital,
        PinCategory::Input,
    ];

    /// Wire/selector name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            PinCategory::Power => "power",
            PinCategory::System => "system",
            PinCategory::Digital => "digital",
            PinCategory::Input => "input",
        }
    }

    /// Human readable badge text.
    pub fn badge_label(&self) -> &'static str {
        match self {
            PinCategory::Power => "Power",
            PinCategory::System => "System",
            PinCategory::Digital => "Digital I/O",
            PinCategory::Input => "Live Input",
        }
    }
}

impl fmt::Display for PinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PinCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown pin category '{}'", s))
    }
}

/// Immutable description of one physical pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDescriptor {
    /// Physical position on the header, also the display order
    pub number: u16,
    /// Short name printed on the board (e.g. "IO14", "GND")
    pub label: String,
    /// Pin classification
    pub category: PinCategory,
    /// Logical GPIO index, absent for non-addressable pins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpio: Option<u32>,
}

impl PinDescriptor {
    /// Create a descriptor for a pin without a GPIO index.
    pub fn fixed(number: u16, label: impl Into<String>, category: PinCategory) -> Self {
        Self {
            number,
            label: label.into(),
            category,
            gpio: None,
        }
    }

    /// Create a descriptor for an addressable GPIO pin.
    pub fn gpio(number: u16, label: impl Into<String>, category: PinCategory, gpio: u32) -> Self {
        Self {
            number,
            label: label.into(),
            category,
            gpio: Some(gpio),
        }
    }

    /// Whether the device protocol can address this pin.
    pub fn is_addressable(&self) -> bool {
        self.gpio.is_some()
    }
}

/// Reasons a pin table is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("pin number must be positive")]
    ZeroNumber,

    #[error("pin number {0} appears more than once")]
    DuplicateNumber(u16),

    #[error("GPIO {0} is assigned to more than one pin")]
    DuplicateGpio(u32),
}

/// Validated, number-ordered table of pin descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinCatalog {
    pins: Vec<PinDescriptor>,
    #[serde(skip)]
    gpios: BTreeSet<u32>,
}

impl PinCatalog {
    /// Build a catalog, rejecting duplicate numbers or GPIO indices.
    pub fn new(mut pins: Vec<PinDescriptor>) -> Result<Self, CatalogError> {
        pins.sort_by_key(|pin| pin.number);

        let mut numbers = BTreeSet::new();
        let mut gpios = BTreeSet::new();
        for pin in &pins {
            if pin.number == 0 {
                return Err(CatalogError::ZeroNumber);
            }
            if !numbers.insert(pin.number) {
                return Err(CatalogError::DuplicateNumber(pin.number));
            }
            if let Some(gpio) = pin.gpio {
                if !gpios.insert(gpio) {
                    return Err(CatalogError::DuplicateGpio(gpio));
                }
            }
        }

        Ok(Self { pins, gpios })
    }

    /// The built-in 41-pin header table.
    pub fn reference() -> Self {
        let pins = REFERENCE_PINS
            .iter()
            .map(|&(number, label, category, gpio)| PinDescriptor {
                number,
                label: label.to_string(),
                category,
                gpio,
            })
            .collect();

        Self::new(pins).expect("Reference pin table should have unique numbers and gpios")
    }

    /// Pins in ascending `number` order.
    pub fn pins(&self) -> &[PinDescriptor] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Whether some pin carries this GPIO index.
    pub fn contains_gpio(&self, gpio: u32) -> bool {
        self.gpios.contains(&gpio)
    }

    /// Look up the pin addressed by a GPIO index.
    pub fn by_gpio(&self, gpio: u32) -> Option<&PinDescriptor> {
        if !self.contains_gpio(gpio) {
            return None;
        }
        self.pins.iter().find(|pin| pin.gpio == Some(gpio))
    }

    /// All addressable GPIO indices, ascending.
    pub fn gpios(&self) -> impl Iterator<Item = u32> + '_ {
        self.gpios.iter().copied()
    }
}

use PinCategory::{Digital, Input, Power, System};

#[rustfmt::skip]
const REFERENCE_PINS: [(u16, &str, PinCategory, Option<u32>); 41] = [
    (1, "GND", Power, None),
    (2, "3V3", Power, None),
    (3, "EN", System, None),
    (4, "IO0", System, Some(0)),
    (5, "IO1", Digital, Some(1)),
    (6, "IO2", Digital, Some(2)),
    (7, "IO3", Digital, Some(3)),
    (8, "IO4", Digital, Some(4)),
    (9, "IO5", Digital, Some(5)),
    (10, "IO6", Digital, Some(6)),
    (11, "IO7", Digital, Some(7)),
    (12, "IO8", Digital, Some(8)),
    (13, "IO9", Digital, Some(9)),
    (14, "IO10", Digital, Some(10)),
    (15, "IO11", Digital, Some(11)),
    (16, "IO12", Digital, Some(12)),
    (17, "IO13", Digital, Some(13)),
    (18, "IO14", Digital, Some(14)),
    (19, "IO15", Digital, Some(15)),
    (20, "IO16", Digital, Some(16)),
    (21, "IO17", Digital, Some(17)),
    (22, "IO18", Digital, Some(18)),
    (23, "IO19", Digital, Some(19)),
    (24, "IO20", Digital, Some(20)),
    (25, "IO21", Digital, Some(21)),
    (26, "IO26", Digital, Some(26)),
    (27, "IO33", Digital, Some(33)),
    (28, "IO34", Digital, Some(34)),
    (29, "IO35", Input, Some(35)),
    (30, "IO36", Digital, Some(36)),
    (31, "IO37", Input, Some(37)),
    (32, "IO38", Digital, Some(38)),
    (33, "IO39", Digital, Some(39)),
    (34, "IO40", Digital, Some(40)),
    (35, "IO41", Digital, Some(41)),
    (36, "IO42", Digital, Some(42)),
    (37, "IO43", Digital, Some(43)),
    (38, "IO44", Digital, Some(44)),
    (39, "IO45", Digital, Some(45)),
    (40, "IO46", Digital, Some(46)),
    (41, "GND", Power, None),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_catalog_shape() {
        let catalog = PinCatalog::reference();
        assert_eq!(catalog.len(), 41);
        assert_eq!(catalog.pins()[0].label, "GND");
        assert_eq!(catalog.pins()[40].number, 41);
        assert_eq!(catalog.gpios().count(), 37);
        assert!(catalog.contains_gpio(46));
        assert!(!catalog.contains_gpio(22));
    }

    #[test]
    fn test_catalog_sorts_by_number() {
        let catalog = PinCatalog::new(vec![
            PinDescriptor::gpio(3, "IO3", PinCategory::Digital, 3),
            PinDescriptor::fixed(1, "GND", PinCategory::Power),
            PinDescriptor::gpio(2, "IO2", PinCategory::Digital, 2),
        ])
        .unwrap();

        let numbers: Vec<u16> = catalog.pins().iter().map(|pin| pin.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let err = PinCatalog::new(vec![
            PinDescriptor::gpio(1, "IO1", PinCategory::Digital, 1),
            PinDescriptor::gpio(2, "IO1b", PinCategory::Digital, 1),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateGpio(1));

        let err = PinCatalog::new(vec![
            PinDescriptor::fixed(5, "GND", PinCategory::Power),
            PinDescriptor::fixed(5, "3V3", PinCategory::Power),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateNumber(5));

        let err = PinCatalog::new(vec![PinDescriptor::fixed(0, "GND", PinCategory::Power)])
            .unwrap_err();
        assert_eq!(err, CatalogError::ZeroNumber);
    }

    #[test]
    fn test_by_gpio_lookup() {
        let catalog = PinCatalog::reference();
        let pin = catalog.by_gpio(14).unwrap();
        assert_eq!(pin.label, "IO14");
        assert_eq!(pin.number, 18);
        assert!(catalog.by_gpio(99).is_none());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("input".parse::<PinCategory>(), Ok(PinCategory::Input));
        assert!("analog".parse::<PinCategory>().is_err());
        assert_eq!(PinCategory::Input.badge_label(), "Live Input");
    }
}
