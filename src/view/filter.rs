//! Category and free-text filtering of catalog pins.

use crate::board::catalog::{PinCategory, PinDescriptor};
use std::fmt;
use std::str::FromStr;

/// Value of the category selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(PinCategory),
}

impl CategoryFilter {
    pub fn accepts(&self, category: PinCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "" => Ok(CategoryFilter::All),
            other => other.parse::<PinCategory>().map(CategoryFilter::Only),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(category) => write!(f, "{}", category),
        }
    }
}

/// Category filter combined with a search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinFilter {
    category: CategoryFilter,
    query: String,
}

impl PinFilter {
    /// The query is trimmed and lower-cased once here.
    pub fn new(category: CategoryFilter, query: &str) -> Self {
        Self {
            category,
            query: query.trim().to_lowercase(),
        }
    }

    pub fn category(&self) -> CategoryFilter {
        self.category
    }

    /// Normalized query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.category = category;
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_lowercase();
    }

    /// Category and query are checked independently and must both pass.
    pub fn matches(&self, pin: &PinDescriptor) -> bool {
        self.category.accepts(pin.category) && self.matches_query(pin)
    }

    fn matches_query(&self, pin: &PinDescriptor) -> bool {
        self.query.is_empty()
            || pin.label.to_lowercase().contains(&self.query)
            || pin.number.to_string().contains(&self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_filter_parsing() {
        assert_eq!("all".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "digital".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(PinCategory::Digital))
        );
        assert!("analog".parse::<CategoryFilter>().is_err());
        assert_eq!(CategoryFilter::Only(PinCategory::Power).to_string(), "power");
    }

    #[test]
    fn test_query_matches_label_case_insensitively() {
        let filter = PinFilter::new(CategoryFilter::All, "  Io1 ");
        assert_eq!(filter.query(), "io1");
        assert!(filter.matches(&PinDescriptor::gpio(5, "IO1", PinCategory::Digital, 1)));
        assert!(filter.matches(&PinDescriptor::gpio(15, "IO11", PinCategory::Digital, 11)));
        assert!(!filter.matches(&PinDescriptor::fixed(2, "3V3", PinCategory::Power)));
    }

    #[test]
    fn test_query_matches_pin_number() {
        let filter = PinFilter::new(CategoryFilter::All, "41");
        assert!(filter.matches(&PinDescriptor::fixed(41, "GND", PinCategory::Power)));
        assert!(!filter.matches(&PinDescriptor::fixed(1, "GND", PinCategory::Power)));
    }

    #[test]
    fn test_category_and_query_combine() {
        let filter = PinFilter::new(CategoryFilter::Only(PinCategory::Input), "io3");
        assert!(filter.matches(&PinDescriptor::gpio(29, "IO35", PinCategory::Input, 35)));
        assert!(!filter.matches(&PinDescriptor::gpio(7, "IO3", PinCategory::Digital, 3)));
    }
}
