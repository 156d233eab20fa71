//! Board model: the static pin table and the runtime state learned from the device.
//!
//! The catalog never changes after startup. The runtime store only grows or
//! overwrites entries as snapshots arrive.

pub mod catalog;
pub mod runtime;

// Re-export commonly used items
pub use catalog::{CatalogError, PinCatalog, PinCategory, PinDescriptor};
pub use runtime::{MergeReport, PinMode, RuntimeState, RuntimeStateStore};
