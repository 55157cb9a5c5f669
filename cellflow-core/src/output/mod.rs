//! Scheduling of the values reported by a run.
//!
//! The output item table lists what to report ([`OrgOutItem`]). [`SettingsOutput`]
//! turns it into one [`PrintInfo`] per enabled item, which accumulates the values of a
//! variable on every step and flushes them on its own schedule.

pub mod item;
pub mod print_info;
pub mod settings;

pub use item::{AggregationType, IntervalUnit, OrgOutItem, SubbasinSelector};
pub use print_info::{OutputRecord, PrintInfo};
pub use settings::SettingsOutput;
