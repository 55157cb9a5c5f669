//! Declarative output items and the vocabulary used to describe them.

use crate::errors::{CellflowError, CellflowResult};
use chrono::{Duration, Months};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::Time;

/// Value of `interval` and `use` when they are not set
pub const UNSET: i32 = -1;

/// One requested output, as read from the output item table
///
/// This is raw data: nothing is validated until a
/// [`SettingsOutput`](super::SettingsOutput) is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgOutItem {
    /// Class tag of the module producing the variable
    pub mod_cls: String,
    /// Name of the output variable
    pub output_id: String,
    pub description: String,
    /// Target file or table name
    pub out_file_name: String,
    /// Temporal aggregation, e.g. `SUM`, see [`AggregationType`]
    pub agg_type: String,
    pub unit: String,
    /// Subbasin selector, see [`SubbasinSelector`]
    pub sub_bsn: String,
    /// Unit of `interval`, see [`IntervalUnit`]
    pub interval_unit: String,
    pub s_time: String,
    pub e_time: String,
    pub interval: i32,
    /// 1 if the output is enabled, 0 if disabled
    #[serde(rename = "use")]
    pub use_flag: i32,
}

impl Default for OrgOutItem {
    fn default() -> Self {
        Self {
            mod_cls: String::new(),
            output_id: String::new(),
            description: String::new(),
            out_file_name: String::new(),
            agg_type: String::new(),
            unit: String::new(),
            sub_bsn: String::new(),
            interval_unit: String::new(),
            s_time: String::new(),
            e_time: String::new(),
            interval: UNSET,
            use_flag: UNSET,
        }
    }
}

impl OrgOutItem {
    /// Interpret the use flag
    ///
    /// An unset flag is an error rather than a silent default.
    pub fn is_enabled(&self) -> CellflowResult<bool> {
        match self.use_flag {
            1 => Ok(true),
            0 => Ok(false),
            UNSET => Err(CellflowError::configuration(
                &self.output_id,
                "the use flag is not set",
            )),
            other => Err(CellflowError::configuration(
                &self.output_id,
                format!("the use flag must be 0 or 1, got {}", other),
            )),
        }
    }
}

/// Reduction applied to the samples collected within one flush interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationType {
    /// Keep only the latest sample
    Instantaneous,
    Sum,
    Average,
    Min,
    Max,
}

impl AggregationType {
    /// Parse an aggregation name, ignoring case
    ///
    /// An empty name means no aggregation.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" | "INST" | "INSTANT" | "INSTANTANEOUS" => Some(Self::Instantaneous),
            "SUM" => Some(Self::Sum),
            "AVE" | "AVG" | "AVERAGE" | "MEAN" => Some(Self::Average),
            "MIN" | "MINIMUM" => Some(Self::Min),
            "MAX" | "MAXIMUM" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Instantaneous => "INSTANTANEOUS",
            Self::Sum => "SUM",
            Self::Average => "AVERAGE",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl IntervalUnit {
    /// Parse an interval unit, ignoring case
    ///
    /// An empty unit defaults to days.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "S" | "SEC" | "SECOND" | "SECONDS" => Some(Self::Second),
            "MIN" | "MINUTE" | "MINUTES" => Some(Self::Minute),
            "H" | "HR" | "HOUR" | "HOURS" => Some(Self::Hour),
            "" | "D" | "DAY" | "DAYS" => Some(Self::Day),
            "MON" | "MONTH" | "MONTHS" => Some(Self::Month),
            "YR" | "YEAR" | "YEARS" => Some(Self::Year),
            _ => None,
        }
    }

    /// Move `from` forward by `count` units
    ///
    /// Months and years follow the calendar, clamping to the last day of shorter months.
    pub fn advance(&self, from: Time, count: u32) -> Option<Time> {
        match self {
            Self::Second => from.checked_add_signed(Duration::seconds(count.into())),
            Self::Minute => from.checked_add_signed(Duration::minutes(count.into())),
            Self::Hour => from.checked_add_signed(Duration::hours(count.into())),
            Self::Day => from.checked_add_signed(Duration::days(count.into())),
            Self::Month => from.checked_add_months(Months::new(count)),
            Self::Year => count
                .checked_mul(12)
                .and_then(|months| from.checked_add_months(Months::new(months))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which subbasins an output applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubbasinSelector {
    /// Every subbasin, or a non-partitioned run
    All,
    /// The subbasin containing the watershed outlet
    Outlet,
    Ids(Vec<u32>),
}

impl SubbasinSelector {
    /// Parse a selector: empty, `ALL` or `0` select everything, `OUTLET` the outlet
    /// subbasin, otherwise a comma separated list of subbasin ids
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" | "ALL" | "0" => return Some(Self::All),
            "OUTLET" => return Some(Self::Outlet),
            _ => {}
        }
        let ids = trimmed
            .split(',')
            .map(|part| part.trim().parse::<u32>().ok().filter(|id| *id > 0))
            .collect::<Option<Vec<u32>>>()?;
        Some(Self::Ids(ids))
    }

    /// Resolve the selector against the run's partitioning
    ///
    /// Returns the subbasin id an entry targets, with 0 meaning all subbasins, or `None`
    /// if the entry does not apply to the current process.
    pub fn target(&self, subbasin_id: u32, outlet_id: u32) -> Option<u32> {
        match (self, subbasin_id) {
            (Self::All, current) => Some(current),
            (Self::Outlet, 0) => Some(outlet_id),
            (Self::Outlet, current) if current == outlet_id => Some(current),
            (Self::Ids(ids), 0) if ids.len() == 1 => Some(ids[0]),
            (Self::Ids(_), 0) => Some(0),
            (Self::Ids(ids), current) if ids.contains(&current) => Some(current),
            _ => None,
        }
    }
}

impl fmt::Display for SubbasinSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Outlet => f.write_str("OUTLET"),
            Self::Ids(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                f.write_str(&ids.join(","))
            }
        }
    }
}
