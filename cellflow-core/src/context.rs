//! Run-scoped settings shared by the pipeline and the output registry.

use crate::errors::{CellflowError, CellflowResult};
use crate::time::{format_time, StepContext, Time};
use chrono::Duration;

/// Settings that are fixed for the whole run
///
/// Constructed once during setup and passed by reference to every component
/// that needs to know about the simulation period or the subbasin partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    /// Number of subbasins of the entire watershed
    pub subbasin_count: u32,
    /// Subbasin in which the outlet is located
    pub outlet_id: u32,
    /// Subbasin handled by this process, 0 for a non-partitioned run
    pub subbasin_id: u32,
    pub start: Time,
    pub end: Time,
    pub time_step: Duration,
}

impl RunContext {
    /// Create a non-partitioned run over `[start, end]`
    pub fn new(start: Time, end: Time, time_step: Duration) -> CellflowResult<Self> {
        Self::partitioned(1, 1, 0, start, end, time_step)
    }

    pub fn partitioned(
        subbasin_count: u32,
        outlet_id: u32,
        subbasin_id: u32,
        start: Time,
        end: Time,
        time_step: Duration,
    ) -> CellflowResult<Self> {
        let context = Self {
            subbasin_count,
            outlet_id,
            subbasin_id,
            start,
            end,
            time_step,
        };
        context.validate()?;
        Ok(context)
    }

    fn validate(&self) -> CellflowResult<()> {
        if self.start > self.end {
            return Err(CellflowError::configuration(
                "run",
                format!(
                    "simulation start {} is after simulation end {}",
                    format_time(&self.start),
                    format_time(&self.end)
                ),
            ));
        }
        if self.time_step <= Duration::zero() {
            return Err(CellflowError::configuration(
                "run",
                "the time step must be positive",
            ));
        }
        if self.subbasin_count == 0 {
            return Err(CellflowError::configuration(
                "run",
                "the subbasin count must be at least 1",
            ));
        }
        if self.outlet_id == 0 || self.outlet_id > self.subbasin_count {
            return Err(CellflowError::configuration(
                "run",
                format!(
                    "outlet subbasin {} is not in 1..={}",
                    self.outlet_id, self.subbasin_count
                ),
            ));
        }
        if self.subbasin_id > self.subbasin_count {
            return Err(CellflowError::configuration(
                "run",
                format!(
                    "current subbasin {} is not in 0..={}",
                    self.subbasin_id, self.subbasin_count
                ),
            ));
        }
        Ok(())
    }

    /// True if this process simulates every subbasin
    pub fn is_partitioned(&self) -> bool {
        self.subbasin_id != 0
    }

    /// Test if `time` lies within the simulation period
    pub fn contains(&self, time: &Time) -> bool {
        self.start <= *time && *time <= self.end
    }

    /// Every step of the simulation period, in order
    pub fn steps(&self) -> impl Iterator<Item = StepContext> + '_ {
        let dt = self.time_step;
        std::iter::successors(Some(self.start), move |t| Some(*t + dt))
            .take_while(move |t| *t <= self.end)
            .map(move |t| StepContext::new(t, dt))
    }
}
