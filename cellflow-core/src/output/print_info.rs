//! Runtime state of one requested output.
//!
//! A [`PrintInfo`] reads its source variable on every step within its time window,
//! folds the values into an accumulator, and emits an [`OutputRecord`] each time the
//! configured interval has elapsed.
//!
//! A sample taken at time `t` covers the step `[t, t + dt)`. The first flush boundary is
//! `start + interval` and boundary `k` is `start + k * interval`, so monthly windows
//! starting at a month end keep following month ends.
//! A step flushes when its end reaches the pending boundary. For a daily step and a
//! 3 day interval starting on day 1, flushes happen on days 3, 6, 9, ...

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::{FloatValue, SharedGrid};
use crate::time::{format_time, parse_required_time, StepContext, Time};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::item::{AggregationType, IntervalUnit, OrgOutItem, SubbasinSelector};

/// One emitted output value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Timestamp of the step that triggered the flush
    pub time: Time,
    /// Number of samples folded into the values
    pub samples: usize,
    /// Aggregated value of every cell
    pub values: Vec<FloatValue>,
}

/// Running per-cell reduction of the samples since the last flush
#[derive(Debug, Clone)]
struct Accumulator {
    aggregation: AggregationType,
    values: Vec<FloatValue>,
    count: usize,
}

impl Accumulator {
    fn new(aggregation: AggregationType) -> Self {
        Self {
            aggregation,
            values: Vec::new(),
            count: 0,
        }
    }

    fn fold(&mut self, sample: &[FloatValue]) {
        if self.count == 0 || self.values.len() != sample.len() {
            self.values = sample.to_vec();
            self.count = 1;
            return;
        }
        let fold: fn(FloatValue, FloatValue) -> FloatValue = match self.aggregation {
            AggregationType::Instantaneous => |_, x| x,
            AggregationType::Sum | AggregationType::Average => |acc, x| acc + x,
            AggregationType::Min => FloatValue::min,
            AggregationType::Max => FloatValue::max,
        };
        self.values
            .iter_mut()
            .zip(sample)
            .for_each(|(acc, x)| *acc = fold(*acc, *x));
        self.count += 1;
    }

    fn value(&self) -> Vec<FloatValue> {
        match self.aggregation {
            AggregationType::Average => {
                let n = self.count as FloatValue;
                self.values.iter().map(|v| v / n).collect()
            }
            _ => self.values.clone(),
        }
    }

    fn reset(&mut self) {
        self.values.clear();
        self.count = 0;
    }
}

/// Runtime counterpart of one [`OrgOutItem`]
#[derive(Debug, Clone)]
pub struct PrintInfo {
    output_id: String,
    module_class: String,
    description: String,
    target_name: String,
    unit: String,
    aggregation: AggregationType,
    interval: u32,
    interval_unit: IntervalUnit,
    selector: SubbasinSelector,
    subbasin_id: u32,
    start: Time,
    end: Time,
    source: Option<SharedGrid>,
    accumulator: Accumulator,
    last_flush: Option<Time>,
    /// Index of the next flush boundary, counted in intervals from `start`
    boundary: u32,
    next_flush: Option<Time>,
    records: Vec<OutputRecord>,
}

impl PrintInfo {
    /// Parse a raw output item
    ///
    /// `subbasin_id` is the subbasin the output targets in this process, 0 for all.
    /// The time window is parsed and ordered here; checking it against the simulation
    /// period is done by [`PrintInfo::check_date`].
    pub fn from_item(item: &OrgOutItem, subbasin_id: u32) -> CellflowResult<Self> {
        let id = item.output_id.as_str();
        if id.trim().is_empty() {
            return Err(CellflowError::configuration(
                "output",
                "an output item has no output id",
            ));
        }

        let aggregation = AggregationType::parse(&item.agg_type).ok_or_else(|| {
            CellflowError::configuration(
                id,
                format!("unknown aggregation type '{}'", item.agg_type),
            )
        })?;
        let interval_unit = IntervalUnit::parse(&item.interval_unit).ok_or_else(|| {
            CellflowError::configuration(
                id,
                format!("unknown interval unit '{}'", item.interval_unit),
            )
        })?;
        let interval = u32::try_from(item.interval)
            .ok()
            .filter(|interval| *interval > 0)
            .ok_or_else(|| {
                CellflowError::configuration(
                    id,
                    format!("interval must be at least 1, got {}", item.interval),
                )
            })?;
        let selector = SubbasinSelector::parse(&item.sub_bsn).ok_or_else(|| {
            CellflowError::configuration(
                id,
                format!("invalid subbasin selector '{}'", item.sub_bsn),
            )
        })?;

        let start = parse_required_time(&item.s_time, id, "start time")?;
        let end = parse_required_time(&item.e_time, id, "end time")?;
        if end < start {
            return Err(CellflowError::configuration(
                id,
                format!(
                    "end time {} is before start time {}",
                    format_time(&end),
                    format_time(&start)
                ),
            ));
        }

        Ok(Self {
            output_id: item.output_id.clone(),
            module_class: item.mod_cls.clone(),
            description: item.description.clone(),
            target_name: item.out_file_name.clone(),
            unit: item.unit.clone(),
            aggregation,
            interval,
            interval_unit,
            selector,
            subbasin_id,
            start,
            end,
            source: None,
            accumulator: Accumulator::new(aggregation),
            last_flush: None,
            boundary: 1,
            next_flush: interval_unit.advance(start, interval),
            records: Vec::new(),
        })
    }

    /// Check that the time window lies within the simulation period `[start, end]`
    pub fn check_date(&self, start: Time, end: Time) -> CellflowResult<()> {
        if self.start < start || self.end > end {
            return Err(CellflowError::configuration(
                &self.output_id,
                format!(
                    "time window {} - {} is outside the simulation period {} - {}",
                    format_time(&self.start),
                    format_time(&self.end),
                    format_time(&start),
                    format_time(&end)
                ),
            ));
        }
        Ok(())
    }

    /// Attach the array this output reads from
    pub fn bind(&mut self, source: SharedGrid) {
        self.source = Some(source);
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    /// Test if `time` is inside the time window
    pub fn is_active(&self, time: &Time) -> bool {
        self.start <= *time && *time <= self.end
    }

    /// Fold the current value of the source variable and flush if the interval elapsed
    ///
    /// Steps outside the time window are ignored. Returns the new record if one was emitted.
    pub fn update(&mut self, step: &StepContext) -> CellflowResult<Option<&OutputRecord>> {
        if !self.is_active(&step.time) {
            return Ok(None);
        }
        let source = self.source.as_ref().ok_or_else(|| {
            CellflowError::configuration(&self.output_id, "output is not bound to a variable")
        })?;
        self.accumulator.fold(&source.read());

        let step_end = step.end();
        let due = matches!(self.next_flush, Some(next) if step_end >= next);
        if !due {
            return Ok(None);
        }

        let record = OutputRecord {
            time: step.time,
            samples: self.accumulator.count,
            values: self.accumulator.value(),
        };
        self.accumulator.reset();
        self.last_flush = Some(step.time);
        // Skip any boundaries already passed, a step longer than the interval flushes once
        while self.next_flush.is_some_and(|next| next <= step_end) {
            self.boundary = self.boundary.saturating_add(1);
            self.next_flush = self.boundary_time(self.boundary);
        }
        debug!(
            output = %self.output_id,
            time = %format_time(&step.time),
            samples = record.samples,
            "Flushed output"
        );
        self.records.push(record);
        Ok(self.records.last())
    }

    fn boundary_time(&self, boundary: u32) -> Option<Time> {
        boundary
            .checked_mul(self.interval)
            .and_then(|count| self.interval_unit.advance(self.start, count))
    }

    pub fn output_id(&self) -> &str {
        &self.output_id
    }

    pub fn module_class(&self) -> &str {
        &self.module_class
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn aggregation(&self) -> AggregationType {
        self.aggregation
    }

    pub fn interval(&self) -> (u32, IntervalUnit) {
        (self.interval, self.interval_unit)
    }

    pub fn selector(&self) -> &SubbasinSelector {
        &self.selector
    }

    /// Subbasin targeted by this output, 0 for all
    pub fn subbasin_id(&self) -> u32 {
        self.subbasin_id
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn end(&self) -> Time {
        self.end
    }

    pub fn last_flush(&self) -> Option<Time> {
        self.last_flush
    }

    /// Every record emitted so far, oldest first
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    /// Number of samples folded since the last flush
    pub fn pending_samples(&self) -> usize {
        self.accumulator.count
    }

    /// Remove and return the emitted records, e.g. after they have been persisted
    pub fn take_records(&mut self) -> Vec<OutputRecord> {
        std::mem::take(&mut self.records)
    }
}
