//! The registry of every output requested for a run.

use crate::context::RunContext;
use crate::errors::{CellflowError, CellflowResult};
use crate::store::VariableStore;
use crate::time::{format_time, StepContext, Time};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use super::item::{OrgOutItem, SubbasinSelector};
use super::print_info::PrintInfo;

/// Ordered collection of [`PrintInfo`]s, looked up by output id
///
/// Entries are updated in the order they were listed in the output item table.
#[derive(Debug, Clone)]
pub struct SettingsOutput {
    print_infos: Vec<PrintInfo>,
    index: HashMap<String, usize>,
    subbasin_count: u32,
    outlet_id: u32,
    subbasin_id: u32,
}

impl SettingsOutput {
    /// An empty registry for the partition described by `context`
    pub fn empty(context: &RunContext) -> Self {
        Self {
            print_infos: Vec::new(),
            index: HashMap::new(),
            subbasin_count: context.subbasin_count,
            outlet_id: context.outlet_id,
            subbasin_id: context.subbasin_id,
        }
    }

    /// Build the registry from the output item table
    ///
    /// Disabled items are skipped, as are items whose subbasin selector does not apply
    /// to the subbasin simulated by this process. Every remaining item must parse and
    /// its time window must lie within the simulation period.
    pub fn new(context: &RunContext, items: &[OrgOutItem]) -> CellflowResult<Self> {
        let mut settings = Self::empty(context);
        for item in items {
            if !item.is_enabled()? {
                debug!(output = %item.output_id, "Skipping disabled output");
                continue;
            }
            if let Some(print_info) = settings.parse_item(item)? {
                print_info.check_date(context.start, context.end)?;
                settings.insert(print_info)?;
            }
        }
        info!(outputs = settings.len(), "Created output schedule");
        Ok(settings)
    }

    /// Resolve one item against the partition, `None` if it does not apply here
    fn parse_item(&self, item: &OrgOutItem) -> CellflowResult<Option<PrintInfo>> {
        let selector = SubbasinSelector::parse(&item.sub_bsn).ok_or_else(|| {
            CellflowError::configuration(
                &item.output_id,
                format!("invalid subbasin selector '{}'", item.sub_bsn),
            )
        })?;
        if let SubbasinSelector::Ids(ids) = &selector {
            if let Some(id) = ids.iter().find(|id| **id > self.subbasin_count) {
                return Err(CellflowError::configuration(
                    &item.output_id,
                    format!(
                        "subbasin {} does not exist, the watershed has {} subbasins",
                        id, self.subbasin_count
                    ),
                ));
            }
        }
        match selector.target(self.subbasin_id, self.outlet_id) {
            Some(target) => PrintInfo::from_item(item, target).map(Some),
            None => {
                debug!(
                    output = %item.output_id,
                    subbasin = self.subbasin_id,
                    "Output does not apply to this subbasin"
                );
                Ok(None)
            }
        }
    }

    /// Register an entry
    ///
    /// Fails if an entry with the same output id exists, leaving the existing one in place.
    pub fn insert(&mut self, print_info: PrintInfo) -> CellflowResult<()> {
        if self.index.contains_key(print_info.output_id()) {
            return Err(CellflowError::configuration(
                print_info.output_id(),
                "output is listed more than once",
            ));
        }
        self.index
            .insert(print_info.output_id().to_string(), self.print_infos.len());
        self.print_infos.push(print_info);
        Ok(())
    }

    /// Check every entry's time window against `[start, end]`
    pub fn check_date(&self, start: Time, end: Time) -> CellflowResult<()> {
        self.print_infos
            .iter()
            .try_for_each(|print_info| print_info.check_date(start, end))
    }

    /// Attach every entry to the variable it reports
    ///
    /// The variable must exist in `store`. If the item names a module class, the
    /// variable must be produced by that module.
    pub fn bind(&mut self, store: &VariableStore) -> CellflowResult<()> {
        for print_info in self.print_infos.iter_mut() {
            let entry = store.entry(print_info.output_id()).ok_or_else(|| {
                CellflowError::configuration(
                    print_info.output_id(),
                    "no module produces this output and it is not supplied externally",
                )
            })?;
            let module_class = print_info.module_class();
            if !module_class.is_empty() && module_class != entry.owner {
                return Err(CellflowError::configuration(
                    print_info.output_id(),
                    format!(
                        "output is produced by '{}', not by '{}'",
                        entry.owner, module_class
                    ),
                ));
            }
            print_info.bind(entry.grid.clone());
            debug!(output = %print_info.output_id(), owner = %entry.owner, "Bound output");
        }
        Ok(())
    }

    /// Update every entry for one time step, in registration order
    pub fn update(&mut self, step: &StepContext) -> CellflowResult<()> {
        for print_info in self.print_infos.iter_mut() {
            print_info.update(step)?;
        }
        Ok(())
    }

    pub fn get(&self, output_id: &str) -> Option<&PrintInfo> {
        self.index.get(output_id).map(|&i| &self.print_infos[i])
    }

    pub fn get_mut(&mut self, output_id: &str) -> Option<&mut PrintInfo> {
        self.index
            .get(output_id)
            .map(|&i| &mut self.print_infos[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrintInfo> {
        self.print_infos.iter()
    }

    pub fn len(&self) -> usize {
        self.print_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.print_infos.is_empty()
    }

    /// Write a human readable description of the schedule
    pub fn dump<W: Write>(&self, writer: &mut W) -> CellflowResult<()> {
        writeln!(
            writer,
            "Output schedule: {} entries, subbasin {} of {}, outlet {}",
            self.len(),
            self.subbasin_id,
            self.subbasin_count,
            self.outlet_id
        )?;
        for print_info in &self.print_infos {
            let (interval, unit) = print_info.interval();
            writeln!(writer, "{}", print_info.output_id())?;
            writeln!(writer, "  module: {}", print_info.module_class())?;
            if !print_info.description().is_empty() {
                writeln!(writer, "  description: {}", print_info.description())?;
            }
            writeln!(writer, "  aggregation: {}", print_info.aggregation())?;
            writeln!(writer, "  interval: {} {}", interval, unit)?;
            writeln!(
                writer,
                "  window: {} - {}",
                format_time(&print_info.start()),
                format_time(&print_info.end())
            )?;
            writeln!(
                writer,
                "  subbasin: {} ({})",
                print_info.subbasin_id(),
                print_info.selector()
            )?;
            writeln!(writer, "  unit: {}", print_info.unit())?;
            writeln!(writer, "  target: {}", print_info.target_name())?;
        }
        Ok(())
    }

    pub fn dump_to_file<P: AsRef<Path>>(&self, path: P) -> CellflowResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.dump(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OwnedGrid;
    use crate::store::EXTERNAL_OWNER;
    use crate::time::parse_time;
    use chrono::Duration;

    fn context(subbasin_id: u32) -> RunContext {
        RunContext::partitioned(
            4,
            2,
            subbasin_id,
            parse_time("2010-01-01").unwrap(),
            parse_time("2010-12-31").unwrap(),
            Duration::days(1),
        )
        .unwrap()
    }

    fn item(output_id: &str, sub_bsn: &str) -> OrgOutItem {
        OrgOutItem {
            mod_cls: "PI_MCS".to_string(),
            output_id: output_id.to_string(),
            agg_type: "SUM".to_string(),
            sub_bsn: sub_bsn.to_string(),
            interval_unit: "DAY".to_string(),
            s_time: "2010-01-01".to_string(),
            e_time: "2010-01-10".to_string(),
            out_file_name: format!("{}.txt", output_id),
            interval: 1,
            use_flag: 1,
            ..OrgOutItem::default()
        }
    }

    #[test]
    fn builds_entries_in_order() {
        let settings = SettingsOutput::new(
            &context(0),
            &[item("NEPR", ""), item("INLO", ""), item("canstor", "")],
        )
        .unwrap();
        let ids: Vec<&str> = settings.iter().map(|p| p.output_id()).collect();
        assert_eq!(ids, vec!["NEPR", "INLO", "canstor"]);
        assert!(settings.get("INLO").is_some());
        assert!(settings.get("INET").is_none());
    }

    #[test]
    fn disabled_items_are_skipped() {
        let mut disabled = item("INLO", "");
        disabled.use_flag = 0;
        let settings = SettingsOutput::new(&context(0), &[disabled, item("NEPR", "")]).unwrap();
        assert_eq!(settings.len(), 1);

        let mut unset = item("INLO", "");
        unset.use_flag = -1;
        assert!(SettingsOutput::new(&context(0), &[unset]).is_err());
    }

    #[test]
    fn duplicate_id_keeps_first_entry() {
        let mut settings = SettingsOutput::new(&context(0), &[item("INLO", "")]).unwrap();
        let mut second = item("INLO", "");
        second.agg_type = "MAX".to_string();
        let err = settings
            .insert(PrintInfo::from_item(&second, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, CellflowError::Configuration { .. }));
        assert_eq!(settings.len(), 1);
        assert_eq!(
            settings.get("INLO").unwrap().aggregation(),
            crate::output::AggregationType::Sum
        );

        assert!(SettingsOutput::new(&context(0), &[item("INLO", ""), item("INLO", "")]).is_err());
    }

    #[test]
    fn window_must_be_in_period() {
        let mut late = item("INLO", "");
        late.e_time = "2011-01-05".to_string();
        assert!(matches!(
            SettingsOutput::new(&context(0), &[late]),
            Err(CellflowError::Configuration { .. })
        ));

        let mut reversed = item("INLO", "");
        reversed.s_time = "2010-02-01".to_string();
        assert!(SettingsOutput::new(&context(0), &[reversed]).is_err());

        let settings = SettingsOutput::new(&context(0), &[item("INLO", "")]).unwrap();
        assert!(settings
            .check_date(
                parse_time("2010-01-02").unwrap(),
                parse_time("2010-12-31").unwrap()
            )
            .is_err());
    }

    #[test]
    fn partition_filtering() {
        let items = [
            item("ALL", "ALL"),
            item("OUTLET", "OUTLET"),
            item("THREE", "3"),
            item("ONE_TWO", "1,2"),
        ];

        // Non-partitioned runs keep everything
        let settings = SettingsOutput::new(&context(0), &items).unwrap();
        assert_eq!(settings.len(), 4);
        assert_eq!(settings.get("OUTLET").unwrap().subbasin_id(), 2);
        assert_eq!(settings.get("THREE").unwrap().subbasin_id(), 3);
        assert_eq!(settings.get("ONE_TWO").unwrap().subbasin_id(), 0);

        // Subbasin 2 holds the outlet
        let settings = SettingsOutput::new(&context(2), &items).unwrap();
        let ids: Vec<&str> = settings.iter().map(|p| p.output_id()).collect();
        assert_eq!(ids, vec!["ALL", "OUTLET", "ONE_TWO"]);

        let settings = SettingsOutput::new(&context(3), &items).unwrap();
        let ids: Vec<&str> = settings.iter().map(|p| p.output_id()).collect();
        assert_eq!(ids, vec!["ALL", "THREE"]);
    }

    #[test]
    fn unknown_subbasin_is_rejected() {
        assert!(SettingsOutput::new(&context(0), &[item("INLO", "5")]).is_err());
        assert!(SettingsOutput::new(&context(0), &[item("INLO", "x")]).is_err());
    }

    #[test]
    fn bind_checks_producer() {
        let grid = OwnedGrid::filled(3, 1.0);
        let mut store = VariableStore::new();
        store.insert("INLO", "PI_MCS", "mm", grid.share()).unwrap();
        store.insert("D_P", EXTERNAL_OWNER, "mm", grid.share()).unwrap();

        let mut settings = SettingsOutput::new(&context(0), &[item("INLO", "")]).unwrap();
        settings.bind(&store).unwrap();
        assert!(settings.get("INLO").unwrap().is_bound());

        let mut forcing = item("D_P", "");
        forcing.mod_cls = String::new();
        let mut settings = SettingsOutput::new(&context(0), &[forcing]).unwrap();
        settings.bind(&store).unwrap();

        let mut settings = SettingsOutput::new(&context(0), &[item("D_P", "")]).unwrap();
        assert!(settings.bind(&store).is_err());

        let mut settings = SettingsOutput::new(&context(0), &[item("NEPR", "")]).unwrap();
        assert!(settings.bind(&store).is_err());
    }

    #[test]
    fn update_visits_every_entry() {
        let mut grid = OwnedGrid::filled(2, 0.0);
        let mut store = VariableStore::new();
        store.insert("INLO", "PI_MCS", "mm", grid.share()).unwrap();
        store.insert("NEPR", "PI_MCS", "mm", grid.share()).unwrap();

        let mut settings =
            SettingsOutput::new(&context(0), &[item("INLO", ""), item("NEPR", "")]).unwrap();
        settings.bind(&store).unwrap();

        let ctx = context(0);
        for step in ctx.steps().take(3) {
            assert!(grid.copy_from(&[1.0, 2.0]));
            settings.update(&step).unwrap();
        }
        for print_info in settings.iter() {
            assert_eq!(print_info.records().len(), 3);
            assert_eq!(print_info.records()[2].values, vec![1.0, 2.0]);
        }
    }

    #[test]
    fn dump_describes_schedule() {
        let mut described = item("INLO", "OUTLET");
        described.description = "Interception loss".to_string();
        let settings = SettingsOutput::new(&context(0), &[described]).unwrap();

        let mut buffer = Vec::new();
        settings.dump(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("Output schedule: 1 entries"));
        assert!(text.contains("INLO\n"));
        assert!(text.contains("  description: Interception loss\n"));
        assert!(text.contains("  aggregation: SUM\n"));
        assert!(text.contains("  interval: 1 DAY\n"));
        assert!(text.contains("  window: 2010-01-01 00:00:00 - 2010-01-10 00:00:00\n"));
        assert!(text.contains("  subbasin: 2 (OUTLET)\n"));
        assert!(text.contains("  target: INLO.txt\n"));
    }
}
