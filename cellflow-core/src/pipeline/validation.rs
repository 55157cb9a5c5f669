//! Validation functions for pipeline building.

use crate::errors::{CellflowError, CellflowResult};
use crate::module::RequirementDefinition;
use std::collections::HashMap;

/// A variable seen while building the pipeline.
#[derive(Debug)]
pub(crate) struct VariableDefinition {
    pub unit: String,
    pub module: String,
}

/// Checks if the new definition is consistent with any earlier definition of the same name.
///
/// Producers and consumers of a variable must agree on its unit.
/// An empty unit is treated as unknown and matches anything.
pub(crate) fn verify_definition(
    definitions: &mut HashMap<String, VariableDefinition>,
    definition: &RequirementDefinition,
    module: &str,
) -> CellflowResult<()> {
    match definitions.get(&definition.name) {
        Some(existing) => {
            if !existing.unit.is_empty()
                && !definition.unit.is_empty()
                && existing.unit != definition.unit
            {
                return Err(CellflowError::configuration(
                    &definition.name,
                    format!(
                        "unit mismatch: module '{}' uses '{}' but module '{}' uses '{}'. \
                         All producers and consumers of a variable must use the same unit",
                        existing.module, existing.unit, module, definition.unit
                    ),
                ));
            }
        }
        None => {
            definitions.insert(
                definition.name.clone(),
                VariableDefinition {
                    unit: definition.unit.clone(),
                    module: module.to_string(),
                },
            );
        }
    }
    Ok(())
}
