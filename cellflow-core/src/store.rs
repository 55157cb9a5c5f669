//! The run-wide variable store.
//!
//! Maps variable names to the grid arrays bound during a run. The store does not own
//! any array storage, it holds [`SharedGrid`] handles together with the tag of the
//! component that owns (writes) each array.

use crate::errors::{CellflowError, CellflowResult};
use crate::grid::SharedGrid;
use std::collections::HashMap;
use tracing::debug;

/// Owner tag used for arrays supplied from outside of the module pipeline
pub const EXTERNAL_OWNER: &str = "external";

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub grid: SharedGrid,
    pub owner: String,
    pub unit: String,
}

/// A collection of grid arrays keyed by variable name
///
/// The first array inserted establishes the cell count for the run.
/// Every later array must have exactly the same length.
#[derive(Debug, Default)]
pub struct VariableStore {
    n_cells: Option<usize>,
    entries: HashMap<String, StoreEntry>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells of every array in the store, once established
    pub fn n_cells(&self) -> Option<usize> {
        self.n_cells
    }

    /// Register an array under `name`
    ///
    /// Fails if the array is empty, if its length differs from the established cell count,
    /// or if `name` is already owned by a different component.
    /// Registering the same handle again by its owner is a no-op.
    pub fn insert(
        &mut self,
        name: &str,
        owner: &str,
        unit: &str,
        grid: SharedGrid,
    ) -> CellflowResult<()> {
        if grid.is_empty() {
            return Err(CellflowError::InvalidSize {
                module: owner.to_string(),
                name: name.to_string(),
            });
        }
        match self.n_cells {
            Some(expected) if expected != grid.len() => {
                return Err(CellflowError::InconsistentSize {
                    module: owner.to_string(),
                    name: name.to_string(),
                    expected,
                    actual: grid.len(),
                });
            }
            Some(_) => {}
            None => self.n_cells = Some(grid.len()),
        }

        if let Some(existing) = self.entries.get(name) {
            if existing.owner == owner && existing.grid.ptr_eq(&grid) {
                return Ok(());
            }
            return Err(CellflowError::configuration(
                name,
                format!(
                    "variable is already produced by '{}', '{}' can not produce it too",
                    existing.owner, owner
                ),
            ));
        }

        debug!(variable = name, owner, cells = grid.len(), "Bound variable");
        self.entries.insert(
            name.to_string(),
            StoreEntry {
                grid,
                owner: owner.to_string(),
                unit: unit.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SharedGrid> {
        self.entries.get(name).map(|entry| &entry.grid)
    }

    pub fn entry(&self, name: &str) -> Option<&StoreEntry> {
        self.entries.get(name)
    }

    /// The component that writes the variable
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|entry| entry.owner.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Variable names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OwnedGrid;

    #[test]
    fn first_array_sets_cell_count() {
        let mut store = VariableStore::new();
        assert_eq!(store.n_cells(), None);

        let pcp = OwnedGrid::filled(4, 0.0);
        store
            .insert("D_P", EXTERNAL_OWNER, "mm", pcp.share())
            .unwrap();
        assert_eq!(store.n_cells(), Some(4));
        assert_eq!(store.owner("D_P"), Some(EXTERNAL_OWNER));
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let mut store = VariableStore::new();
        let a = OwnedGrid::filled(4, 0.0);
        let b = OwnedGrid::filled(5, 0.0);
        store.insert("A", EXTERNAL_OWNER, "", a.share()).unwrap();

        let err = store.insert("B", "MOD", "", b.share()).unwrap_err();
        assert!(matches!(
            err,
            CellflowError::InconsistentSize {
                expected: 4,
                actual: 5,
                ..
            }
        ));
        assert!(!store.contains("B"));
    }

    #[test]
    fn empty_array_is_rejected() {
        let mut store = VariableStore::new();
        let a = OwnedGrid::from_vec(vec![]);
        let err = store.insert("A", EXTERNAL_OWNER, "", a.share()).unwrap_err();
        assert!(matches!(err, CellflowError::InvalidSize { .. }));
        assert_eq!(store.n_cells(), None);
    }

    #[test]
    fn second_owner_is_rejected() {
        let mut store = VariableStore::new();
        let a = OwnedGrid::filled(2, 0.0);
        let b = OwnedGrid::filled(2, 0.0);
        store.insert("X", "FIRST", "", a.share()).unwrap();

        // Re-binding the same handle is fine
        store.insert("X", "FIRST", "", a.share()).unwrap();

        let err = store.insert("X", "SECOND", "", b.share()).unwrap_err();
        assert!(matches!(err, CellflowError::Configuration { .. }));
        assert_eq!(store.owner("X"), Some("FIRST"));
    }
}
