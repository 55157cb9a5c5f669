//! Grid-sized cell arrays shared between modules.
//!
//! Every array is owned by exactly one producer. The producer holds an [`OwnedGrid`],
//! the only handle that can write. Consumers receive a [`SharedGrid`], a cheap clonable
//! handle that can only read. Both point at the same storage, so binding an output of one
//! module to the input of another never copies data.
//!
//! The length of an array is fixed when it is allocated. The guards returned by
//! [`OwnedGrid::write`] and [`SharedGrid::read`] dereference to slices, so no holder can
//! grow or shrink an array after it has been bound.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type FloatValue = f64;

/// The exclusive-writer handle to a cell array
#[derive(Debug)]
pub struct OwnedGrid {
    data: Arc<RwLock<Vec<FloatValue>>>,
    len: usize,
}

impl OwnedGrid {
    /// Allocate an array of `n_cells` values all set to `value`
    pub fn filled(n_cells: usize, value: FloatValue) -> Self {
        Self::from_vec(vec![value; n_cells])
    }

    pub fn from_vec(values: Vec<FloatValue>) -> Self {
        let len = values.len();
        Self {
            data: Arc::new(RwLock::new(values)),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Create a read-only handle to the same storage
    pub fn share(&self) -> SharedGrid {
        SharedGrid {
            data: self.data.clone(),
            len: self.len,
        }
    }

    /// Lock the array for writing
    ///
    /// Requires `&mut self` so that the owner is the only writer, even though the
    /// storage itself is shared.
    pub fn write(&mut self) -> GridWriteGuard<'_> {
        GridWriteGuard(self.data.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn read(&self) -> GridReadGuard<'_> {
        GridReadGuard(self.data.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Overwrite every cell with the values in `values`
    ///
    /// Returns false, leaving the array untouched, if the lengths differ.
    pub fn copy_from(&mut self, values: &[FloatValue]) -> bool {
        if values.len() != self.len {
            return false;
        }
        self.write().copy_from_slice(values);
        true
    }
}

/// A shared, read-only handle to a cell array owned by someone else
#[derive(Debug, Clone)]
pub struct SharedGrid {
    data: Arc<RwLock<Vec<FloatValue>>>,
    len: usize,
}

impl SharedGrid {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read(&self) -> GridReadGuard<'_> {
        GridReadGuard(self.data.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy the current values out of the array
    pub fn to_vec(&self) -> Vec<FloatValue> {
        self.read().to_vec()
    }

    /// Test if two handles point at the same storage
    pub fn ptr_eq(&self, other: &SharedGrid) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// Read access to a cell array
#[derive(Debug)]
pub struct GridReadGuard<'a>(RwLockReadGuard<'a, Vec<FloatValue>>);

impl Deref for GridReadGuard<'_> {
    type Target = [FloatValue];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

/// Write access to a cell array
#[derive(Debug)]
pub struct GridWriteGuard<'a>(RwLockWriteGuard<'a, Vec<FloatValue>>);

impl Deref for GridWriteGuard<'_> {
    type Target = [FloatValue];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl DerefMut for GridWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut_slice()
    }
}
