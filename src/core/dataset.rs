// ============================================================================
// Base Dataset
// ============================================================================
//
// The last fetched, authoritative rows. Row identity is the position in the
// dataset *and* the fetch generation (epoch) that produced it, so a RowId
// handed out before a refetch can never address a row of the new dataset.
//
// Rows live in a persistent vector: snapshots handed to readers are O(1)
// and unaffected by later folds.
//
// ============================================================================

use super::error::{GridError, Result};
use super::record::{Field, Record};
use im::Vector;
use std::collections::BTreeSet;
use std::fmt;

/// Fetch generation. Epoch 0 is the empty dataset before the first fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DatasetEpoch(pub u64);

impl DatasetEpoch {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        DatasetEpoch(self.0 + 1)
    }
}

impl fmt::Display for DatasetEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch_{}", self.0)
    }
}

/// Identity of a row within one fetched dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    epoch: DatasetEpoch,
    index: usize,
}

impl RowId {
    pub fn epoch(&self) -> DatasetEpoch {
        self.epoch
    }

    /// Position in the fetched dataset (not the filtered view)
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.index, self.epoch)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BaseDataset {
    epoch: DatasetEpoch,
    records: Vector<Record>,
}

impl BaseDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every row wholesale, invalidating all outstanding RowIds.
    pub fn replace(&mut self, records: Vec<Record>) -> DatasetEpoch {
        self.epoch = self.epoch.next();
        self.records = records.into_iter().collect();
        self.epoch
    }

    pub fn epoch(&self) -> DatasetEpoch {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// RowId for the row at `index` in the current dataset
    pub fn row_id(&self, index: usize) -> Option<RowId> {
        (index < self.records.len()).then_some(RowId {
            epoch: self.epoch,
            index,
        })
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> {
        let epoch = self.epoch;
        (0..self.records.len()).map(move |index| RowId { epoch, index })
    }

    /// Checks that `row` addresses a row of the current dataset.
    pub fn check(&self, row: RowId) -> Result<()> {
        if row.epoch != self.epoch {
            return Err(GridError::StaleRow(row));
        }
        if row.index >= self.records.len() {
            return Err(GridError::RowNotFound(row));
        }
        Ok(())
    }

    pub fn get(&self, row: RowId) -> Result<&Record> {
        self.check(row)?;
        self.records
            .get(row.index)
            .ok_or(GridError::RowNotFound(row))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Record)> {
        let epoch = self.epoch;
        self.records
            .iter()
            .enumerate()
            .map(move |(index, record)| (RowId { epoch, index }, record))
    }

    /// Copy the editable fields of a committed candidate into the base row.
    pub fn fold(&mut self, row: RowId, candidate: &Record, editable: &BTreeSet<Field>) -> Result<()> {
        self.check(row)?;
        let record = self
            .records
            .get_mut(row.index)
            .ok_or(GridError::RowNotFound(row))?;
        for field in editable {
            match candidate.get(*field) {
                Some(value) => record.set(*field, value),
                None => {
                    record.remove(*field);
                }
            }
        }
        Ok(())
    }

    /// Cheap copy of the current rows
    pub fn snapshot(&self) -> Vector<Record> {
        self.records.clone()
    }
}
