// ============================================================================
// Edit Buffer
// ============================================================================
//
// Sparse overlay of pending edits keyed by RowId. The buffer only ever
// holds editable fields whose value differs from the base row: writing a
// value back to what the base already has removes the key, and a row with
// no keys left is removed. The empty string is an ordinary value.
//
// Dirtiness is still derived structurally (merge + diff) rather than from
// key presence, so the answer stays correct even when the base row moves
// under an entry that was written earlier.
//
// ============================================================================

use crate::core::record::same_value;
use crate::core::{BaseDataset, Field, GridError, Result, RowEdits, RowId, fields_differ, merge_overlay};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct EditBuffer {
    editable: BTreeSet<Field>,
    overlay: BTreeMap<RowId, RowEdits>,
}

impl EditBuffer {
    pub fn new(editable: BTreeSet<Field>) -> Self {
        Self {
            editable,
            overlay: BTreeMap::new(),
        }
    }

    pub fn editable_fields(&self) -> &BTreeSet<Field> {
        &self.editable
    }

    /// Record a user edit. Last write wins per `(row, field)`.
    pub fn set_field(
        &mut self,
        base: &BaseDataset,
        row: RowId,
        field: Field,
        value: impl Into<String>,
    ) -> Result<()> {
        if !self.editable.contains(&field) {
            warn!("Rejected write to read-only field {} on row {}", field, row);
            return Err(GridError::NotEditable(field));
        }
        let record = base.get(row)?;
        let value = value.into();

        if same_value(record.get(field), Some(&value)) {
            if let Some(edits) = self.overlay.get_mut(&row) {
                edits.remove(&field);
                if edits.is_empty() {
                    self.overlay.remove(&row);
                }
            }
            debug!("Row {} field {} reverted to base value", row, field);
            return Ok(());
        }

        self.overlay.entry(row).or_default().insert(field, value);
        debug!("Row {} field {} edited", row, field);
        Ok(())
    }

    /// Overlay value if present, else the base value.
    pub fn get_effective<'a>(
        &'a self,
        base: &'a BaseDataset,
        row: RowId,
        field: Field,
    ) -> Result<Option<&'a str>> {
        let record = base.get(row)?;
        let edited = self
            .overlay
            .get(&row)
            .and_then(|edits| edits.get(&field))
            .map(String::as_str);
        Ok(edited.or_else(|| record.get(field)))
    }

    /// Pending edits for `row`, if any
    pub fn edits(&self, row: RowId) -> Option<&RowEdits> {
        self.overlay.get(&row)
    }

    pub fn is_dirty(&self, base: &BaseDataset, row: RowId) -> bool {
        let (Some(edits), Ok(record)) = (self.overlay.get(&row), base.get(row)) else {
            return false;
        };
        let merged = merge_overlay(record, edits);
        fields_differ(record, &merged, &self.editable)
    }

    /// Every dirty row, in dataset order
    pub fn dirty_rows(&self, base: &BaseDataset) -> Vec<RowId> {
        self.overlay
            .keys()
            .copied()
            .filter(|row| self.is_dirty(base, *row))
            .collect()
    }

    pub fn clear_row(&mut self, row: RowId) {
        if self.overlay.remove(&row).is_some() {
            debug!("Cleared overlay for row {}", row);
        }
    }

    /// Clear exactly `rows`; anything else stays pending.
    pub fn clear_rows(&mut self, rows: &[RowId]) {
        for row in rows {
            self.clear_row(*row);
        }
    }

    /// Drop every pending edit. Called whenever the base dataset is replaced.
    pub fn reset(&mut self) {
        if !self.overlay.is_empty() {
            debug!("Discarding {} pending row edit(s)", self.overlay.len());
        }
        self.overlay.clear();
    }

    /// Number of rows with an overlay entry
    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }
}
