use super::error::{GridError, Result};
use super::record::Field;
use std::collections::BTreeSet;

/// Grid layout: which known fields are shown, and which of those may be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSchema {
    columns: Vec<Field>,
    editable: BTreeSet<Field>,
}

impl GridSchema {
    /// All known fields as columns, only the CRM mapping ids editable
    pub fn new() -> Self {
        Self {
            columns: Field::ALL.to_vec(),
            editable: [Field::CrmPlantId, Field::CrmUnitId].into_iter().collect(),
        }
    }

    /// Set the displayed columns
    pub fn columns(mut self, columns: impl IntoIterator<Item = Field>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    /// Set the editable subset
    pub fn editable(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.editable = fields.into_iter().collect();
        self
    }

    pub fn column_list(&self) -> &[Field] {
        &self.columns
    }

    pub fn editable_fields(&self) -> &BTreeSet<Field> {
        &self.editable
    }

    pub fn is_editable(&self, field: Field) -> bool {
        self.editable.contains(&field)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(GridError::Config("at least one column is required".to_string()));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if !seen.insert(*column) {
                return Err(GridError::Config(format!("column '{}' listed twice", column)));
            }
        }

        if let Some(hidden) = self.editable.iter().find(|f| !seen.contains(*f)) {
            return Err(GridError::Config(format!(
                "editable field '{}' is not a displayed column",
                hidden
            )));
        }

        Ok(())
    }
}

impl Default for GridSchema {
    fn default() -> Self {
        Self::new()
    }
}
