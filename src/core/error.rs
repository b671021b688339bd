use thiserror::Error;

use super::dataset::RowId;
use super::record::Field;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("No changes to stage")]
    NoChanges,

    #[error("Busy: {0} already in flight")]
    Busy(&'static str),

    #[error("Update failed: {0}")]
    UpdateRejected(String),

    #[error("Bulk update failed: {0}")]
    BulkUpdateRejected(String),

    #[error("Field '{0}' is not editable")]
    NotEditable(Field),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Row {0} belongs to a replaced dataset")]
    StaleRow(RowId),

    #[error("Row {0} not found")]
    RowNotFound(RowId),

    #[error("Nothing staged for {0}")]
    NothingStaged(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GridError {
    /// True for refusals the caller can simply ignore (nothing was sent).
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            GridError::NoChanges | GridError::Busy(_) | GridError::NothingStaged(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
