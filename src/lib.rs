// ============================================================================
// gridedit Library
// ============================================================================
//
// Edit-overlay and reconciliation engine for editable data grids: tracks
// user edits against a fetched baseline, derives dirty rows, filters the
// working set, and commits single rows or every dirty row through a
// stage -> confirm -> commit protocol.
//
// ============================================================================

pub mod buffer;
pub mod coordinator;
pub mod core;
pub mod facade;
pub mod filter;
pub mod repository;

// Re-export main types for convenience
pub use buffer::EditBuffer;
pub use coordinator::{
    BulkUpdateCoordinator, CommitState, StagedBulkUpdate, StagedUpdate, UpdateCoordinator,
};
pub use crate::core::{
    BaseDataset, DatasetEpoch, Field, GridError, GridSchema, Record, Result, RowEdits, RowId,
    fields_differ, merge_overlay,
};
pub use facade::{EditableGrid, GridStatus, ViewRow};
pub use filter::{FilterCriteria, FilterEngine, FilterSubject};
pub use repository::{
    Candidate, HttpRepository, InMemoryRepository, RemoteRepository, RepositoryConfig,
    RepositoryError, RepositoryResult,
};

/// Open a grid over an in-process repository and fetch it.
///
/// # Examples
///
/// ```
/// use gridedit::{Field, Record, open_in_memory};
///
/// # #[tokio::main]
/// # async fn main() -> gridedit::Result<()> {
/// let (grid, repo) = open_in_memory(vec![
///     Record::new().with(Field::CrmPlantId, "A1"),
///     Record::new().with(Field::CrmPlantId, "B1"),
/// ])
/// .await?;
///
/// let row = grid.row_id(0).await.expect("row 0 exists");
/// grid.set_field(row, Field::CrmPlantId, "A2").await?;
/// grid.stage_update(row).await?;
/// grid.confirm_update().await?;
///
/// assert_eq!(repo.updates().await.len(), 1);
/// assert!(grid.dirty_rows().await.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn open_in_memory(records: Vec<Record>) -> Result<(EditableGrid, InMemoryRepository)> {
    let repo = InMemoryRepository::new(records);
    let grid = EditableGrid::new(std::sync::Arc::new(repo.clone()));
    grid.fetch().await?;
    Ok((grid, repo))
}
