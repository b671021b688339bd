// ============================================================================
// Editable Grid
// ============================================================================
//
// The one owner of the base dataset, the edit overlay, the filter and both
// commit coordinators. Every mutation goes through the methods below.
//
// The handle is cheap to clone. State sits behind an async mutex that is
// never held across a repository call: a commit in flight suspends only its
// own coordinator, and users keep editing and filtering meanwhile. Commits
// run on spawned tasks so a dropped caller never strands a coordinator in
// `Committing`. A fetch
// replaces the base and resets the overlay under a single lock, so any edit
// queued after it either targets the new dataset or fails with `StaleRow`.
//
// ============================================================================

use crate::buffer::EditBuffer;
use crate::coordinator::{BulkUpdateCoordinator, CommitState, StagedBulkUpdate, StagedUpdate, UpdateCoordinator};
use crate::core::{BaseDataset, DatasetEpoch, Field, GridError, GridSchema, Record, Result, RowId, merge_overlay};
use crate::filter::{FilterCriteria, FilterEngine, FilterSubject};
use crate::repository::RemoteRepository;
use im::Vector;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Whether the grid has data to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridStatus {
    /// No fetch has completed yet
    NotLoaded,

    /// The last fetch succeeded
    Loaded { epoch: DatasetEpoch, rows: usize },

    /// The last fetch failed; any previously loaded rows are still served
    Failed(String),
}

/// A row as the grid shows it: effective values plus its dirty flag
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub id: RowId,
    pub record: Record,
    pub dirty: bool,
}

impl FilterSubject for ViewRow {
    fn field_value(&self, field: Field) -> Option<&str> {
        self.record.get(field)
    }
}

#[derive(Debug)]
struct GridState {
    schema: GridSchema,
    base: BaseDataset,
    buffer: EditBuffer,
    filter: FilterEngine,
    update: UpdateCoordinator,
    bulk: BulkUpdateCoordinator,
    status: GridStatus,
}

impl GridState {
    fn new(schema: GridSchema) -> Self {
        let buffer = EditBuffer::new(schema.editable_fields().clone());
        Self {
            schema,
            base: BaseDataset::new(),
            buffer,
            filter: FilterEngine::new(),
            update: UpdateCoordinator::new(),
            bulk: BulkUpdateCoordinator::new(),
            status: GridStatus::NotLoaded,
        }
    }

    fn install(&mut self, records: Vec<Record>) -> DatasetEpoch {
        let epoch = self.base.replace(records);
        self.buffer.reset();
        self.update.invalidate();
        self.bulk.invalidate();
        self.status = GridStatus::Loaded {
            epoch,
            rows: self.base.len(),
        };
        epoch
    }

    fn view(&self) -> Vec<ViewRow> {
        let rows = self.base.iter().map(|(id, record)| {
            let record = match self.buffer.edits(id) {
                Some(edits) => merge_overlay(record, edits),
                None => record.clone(),
            };
            ViewRow {
                id,
                dirty: self.buffer.is_dirty(&self.base, id),
                record,
            }
        });
        self.filter.apply(rows)
    }
}

#[derive(Clone)]
pub struct EditableGrid {
    state: Arc<Mutex<GridState>>,
    repository: Arc<dyn RemoteRepository>,
}

impl EditableGrid {
    /// Grid with the default schema
    pub fn new(repository: Arc<dyn RemoteRepository>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GridState::new(GridSchema::default()))),
            repository,
        }
    }

    pub fn with_schema(repository: Arc<dyn RemoteRepository>, schema: GridSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            state: Arc::new(Mutex::new(GridState::new(schema))),
            repository,
        })
    }

    pub async fn schema(&self) -> GridSchema {
        self.state.lock().await.schema.clone()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Replace the base dataset with a fresh snapshot.
    ///
    /// Success discards every pending edit and any staged (not yet sent)
    /// update. Failure leaves the current rows and edits untouched.
    pub async fn fetch(&self) -> Result<DatasetEpoch> {
        match self.repository.fetch().await {
            Ok(records) => {
                let mut state = self.state.lock().await;
                let discarded = state.buffer.len();
                let epoch = state.install(records);
                info!(%epoch, rows = state.base.len(), discarded, "dataset replaced");
                Ok(epoch)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(%reason, "fetch failed");
                self.state.lock().await.status = GridStatus::Failed(reason.clone());
                Err(GridError::Fetch(reason))
            }
        }
    }

    pub async fn status(&self) -> GridStatus {
        self.state.lock().await.status.clone()
    }

    /// The base rows as last fetched or committed
    pub async fn snapshot(&self) -> Vector<Record> {
        self.state.lock().await.base.snapshot()
    }

    pub async fn row_id(&self, index: usize) -> Option<RowId> {
        self.state.lock().await.base.row_id(index)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Record an edit. Editing the row held by a staged single-row update
    /// drops that staging; the user has to stage again.
    pub async fn set_field(&self, row: RowId, field: Field, value: impl Into<String>) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.buffer.set_field(&state.base, row, field, value)?;
        state.update.invalidate_row(row);
        Ok(())
    }

    pub async fn effective(&self, row: RowId, field: Field) -> Result<Option<String>> {
        let state = self.state.lock().await;
        let value = state.buffer.get_effective(&state.base, row, field)?;
        Ok(value.map(str::to_string))
    }

    pub async fn is_dirty(&self, row: RowId) -> bool {
        let state = self.state.lock().await;
        state.buffer.is_dirty(&state.base, row)
    }

    pub async fn dirty_rows(&self) -> Vec<RowId> {
        let state = self.state.lock().await;
        state.buffer.dirty_rows(&state.base)
    }

    /// Throw away the pending edits of one row.
    pub async fn revert_row(&self, row: RowId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.base.check(row)?;
        state.buffer.clear_row(row);
        state.update.invalidate_row(row);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    pub async fn set_filter(&self, field: Field, pattern: &str) {
        self.state.lock().await.filter.set_filter(field, pattern);
    }

    pub async fn clear_filters(&self) {
        self.state.lock().await.filter.clear();
    }

    pub async fn filter_criteria(&self) -> FilterCriteria {
        self.state.lock().await.filter.criteria().clone()
    }

    /// Filtered rows with edits applied, in dataset order.
    pub async fn view(&self) -> Vec<ViewRow> {
        self.state.lock().await.view()
    }

    // ------------------------------------------------------------------
    // Single-row commit
    // ------------------------------------------------------------------

    pub async fn stage_update(&self, row: RowId) -> Result<StagedUpdate> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.update.stage(&state.base, &state.buffer, row)
    }

    pub async fn staged_update(&self) -> Option<StagedUpdate> {
        self.state.lock().await.update.staged().cloned()
    }

    pub async fn update_state(&self) -> CommitState {
        self.state.lock().await.update.state()
    }

    pub async fn cancel_update(&self) -> bool {
        self.state.lock().await.update.cancel()
    }

    /// Send the staged row and apply the answer.
    ///
    /// The request and its completion run on their own task: dropping the
    /// returned future only detaches the caller, and the answer is still
    /// applied when it arrives.
    pub async fn confirm_update(&self) -> Result<()> {
        let staged = self.state.lock().await.update.begin_commit()?;
        info!(row = %staged.row(), "sending update");

        let state = Arc::clone(&self.state);
        let repository = Arc::clone(&self.repository);
        let commit = tokio::spawn(async move {
            let outcome = repository.update(staged.candidate()).await;

            let mut guard = state.lock().await;
            let state = &mut *guard;
            state
                .update
                .complete(&mut state.base, &mut state.buffer, staged, outcome)
        });

        commit
            .await
            .map_err(|err| GridError::UpdateRejected(format!("commit task failed: {}", err)))?
    }

    // ------------------------------------------------------------------
    // Bulk commit
    // ------------------------------------------------------------------

    pub async fn stage_bulk_update(&self) -> Result<StagedBulkUpdate> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.bulk.stage(&state.base, &state.buffer)
    }

    pub async fn staged_bulk_update(&self) -> Option<StagedBulkUpdate> {
        self.state.lock().await.bulk.staged().cloned()
    }

    pub async fn bulk_state(&self) -> CommitState {
        self.state.lock().await.bulk.state()
    }

    pub async fn cancel_bulk_update(&self) -> bool {
        self.state.lock().await.bulk.cancel()
    }

    /// Send every staged row as one batch and apply the answer. Like
    /// [`confirm_update`](Self::confirm_update), the commit outlives the
    /// returned future.
    pub async fn confirm_bulk_update(&self) -> Result<()> {
        let staged = self.state.lock().await.bulk.begin_commit()?;
        info!(rows = staged.len(), "sending bulk update");

        let state = Arc::clone(&self.state);
        let repository = Arc::clone(&self.repository);
        let commit = tokio::spawn(async move {
            let outcome = repository.bulk_update(staged.candidates()).await;

            let mut guard = state.lock().await;
            let state = &mut *guard;
            state
                .bulk
                .complete(&mut state.base, &mut state.buffer, staged, outcome)
        });

        commit
            .await
            .map_err(|err| GridError::BulkUpdateRejected(format!("commit task failed: {}", err)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(vec![
            Record::new()
                .with(Field::PlantName, "North Works")
                .with(Field::CrmPlantId, "A1"),
            Record::new()
                .with(Field::PlantName, "South Works")
                .with(Field::CrmPlantId, "B1"),
        ])
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let repo = repo();
        let grid = EditableGrid::new(Arc::new(repo.clone()));
        assert_eq!(grid.status().await, GridStatus::NotLoaded);

        let epoch = grid.fetch().await.unwrap();
        assert_eq!(grid.status().await, GridStatus::Loaded { epoch, rows: 2 });

        repo.fail_next_fetch("connection reset").await;
        let err = grid.fetch().await.unwrap_err();
        assert!(matches!(err, GridError::Fetch(ref reason) if reason.contains("connection reset")));
        assert!(matches!(grid.status().await, GridStatus::Failed(_)));
        assert_eq!(grid.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_view_uses_effective_values() {
        let grid = EditableGrid::new(Arc::new(repo()));
        grid.fetch().await.unwrap();
        let second = grid.row_id(1).await.unwrap();

        grid.set_field(second, Field::CrmPlantId, "A9").await.unwrap();
        grid.set_filter(Field::CrmPlantId, "a").await;

        let view = grid.view().await;
        assert_eq!(view.len(), 2);
        assert!(!view[0].dirty);
        assert!(view[1].dirty);
        assert_eq!(view[1].record.get(Field::CrmPlantId), Some("A9"));

        grid.set_filter(Field::CrmPlantId, "a9").await;
        let view = grid.view().await;
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, second);
    }

    #[tokio::test]
    async fn test_editing_staged_row_drops_staging() {
        let grid = EditableGrid::new(Arc::new(repo()));
        grid.fetch().await.unwrap();
        let first = grid.row_id(0).await.unwrap();
        let second = grid.row_id(1).await.unwrap();

        grid.set_field(first, Field::CrmPlantId, "A2").await.unwrap();
        grid.stage_update(first).await.unwrap();

        grid.set_field(second, Field::CrmPlantId, "B2").await.unwrap();
        assert_eq!(grid.update_state().await, CommitState::Staged);

        grid.set_field(first, Field::CrmPlantId, "A3").await.unwrap();
        assert_eq!(grid.update_state().await, CommitState::Idle);
        assert_eq!(
            grid.confirm_update().await.unwrap_err(),
            GridError::NothingStaged("update")
        );
    }

    #[tokio::test]
    async fn test_with_schema_validates() {
        let schema = GridSchema::new().columns([Field::PlantName]);
        assert!(EditableGrid::with_schema(Arc::new(repo()), schema).is_err());
    }

    #[tokio::test]
    async fn test_revert_row() {
        let grid = EditableGrid::new(Arc::new(repo()));
        grid.fetch().await.unwrap();
        let first = grid.row_id(0).await.unwrap();

        grid.set_field(first, Field::CrmPlantId, "A2").await.unwrap();
        grid.revert_row(first).await.unwrap();
        assert!(!grid.is_dirty(first).await);
        assert_eq!(
            grid.effective(first, Field::CrmPlantId).await.unwrap().as_deref(),
            Some("A1")
        );
    }
}
