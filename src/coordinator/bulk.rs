// ============================================================================
// Bulk Update Coordinator
// ============================================================================
//
// Stages every dirty row at once and commits them as one all-or-nothing
// batch. The dirty set is snapshotted at staging time: on success exactly
// those rows are folded and cleared, so edits made while the batch is
// pending stay in the overlay.
//
// ============================================================================

use super::state::CommitState;
use crate::buffer::EditBuffer;
use crate::core::{BaseDataset, DatasetEpoch, GridError, Result, RowId, merge_overlay};
use crate::repository::{Candidate, RepositoryResult};
use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StagedBulkUpdate {
    epoch: DatasetEpoch,
    candidates: Vec<Candidate>,
}

impl StagedBulkUpdate {
    /// Rows captured at staging time, in dataset order
    pub fn rows(&self) -> Vec<RowId> {
        self.candidates.iter().map(|c| c.row).collect()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Staged(StagedBulkUpdate),
    Committing { rows: usize, detached: bool },
}

#[derive(Debug, Clone)]
pub struct BulkUpdateCoordinator {
    phase: Phase,
}

impl Default for BulkUpdateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkUpdateCoordinator {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    pub fn state(&self) -> CommitState {
        match self.phase {
            Phase::Idle => CommitState::Idle,
            Phase::Staged(_) => CommitState::Staged,
            Phase::Committing { .. } => CommitState::Committing,
        }
    }

    pub fn staged(&self) -> Option<&StagedBulkUpdate> {
        match &self.phase {
            Phase::Staged(staged) => Some(staged),
            _ => None,
        }
    }

    /// Snapshot every dirty row. Fails with `NoChanges` if there are none.
    pub fn stage(&mut self, base: &BaseDataset, buffer: &EditBuffer) -> Result<StagedBulkUpdate> {
        if let Phase::Committing { .. } = self.phase {
            return Err(GridError::Busy("bulk update"));
        }

        let mut candidates = Vec::new();
        for row in buffer.dirty_rows(base) {
            let record = base.get(row)?;
            let merged = match buffer.edits(row) {
                Some(edits) => merge_overlay(record, edits),
                None => record.clone(),
            };
            candidates.push(Candidate::new(row, merged));
        }
        if candidates.is_empty() {
            return Err(GridError::NoChanges);
        }

        let staged = StagedBulkUpdate {
            epoch: base.epoch(),
            candidates,
        };
        debug!("Staged bulk update of {} row(s)", staged.len());
        self.phase = Phase::Staged(staged.clone());
        Ok(staged)
    }

    /// `Staged -> Committing`; the caller sends the returned batch.
    pub fn begin_commit(&mut self) -> Result<StagedBulkUpdate> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Staged(staged) => {
                self.phase = Phase::Committing {
                    rows: staged.len(),
                    detached: false,
                };
                Ok(staged)
            }
            busy @ Phase::Committing { .. } => {
                self.phase = busy;
                Err(GridError::Busy("bulk update"))
            }
            Phase::Idle => Err(GridError::NothingStaged("bulk update")),
        }
    }

    pub fn cancel(&mut self) -> bool {
        match &mut self.phase {
            Phase::Idle => return false,
            Phase::Committing { rows, detached } => {
                debug!("Detached from in-flight bulk update of {} row(s)", rows);
                *detached = true;
                return true;
            }
            Phase::Staged(_) => {}
        }
        debug!("Cancelled staged bulk update");
        self.phase = Phase::Idle;
        true
    }

    /// Drop any staged batch; in-flight requests are left alone.
    pub fn invalidate(&mut self) {
        if let Phase::Staged(_) = self.phase {
            self.phase = Phase::Idle;
        }
    }

    /// Apply the repository's answer and return to `Idle`.
    pub fn complete(
        &mut self,
        base: &mut BaseDataset,
        buffer: &mut EditBuffer,
        staged: StagedBulkUpdate,
        outcome: RepositoryResult<()>,
    ) -> Result<()> {
        if let Phase::Committing { detached: true, .. } = self.phase {
            debug!("Resolving detached bulk update");
        }
        self.phase = Phase::Idle;

        if let Err(err) = outcome {
            warn!("Bulk update of {} row(s) rejected: {}", staged.len(), err);
            return Err(GridError::BulkUpdateRejected(err.to_string()));
        }

        if staged.epoch != base.epoch() {
            warn!(
                "Bulk update acknowledged after refetch to {}; not folded",
                base.epoch()
            );
            return Ok(());
        }

        for candidate in &staged.candidates {
            base.fold(candidate.row, &candidate.record, buffer.editable_fields())?;
        }
        buffer.clear_rows(&staged.rows());
        info!("Committed bulk update of {} row(s)", staged.len());
        Ok(())
    }
}
