// ============================================================================
// Single-row Update Coordinator
// ============================================================================
//
// Stage -> confirm -> commit for one row. The coordinator only tracks the
// protocol; the caller performs the repository call between
// `begin_commit` and `complete`, so the edit buffer and filter stay usable
// while a request is in flight.
//
// ============================================================================

use super::state::CommitState;
use crate::buffer::EditBuffer;
use crate::core::{BaseDataset, GridError, Record, Result, RowId, merge_overlay};
use crate::repository::{Candidate, RepositoryResult};
use log::{debug, info, warn};

/// Base row merged with its pending edits, awaiting confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct StagedUpdate {
    candidate: Candidate,
}

impl StagedUpdate {
    pub fn row(&self) -> RowId {
        self.candidate.row
    }

    pub fn record(&self) -> &Record {
        &self.candidate.record
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Staged(StagedUpdate),
    /// `detached` is set when the caller cancels after the request left.
    Committing { row: RowId, detached: bool },
}

#[derive(Debug, Clone)]
pub struct UpdateCoordinator {
    phase: Phase,
}

impl Default for UpdateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateCoordinator {
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

    pub fn staged(&self) -> Option<&StagedUpdate> {
        match &self.phase {
            Phase::Staged(staged) => Some(staged),
            _ => None,
        }
    }

    /// Row whose request is currently in flight
    pub fn in_flight(&self) -> Option<RowId> {
        match self.phase {
            Phase::Committing { row, .. } => Some(row),
            _ => None,
        }
    }

    /// Snapshot `row` for confirmation.
    ///
    /// Refuses clean rows with `NoChanges` without changing state. Staging
    /// while already `Staged` replaces the previous candidate.
    pub fn stage(&mut self, base: &BaseDataset, buffer: &EditBuffer, row: RowId) -> Result<StagedUpdate> {
        if let Phase::Committing { .. } = self.phase {
            return Err(GridError::Busy("update"));
        }
        base.check(row)?;
        if !buffer.is_dirty(base, row) {
            return Err(GridError::NoChanges);
        }

        let record = base.get(row)?;
        let merged = match buffer.edits(row) {
            Some(edits) => merge_overlay(record, edits),
            None => record.clone(),
        };
        let staged = StagedUpdate {
            candidate: Candidate::new(row, merged),
        };
        debug!("Staged update for row {}", row);
        self.phase = Phase::Staged(staged.clone());
        Ok(staged)
    }

    /// User confirmed: `Staged -> Committing`. The returned update is what
    /// must be sent and later handed back to [`complete`](Self::complete).
    pub fn begin_commit(&mut self) -> Result<StagedUpdate> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Staged(staged) => {
                self.phase = Phase::Committing {
                    row: staged.row(),
                    detached: false,
                };
                Ok(staged)
            }
            busy @ Phase::Committing { .. } => {
                self.phase = busy;
                Err(GridError::Busy("update"))
            }
            Phase::Idle => Err(GridError::NothingStaged("update")),
        }
    }

    /// Discard the local staging. Returns false if there was nothing to drop.
    ///
    /// An in-flight request cannot be recalled; its result is still applied
    /// when it resolves.
    pub fn cancel(&mut self) -> bool {
        let row = match &mut self.phase {
            Phase::Idle => return false,
            Phase::Committing { row, detached } => {
                debug!("Detached from in-flight update for row {}", row);
                *detached = true;
                return true;
            }
            Phase::Staged(staged) => staged.row(),
        };
        debug!("Cancelled staged update for row {}", row);
        self.phase = Phase::Idle;
        true
    }

    /// Drop a staged candidate for `row` because its edits changed.
    pub fn invalidate_row(&mut self, row: RowId) -> bool {
        if matches!(&self.phase, Phase::Staged(staged) if staged.row() == row) {
            debug!("Staged update for row {} invalidated by a new edit", row);
            self.phase = Phase::Idle;
            return true;
        }
        false
    }

    /// Drop any staged candidate; in-flight requests are left alone.
    pub fn invalidate(&mut self) {
        if let Phase::Staged(_) = self.phase {
            self.phase = Phase::Idle;
        }
    }

    /// Apply the repository's answer and return to `Idle`.
    ///
    /// On success the candidate's editable fields are folded into the base
    /// row and the row's overlay is cleared, unless the dataset has been
    /// replaced since staging. On failure nothing is touched and the reason
    /// is returned as `UpdateRejected`.
    pub fn complete(
        &mut self,
        base: &mut BaseDataset,
        buffer: &mut EditBuffer,
        staged: StagedUpdate,
        outcome: RepositoryResult<()>,
    ) -> Result<()> {
        if let Phase::Committing { detached: true, .. } = self.phase {
            debug!("Resolving detached update for row {}", staged.row());
        }
        self.phase = Phase::Idle;

        if let Err(err) = outcome {
            warn!("Update for row {} rejected: {}", staged.row(), err);
            return Err(GridError::UpdateRejected(err.to_string()));
        }

        let row = staged.row();
        if row.epoch() != base.epoch() {
            warn!(
                "Update for row {} acknowledged after refetch to {}; not folded",
                row,
                base.epoch()
            );
            return Ok(());
        }

        base.fold(row, staged.record(), buffer.editable_fields())?;
        buffer.clear_row(row);
        info!("Committed update for row {}", row);
        Ok(())
    }
}
