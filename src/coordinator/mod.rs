// ============================================================================
// Commit Coordinators
// ============================================================================
//
// Explicit stage -> confirm -> commit state machines for single-row and
// bulk updates. Each coordinator allows one request in flight; a second
// attempt is refused with `Busy`, never queued.
//
// ============================================================================

pub mod bulk;
pub mod single;
pub mod state;

pub use bulk::{BulkUpdateCoordinator, StagedBulkUpdate};
pub use single::{StagedUpdate, UpdateCoordinator};
pub use state::CommitState;
