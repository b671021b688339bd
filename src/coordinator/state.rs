/// Lifecycle of a commit coordinator.
///
/// State transitions:
/// ```text
/// Idle ──stage──> Staged ──confirm──> Committing ──resolve──> Idle
///                   │
///                   └──cancel──> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Nothing staged, nothing in flight
    Idle,

    /// A candidate is waiting for the user's confirmation
    Staged,

    /// A request is in flight to the repository
    Committing,
}

impl CommitState {
    /// Check if a request is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(self, CommitState::Committing)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CommitState::Idle)
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitState::Idle => write!(f, "IDLE"),
            CommitState::Staged => write!(f, "STAGED"),
            CommitState::Committing => write!(f, "COMMITTING"),
        }
    }
}
