use super::{Candidate, RemoteRepository, RepositoryError, RepositoryResult};
use crate::core::Record;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct InMemoryState {
    records: Vec<Record>,
    fetch_failure: Option<String>,
    update_rejection: Option<String>,
    fetch_count: usize,
    updates: Vec<Candidate>,
    bulk_updates: Vec<Vec<Candidate>>,
}

impl InMemoryState {
    fn store(&mut self, candidate: &Candidate) -> RepositoryResult<()> {
        let slot = self.records.get_mut(candidate.row.index()).ok_or_else(|| {
            RepositoryError::Rejected(format!("no record at index {}", candidate.row.index()))
        })?;
        *slot = candidate.record.clone();
        Ok(())
    }
}

/// An in-process `RemoteRepository`.
///
/// Accepted updates are written back into the stored rows, so a later fetch
/// observes them. Failures can be scripted for tests and demos.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState {
                records,
                ..InMemoryState::default()
            })),
        }
    }

    /// Replace the server-side rows (simulates another writer).
    pub async fn set_records(&self, records: Vec<Record>) {
        self.state.lock().await.records = records;
    }

    pub async fn records(&self) -> Vec<Record> {
        self.state.lock().await.records.clone()
    }

    /// Make the next fetch fail with `reason`.
    pub async fn fail_next_fetch(&self, reason: impl Into<String>) {
        self.state.lock().await.fetch_failure = Some(reason.into());
    }

    /// Reject every update (single and bulk) with `reason` until cleared.
    pub async fn reject_updates(&self, reason: impl Into<String>) {
        self.state.lock().await.update_rejection = Some(reason.into());
    }

    pub async fn accept_updates(&self) {
        self.state.lock().await.update_rejection = None;
    }

    pub async fn fetch_count(&self) -> usize {
        self.state.lock().await.fetch_count
    }

    /// Accepted single-row updates, in arrival order
    pub async fn updates(&self) -> Vec<Candidate> {
        self.state.lock().await.updates.clone()
    }

    /// Accepted batches, in arrival order
    pub async fn bulk_updates(&self) -> Vec<Vec<Candidate>> {
        self.state.lock().await.bulk_updates.clone()
    }
}

#[async_trait]
impl RemoteRepository for InMemoryRepository {
    async fn fetch(&self) -> RepositoryResult<Vec<Record>> {
        let mut state = self.state.lock().await;
        state.fetch_count += 1;
        if let Some(reason) = state.fetch_failure.take() {
            return Err(RepositoryError::Transport(reason));
        }
        Ok(state.records.clone())
    }

    async fn update(&self, candidate: &Candidate) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.update_rejection.clone() {
            return Err(RepositoryError::Rejected(reason));
        }
        state.store(candidate)?;
        state.updates.push(candidate.clone());
        Ok(())
    }

    async fn bulk_update(&self, candidates: &[Candidate]) -> RepositoryResult<()> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.update_rejection.clone() {
            return Err(RepositoryError::Rejected(reason));
        }

        // validate the whole batch before touching anything
        if let Some(bad) = candidates
            .iter()
            .find(|c| c.row.index() >= state.records.len())
        {
            return Err(RepositoryError::Rejected(format!(
                "no record at index {}",
                bad.row.index()
            )));
        }
        for candidate in candidates {
            state.store(candidate)?;
        }
        state.bulk_updates.push(candidates.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BaseDataset, Field};

    #[tokio::test]
    async fn test_update_is_visible_on_next_fetch() {
        let repo = InMemoryRepository::new(vec![Record::new().with(Field::CrmPlantId, "A1")]);
        let mut base = BaseDataset::new();
        base.replace(repo.fetch().await.unwrap());

        let row = base.row_id(0).unwrap();
        let candidate = Candidate::new(row, Record::new().with(Field::CrmPlantId, "A2"));
        repo.update(&candidate).await.unwrap();

        let refetched = repo.fetch().await.unwrap();
        assert_eq!(refetched[0].get(Field::CrmPlantId), Some("A2"));
        assert_eq!(repo.fetch_count().await, 2);
        assert_eq!(repo.updates().await, vec![candidate]);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let repo = InMemoryRepository::new(vec![Record::new()]);
        repo.fail_next_fetch("connection refused").await;
        assert_eq!(
            repo.fetch().await,
            Err(RepositoryError::Transport("connection refused".to_string()))
        );
        assert!(repo.fetch().await.is_ok());

        let mut base = BaseDataset::new();
        base.replace(repo.records().await);
        let candidate = Candidate::new(base.row_id(0).unwrap(), Record::new());

        repo.reject_updates("locked").await;
        assert!(repo.update(&candidate).await.is_err());
        assert!(repo.bulk_update(&[candidate.clone()]).await.is_err());

        repo.accept_updates().await;
        assert!(repo.bulk_update(&[candidate]).await.is_ok());
        assert_eq!(repo.bulk_updates().await.len(), 1);
    }
}
