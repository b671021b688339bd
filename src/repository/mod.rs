// ============================================================================
// Remote Repository boundary
// ============================================================================
//
// The core never talks to the network itself. It is handed something that
// can fetch a full snapshot and accept single or batched updates; success
// is an application-level acknowledgement, anything else is an error with
// a human-readable reason.
//
// ============================================================================

pub mod config;
pub mod http;
pub mod memory;

pub use config::RepositoryConfig;
pub use http::HttpRepository;
pub use memory::InMemoryRepository;

use crate::core::{Record, RowId};
use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server responded {code}: {reason}")]
    Status { code: u16, reason: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// A merged record on its way to the repository, tagged with its row.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub row: RowId,
    pub record: Record,
}

impl Candidate {
    pub fn new(row: RowId, record: Record) -> Self {
        Self { row, record }
    }
}

/// Wire shape: the record's fields plus `index`, the row position.
impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut object = self.record.to_json_object();
        object.insert("index".to_string(), self.row.index().into());
        let mut map = serializer.serialize_map(Some(object.len()))?;
        for (key, value) in &object {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Trait for the collaborator that owns the authoritative copy of the rows.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Full snapshot, in display order.
    async fn fetch(&self) -> RepositoryResult<Vec<Record>>;

    /// Upsert one record.
    async fn update(&self, candidate: &Candidate) -> RepositoryResult<()>;

    /// Upsert a batch; all or nothing from the caller's point of view.
    async fn bulk_update(&self, candidates: &[Candidate]) -> RepositoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BaseDataset, Field};
    use serde_json::json;

    #[test]
    fn test_candidate_wire_shape() {
        let mut base = BaseDataset::new();
        base.replace(vec![Record::new(), Record::new()]);
        let row = base.row_id(1).unwrap();

        let candidate = Candidate::new(row, Record::new().with(Field::CrmPlantId, "A2"));
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value, json!({"CRM_PLANT_ID": "A2", "index": 1}));
    }

    #[test]
    fn test_error_messages_carry_reason() {
        let err = RepositoryError::Status {
            code: 409,
            reason: "Conflict".to_string(),
        };
        assert_eq!(err.to_string(), "Server responded 409: Conflict");
        assert_eq!(RepositoryError::Rejected("locked".into()).to_string(), "locked");
    }
}
