pub mod dataset;
pub mod error;
pub mod record;
pub mod schema;

pub use dataset::{BaseDataset, DatasetEpoch, RowId};
pub use error::{GridError, Result};
pub use record::{Field, Record, RowEdits, fields_differ, merge_overlay};
pub use schema::GridSchema;
