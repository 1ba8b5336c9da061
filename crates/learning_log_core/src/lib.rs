pub mod aggregate;
pub mod bucketing;
pub mod domain;
pub mod memory;
pub mod ports;
pub mod write;

pub use aggregate::{summarize, summarize_user, Summary, SummaryQuery, SummaryValues};
pub use domain::{
    study_minutes, Granularity, InvalidGranularity, LearningRecord, RecordFields,
    MAX_IDEMPOTENCY_KEY_LEN,
};
pub use memory::MemoryStore;
pub use ports::{PortError, PortResult, RecordStore};
pub use write::{submit_record, NewRecord, WriteError, WriteOutcome};
