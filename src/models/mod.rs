//! Data models for memsweep.
//!
//! Memory records as delivered by the store, plus the per-pass values the
//! classification pipeline produces for each of them.

mod classification;
mod memory;

pub use classification::{
    ClassificationAttempt, ClassificationResult, ConsensusResult, ConsensusVerdict,
    RetentionAction, Verdict,
};
pub use memory::{
    DeleteRequest, DeleteResponse, FilterRequest, MemoryId, MemoryPage, MemoryRecord,
    SortDirection,
};
