//! Retention policy.
//!
//! Turns a consensus into a retain/delete action and carries the settings
//! that shape a sweep.
//!
//! # Configuration
//!
//! - Environment variable: `MEMSWEEP_DELETE_THRESHOLD` (default: 0.7)
//! - Environment variable: `MEMSWEEP_PAGE_SIZE` (default: 25)
//! - Environment variable: `MEMSWEEP_MAX_RECORDS` (default: unlimited)
//! - Config file: `[retention] delete_threshold = 0.85`
//!
//! # Example
//!
//! ```rust
//! use memsweep::gc::RetentionPolicy;
//! use memsweep::models::{ConsensusResult, ConsensusVerdict, MemoryId, RetentionAction};
//!
//! let consensus = ConsensusResult {
//!     final_verdict: ConsensusVerdict::Transient,
//!     confidence: 0.85,
//!     attempts: Vec::new(),
//!     successful_count: 0,
//!     failed_count: 0,
//! };
//! let action = RetentionPolicy::default().decide(&MemoryId::new("m1"), &consensus);
//! assert!(action.is_delete());
//! ```

use crate::models::{
    ConsensusResult, ConsensusVerdict, FilterRequest, MemoryId, RetentionAction, SortDirection,
};

/// Environment variable for the delete threshold.
pub const DELETE_THRESHOLD_ENV: &str = "MEMSWEEP_DELETE_THRESHOLD";

/// Minimum consensus confidence for deleting a transient memory.
pub const DEFAULT_DELETE_THRESHOLD: f32 = 0.7;

/// Default number of memories fetched per page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Decides whether a classified memory is deleted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    delete_threshold: f32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            delete_threshold: DEFAULT_DELETE_THRESHOLD,
        }
    }
}

impl RetentionPolicy {
    /// Creates a policy with the given threshold.
    #[must_use]
    pub const fn new(delete_threshold: f32) -> Self {
        Self { delete_threshold }
    }

    /// Returns the delete threshold.
    #[must_use]
    pub const fn delete_threshold(&self) -> f32 {
        self.delete_threshold
    }

    /// Deletes only confident transient verdicts.
    ///
    /// `long-term` and `uncertain` are retained whatever their confidence.
    #[must_use]
    pub fn decide(&self, record_id: &MemoryId, consensus: &ConsensusResult) -> RetentionAction {
        match consensus.final_verdict {
            ConsensusVerdict::Transient if consensus.confidence >= self.delete_threshold => {
                RetentionAction::Delete {
                    record_id: record_id.clone(),
                }
            },
            ConsensusVerdict::Transient
            | ConsensusVerdict::LongTerm
            | ConsensusVerdict::Uncertain => RetentionAction::Retain,
        }
    }
}

/// Settings for one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionConfig {
    /// Minimum confidence for deleting a transient memory.
    pub delete_threshold: f32,

    /// Memories fetched per page.
    pub page_size: u32,

    /// Column the store sorts by.
    pub sort_column: String,

    /// Sort direction.
    pub sort_direction: SortDirection,

    /// Maximum memories classified in one sweep.
    ///
    /// `None` walks every page.
    pub max_records: Option<usize>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            delete_threshold: DEFAULT_DELETE_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            sort_column: "created_at".to_string(),
            sort_direction: SortDirection::Desc,
            max_records: None,
        }
    }
}

impl RetentionConfig {
    /// Creates a retention config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Reads:
    /// - `MEMSWEEP_DELETE_THRESHOLD`
    /// - `MEMSWEEP_PAGE_SIZE`
    /// - `MEMSWEEP_MAX_RECORDS`
    ///
    /// Values that do not parse are ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(t) = lookup(DELETE_THRESHOLD_ENV).and_then(|v| v.trim().parse::<f32>().ok()) {
            self.delete_threshold = t;
        }
        if let Some(size) =
            lookup("MEMSWEEP_PAGE_SIZE").and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.page_size = size;
        }
        if let Some(max) =
            lookup("MEMSWEEP_MAX_RECORDS").and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.max_records = Some(max);
        }
        self
    }

    /// Sets the delete threshold.
    #[must_use]
    pub const fn with_delete_threshold(mut self, threshold: f32) -> Self {
        self.delete_threshold = threshold;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Caps the number of memories classified in one sweep.
    #[must_use]
    pub const fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.max_records = max;
        self
    }

    /// Returns the policy for these settings.
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.delete_threshold)
    }

    /// Builds the listing request for a page.
    #[must_use]
    pub fn filter_request(&self, page: u32) -> FilterRequest {
        FilterRequest {
            page,
            size: self.page_size,
            sort_column: self.sort_column.clone(),
            sort_direction: self.sort_direction,
        }
    }
}
