//! Memory retirement.
//!
//! Decides which memories are stale and removes them from the store.
//!
//! # Overview
//!
//! The [`MemorySweeper`] pages through every memory, asks each configured
//! classifier whether it is transient or long-term, and aggregates the votes
//! into a consensus. The [`RetentionPolicy`] deletes a memory only when the
//! consensus is transient with at least the configured confidence.
//!
//! # Example
//!
//! ```rust,ignore
//! use memsweep::config::SweepConfig;
//! use memsweep::gc::MemorySweeper;
//!
//! let config = SweepConfig::load_default()?.with_env_overrides();
//! let sweeper = MemorySweeper::from_config(&config)?;
//!
//! // See what would go first
//! let result = sweeper.sweep(true)?;
//! println!("{}", result.summary());
//! ```

mod retention;
mod sweeper;

pub use retention::{
    DEFAULT_DELETE_THRESHOLD, DEFAULT_PAGE_SIZE, DELETE_THRESHOLD_ENV, RetentionConfig,
    RetentionPolicy,
};
pub use sweeper::{MemorySweeper, SweepResult};
