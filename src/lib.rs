//! # Memsweep
//!
//! Retires stale memories from a remote memory store.
//!
//! Every memory is shown to several independent LLM classifiers which label it
//! `transient` or `long-term`. Their answers, including the ones that failed,
//! are reconciled by majority vote into a single verdict with a confidence
//! score, and only confident `transient` verdicts lead to deletion.
//!
//! ## Pipeline
//!
//! - [`services::ClassificationService`] invokes one model for one memory and
//!   never fails: every problem becomes a [`ClassificationAttempt::Failure`].
//! - [`services::FanOutCoordinator`] runs all models concurrently and joins
//!   every one of them.
//! - [`services::calculate_consensus`] aggregates the attempts.
//! - [`gc::RetentionPolicy`] turns a consensus into a [`RetentionAction`].
//! - [`gc::MemorySweeper`] pages through the store and applies the actions.
//!
//! ## Example
//!
//! ```rust,ignore
//! use memsweep::config::SweepConfig;
//! use memsweep::gc::MemorySweeper;
//!
//! let config = SweepConfig::load_default()?.with_env_overrides();
//! config.validate()?;
//! let sweeper = MemorySweeper::from_config(&config)?;
//! let result = sweeper.sweep(true)?;
//! println!("{}", result.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod gc;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::SweepConfig;
pub use gc::{MemorySweeper, RetentionPolicy, SweepResult};
pub use llm::LlmProvider;
pub use models::{
    ClassificationAttempt, ClassificationResult, ConsensusResult, ConsensusVerdict, MemoryId,
    MemoryRecord, RetentionAction, Verdict,
};
pub use services::{ClassificationService, FanOutCoordinator, calculate_consensus};
pub use storage::MemoryStore;

/// Error type for memsweep operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed model output, unknown model identifiers, bad CLI values |
/// | `OperationFailed` | HTTP transport errors, non-2xx responses, undecodable bodies |
/// | `Config` | Missing credentials or endpoints, out-of-range thresholds |
/// | `Unauthorized` | The memory store or inference endpoint rejected the credentials |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A model response does not match the classification schema
    /// - A model declines to classify (`unclassified`)
    /// - A model identifier has no registered provider
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A request to the memory store or an LLM endpoint cannot be sent
    /// - The remote side answers with a non-success status
    /// - A response body cannot be decoded
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration is missing or invalid.
    ///
    /// Fatal at startup. Never raised once a sweep is running.
    #[error("configuration error: {0}")]
    Config(String),

    /// Authentication failed.
    ///
    /// Raised when a remote endpoint answers 401 or 403. Stops a running
    /// sweep.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Result type alias for memsweep operations.
pub type Result<T> = std::result::Result<T, Error>;
