//! Classification, consensus and retention types.

use super::MemoryId;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Durability verdict of a single classifier.
///
/// `unclassified` is deliberately absent: a model that declines to pick a side
/// produces a failed attempt, not a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Temporary, time-bound content. Candidate for deletion.
    #[serde(rename = "transient")]
    Transient,
    /// Enduring content worth keeping.
    #[serde(rename = "long-term")]
    LongTerm,
}

impl Verdict {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::LongTerm => "long-term",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful classification by one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Model that produced the classification.
    pub model_id: String,
    /// The model's verdict.
    pub verdict: Verdict,
    /// Self-reported confidence, clamped to `[0, 1]`.
    pub confidence: f32,
    /// The model's explanation.
    pub reasoning: String,
}

/// Outcome of invoking one model on one memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationAttempt {
    /// The model returned a usable verdict.
    Success {
        /// Model that was invoked.
        model_id: String,
        /// The classification.
        result: ClassificationResult,
    },
    /// The model could not be used for this memory.
    Failure {
        /// Model that was invoked.
        model_id: String,
        /// Why the attempt failed.
        error: String,
        /// The endpoint refused the configured credentials.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        credentials_rejected: bool,
    },
}

impl ClassificationAttempt {
    /// Builds a failed attempt.
    #[must_use]
    pub fn failure(model_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::Failure {
            model_id: model_id.into(),
            error: error.to_string(),
            credentials_rejected: false,
        }
    }

    /// Builds a failed attempt from a classifier error.
    ///
    /// [`Error::Unauthorized`] is remembered so a sweep can tell a revoked key
    /// apart from a flaky model.
    #[must_use]
    pub fn from_error(model_id: impl Into<String>, error: &Error) -> Self {
        Self::Failure {
            model_id: model_id.into(),
            error: error.to_string(),
            credentials_rejected: matches!(error, Error::Unauthorized(_)),
        }
    }

    /// Builds a successful attempt from a result.
    #[must_use]
    pub fn success(result: ClassificationResult) -> Self {
        Self::Success {
            model_id: result.model_id.clone(),
            result,
        }
    }

    /// Returns the model this attempt belongs to.
    #[must_use]
    pub fn model_id(&self) -> &str {
        match self {
            Self::Success { model_id, .. } | Self::Failure { model_id, .. } => model_id,
        }
    }

    /// Returns `true` if the model produced a verdict.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` if the endpoint refused the credentials.
    #[must_use]
    pub const fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            Self::Failure {
                credentials_rejected: true,
                ..
            }
        )
    }

    /// Returns the classification for successful attempts.
    #[must_use]
    pub const fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Failure { .. } => None,
        }
    }
}

/// Aggregated verdict across all models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConsensusVerdict {
    /// A majority voted transient.
    #[serde(rename = "transient")]
    Transient,
    /// A majority voted long-term.
    #[serde(rename = "long-term")]
    LongTerm,
    /// Too few votes, or a tie.
    #[serde(rename = "uncertain")]
    Uncertain,
}

impl ConsensusVerdict {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::LongTerm => "long-term",
            Self::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for ConsensusVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of aggregating every attempt for one memory.
///
/// `successful_count + failed_count == attempts.len()` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusResult {
    /// The aggregated verdict.
    pub final_verdict: ConsensusVerdict,
    /// Agreement strength in `[0, 1]`.
    pub confidence: f32,
    /// Every attempt, in fan-out order.
    pub attempts: Vec<ClassificationAttempt>,
    /// Number of successful attempts.
    pub successful_count: usize,
    /// Number of failed attempts.
    pub failed_count: usize,
}

impl ConsensusResult {
    /// Returns `true` if there were attempts and every one was refused for
    /// credentials.
    #[must_use]
    pub fn credentials_rejected(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(ClassificationAttempt::is_credential_rejection)
    }
}

/// What to do with a memory after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionAction {
    /// Remove the memory from the store.
    Delete {
        /// The memory to remove.
        record_id: MemoryId,
    },
    /// Leave the memory alone.
    Retain,
}

impl RetentionAction {
    /// Returns `true` for [`RetentionAction::Delete`].
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}
