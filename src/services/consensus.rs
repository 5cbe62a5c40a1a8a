//! Majority-vote consensus over classifier attempts.
//!
//! Confidence measures how strongly the successful classifiers agree. It is a
//! step function of the winning share and ignores the confidences the models
//! report about themselves, which stay visible on each attempt.

use crate::models::{ClassificationAttempt, ConsensusResult, ConsensusVerdict, Verdict};

/// Fewer successful attempts than this never yield a verdict.
pub const MIN_SUCCESSFUL_ATTEMPTS: usize = 2;

/// Confidence when there are not enough successful attempts.
const INSUFFICIENT_SIGNAL_CONFIDENCE: f32 = 0.1;
/// Every successful classifier agreed.
const UNANIMOUS_CONFIDENCE: f32 = 1.0;
/// At least 70% agreed.
const STRONG_MAJORITY_CONFIDENCE: f32 = 0.85;
/// More than half agreed.
const SIMPLE_MAJORITY_CONFIDENCE: f32 = 0.67;
/// Exact tie.
const TIE_CONFIDENCE: f32 = 0.5;

/// Aggregates attempts into a single verdict.
///
/// Pure and deterministic: the same attempts always give the same result.
#[must_use]
pub fn calculate_consensus(attempts: Vec<ClassificationAttempt>) -> ConsensusResult {
    let (mut transient_votes, mut long_term_votes) = (0usize, 0usize);
    for result in attempts.iter().filter_map(ClassificationAttempt::result) {
        match result.verdict {
            Verdict::Transient => transient_votes += 1,
            Verdict::LongTerm => long_term_votes += 1,
        }
    }
    let successful_count = transient_votes + long_term_votes;
    let failed_count = attempts.len() - successful_count;

    let (final_verdict, confidence) = if successful_count < MIN_SUCCESSFUL_ATTEMPTS {
        (ConsensusVerdict::Uncertain, INSUFFICIENT_SIGNAL_CONFIDENCE)
    } else if transient_votes > long_term_votes {
        (
            ConsensusVerdict::Transient,
            confidence_for_majority(transient_votes, successful_count),
        )
    } else if long_term_votes > transient_votes {
        (
            ConsensusVerdict::LongTerm,
            confidence_for_majority(long_term_votes, successful_count),
        )
    } else {
        (ConsensusVerdict::Uncertain, TIE_CONFIDENCE)
    };

    ConsensusResult {
        final_verdict,
        confidence,
        attempts,
        successful_count,
        failed_count,
    }
}

/// Maps the winning share of successful votes to a confidence.
///
/// | share | confidence |
/// |-------|------------|
/// | no votes | 0.1 |
/// | 100% | 1.0 |
/// | >= 70% | 0.85 |
/// | > 50% | 0.67 |
/// | <= 50% | 0.5 |
///
/// Shares are compared in integer arithmetic so that boundaries such as 7/10
/// land exactly.
#[must_use]
pub const fn confidence_for_majority(winning_votes: usize, successful: usize) -> f32 {
    if successful == 0 {
        INSUFFICIENT_SIGNAL_CONFIDENCE
    } else if winning_votes >= successful {
        UNANIMOUS_CONFIDENCE
    } else if winning_votes * 10 >= successful * 7 {
        STRONG_MAJORITY_CONFIDENCE
    } else if winning_votes * 2 > successful {
        SIMPLE_MAJORITY_CONFIDENCE
    } else {
        TIE_CONFIDENCE
    }
}
