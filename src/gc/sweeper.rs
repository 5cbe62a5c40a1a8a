//! Memory sweeper.
//!
//! Walks the store page by page and pushes every memory through
//! fan-out, consensus and the retention policy, deleting the ones that
//! come back as confidently transient.
//!
//! Ordinary failures never abort a sweep. A page that cannot be fetched is
//! skipped, and a deletion that fails leaves the memory in place; both are
//! counted in the [`SweepResult`]. Rejected credentials are different: when the
//! store refuses the bearer token, or every classifier refuses the API key, the
//! sweep stops with [`Error::Unauthorized`].
//!
//! Deletions happen while the walk is in progress, so later pages shift
//! towards the front of the listing and some memories may not be visited in
//! that sweep. They are picked up by the next one.

use super::retention::{RetentionConfig, RetentionPolicy};
use crate::config::SweepConfig;
use crate::models::{ConsensusResult, ConsensusVerdict, MemoryRecord, RetentionAction};
use crate::services::{
    ClassificationService, FanOutCoordinator, MIN_SUCCESSFUL_ATTEMPTS, calculate_consensus,
};
use crate::storage::{MemoryStore, OpenMemoryClient};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, instrument, warn};

/// Converts a duration to milliseconds, saturating at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Returns the page after `page`, or `None` past `total_pages` or `u32::MAX`.
#[inline]
fn next_page(page: u32, total_pages: u32) -> Option<u32> {
    page.checked_add(1).filter(|next| *next <= total_pages)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Memories classified.
    pub records_checked: usize,

    /// Memories removed from the store.
    pub deleted: usize,

    /// Memories that a live run would have removed.
    pub would_delete: usize,

    /// Memories left in place by the policy.
    pub retained: usize,

    /// Retained memories whose consensus was uncertain.
    pub uncertain: usize,

    /// Failed classifier attempts across all memories.
    pub classifier_failures: usize,

    /// Deletions the store rejected.
    pub delete_failures: usize,

    /// Pages fetched successfully.
    pub pages_fetched: usize,

    /// Pages that could not be fetched.
    pub page_failures: usize,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SweepResult {
    /// Returns `true` if any page or deletion failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.page_failures > 0 || self.delete_failures > 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = if self.dry_run {
            format!(
                "Dry run: would delete {} of {} memories ({} retained, {} uncertain) in {}ms",
                self.would_delete,
                self.records_checked,
                self.retained,
                self.uncertain,
                self.duration_ms
            )
        } else {
            format!(
                "Deleted {} of {} memories ({} retained, {} uncertain) in {}ms",
                self.deleted, self.records_checked, self.retained, self.uncertain, self.duration_ms
            )
        };

        if self.has_failures() {
            summary.push_str(&format!(
                "; {} page failures, {} delete failures",
                self.page_failures, self.delete_failures
            ));
        }
        summary
    }
}

/// Retires transient memories from a store.
pub struct MemorySweeper<S: MemoryStore> {
    store: Arc<S>,
    coordinator: FanOutCoordinator,
    model_ids: Vec<String>,
    config: RetentionConfig,
}

impl<S: MemoryStore> MemorySweeper<S> {
    /// Creates a sweeper.
    ///
    /// `model_ids` is the classifier set used for every memory. Fewer than
    /// two models can never reach a verdict, so every memory is retained.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        coordinator: FanOutCoordinator,
        model_ids: Vec<String>,
        config: RetentionConfig,
    ) -> Self {
        if model_ids.len() < MIN_SUCCESSFUL_ATTEMPTS {
            warn!(
                models = model_ids.len(),
                "Too few classifier models configured; nothing will be deleted"
            );
        }
        Self {
            store,
            coordinator,
            model_ids,
            config,
        }
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the retention settings.
    #[must_use]
    pub const fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Returns the classifier models.
    #[must_use]
    pub fn model_ids(&self) -> &[String] {
        &self.model_ids
    }

    /// Classifies arbitrary content without touching the store.
    #[must_use]
    pub fn classify(&self, content: &str) -> ConsensusResult {
        calculate_consensus(self.coordinator.classify_all(&self.model_ids, content))
    }

    /// Classifies one memory and decides its fate.
    #[must_use]
    pub fn evaluate(&self, record: &MemoryRecord) -> (ConsensusResult, RetentionAction) {
        let consensus = self.classify(&record.content);
        let action = self.policy().decide(&record.id, &consensus);
        (consensus, action)
    }

    /// Sweeps the whole store.
    ///
    /// With `dry_run` set, nothing is deleted and candidates are counted in
    /// [`SweepResult::would_delete`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the store rejects the bearer token
    /// or every classifier rejects the API key. Deletions made before that
    /// point stay deleted.
    #[instrument(
        name = "memsweep.sweep",
        skip(self),
        fields(
            store = self.store.name(),
            models = self.model_ids.len(),
            dry_run = dry_run,
            delete_threshold = self.config.delete_threshold
        )
    )]
    pub fn sweep(&self, dry_run: bool) -> Result<SweepResult> {
        let start = Instant::now();
        let mut result = SweepResult {
            dry_run,
            ..Default::default()
        };

        let mut page = 1u32;
        // Stays at the last reported count when a page fetch fails.
        let mut total_pages = 1u32;
        while !self.limit_reached(&result) {
            match self.store.fetch_page(&self.config.filter_request(page)) {
                Ok(listing) => {
                    total_pages = listing.pages;
                    result.pages_fetched += 1;
                    debug!(
                        page,
                        total_pages,
                        items = listing.items.len(),
                        total = listing.total,
                        "Fetched page"
                    );
                    for record in &listing.items {
                        if self.limit_reached(&result) {
                            break;
                        }
                        self.process_record(record, dry_run, &mut result)?;
                    }
                },
                Err(e @ Error::Unauthorized(_)) => {
                    error!(page, error = %e, "Memory store rejected credentials, aborting sweep");
                    return Err(e);
                },
                Err(e) => {
                    warn!(page, error = %e, "Failed to fetch page, skipping");
                    metrics::counter!("memsweep_page_fetch_failures_total").increment(1);
                    result.page_failures += 1;
                },
            }
            match next_page(page, total_pages) {
                Some(next) => page = next,
                None => break,
            }
        }

        result.duration_ms = duration_to_millis(start.elapsed());

        metrics::counter!(
            "memsweep_sweeps_total",
            "dry_run" => dry_run.to_string()
        )
        .increment(1);
        metrics::histogram!("memsweep_sweep_duration_ms").record(u64_to_f64(result.duration_ms));

        info!(
            records_checked = result.records_checked,
            deleted = result.deleted,
            would_delete = result.would_delete,
            retained = result.retained,
            page_failures = result.page_failures,
            delete_failures = result.delete_failures,
            duration_ms = result.duration_ms,
            "Sweep completed"
        );

        Ok(result)
    }

    fn policy(&self) -> RetentionPolicy {
        self.config.policy()
    }

    fn limit_reached(&self, result: &SweepResult) -> bool {
        self.config
            .max_records
            .is_some_and(|max| result.records_checked >= max)
    }

    fn process_record(
        &self,
        record: &MemoryRecord,
        dry_run: bool,
        result: &mut SweepResult,
    ) -> Result<()> {
        let _span = info_span!("memsweep.sweep.record", memory_id = %record.id).entered();

        let (consensus, action) = self.evaluate(record);
        if consensus.credentials_rejected() {
            error!(
                models = consensus.attempts.len(),
                "Every classifier rejected credentials, aborting sweep"
            );
            return Err(Error::Unauthorized(
                "every classifier rejected the configured API key".to_string(),
            ));
        }
        result.records_checked += 1;
        result.classifier_failures += consensus.failed_count;
        metrics::counter!(
            "memsweep_consensus_total",
            "verdict" => consensus.final_verdict.as_str()
        )
        .increment(1);

        debug!(
            verdict = %consensus.final_verdict,
            confidence = consensus.confidence,
            successful = consensus.successful_count,
            failed = consensus.failed_count,
            "Consensus reached"
        );

        match action {
            RetentionAction::Retain => {
                result.retained += 1;
                if consensus.final_verdict == ConsensusVerdict::Uncertain {
                    result.uncertain += 1;
                }
            },
            RetentionAction::Delete { record_id } if dry_run => {
                info!(
                    memory_id = %record_id,
                    confidence = consensus.confidence,
                    "Would delete memory"
                );
                result.would_delete += 1;
            },
            RetentionAction::Delete { record_id } => {
                match self.store.delete_memories(std::slice::from_ref(&record_id)) {
                    Ok(_) => {
                        info!(
                            memory_id = %record_id,
                            confidence = consensus.confidence,
                            "Deleted memory"
                        );
                        metrics::counter!("memsweep_deletions_total", "status" => "success")
                            .increment(1);
                        result.deleted += 1;
                    },
                    Err(e @ Error::Unauthorized(_)) => {
                        error!(
                            memory_id = %record_id,
                            error = %e,
                            "Memory store rejected credentials"
                        );
                        return Err(e);
                    },
                    Err(e) => {
                        warn!(memory_id = %record_id, error = %e, "Failed to delete memory");
                        metrics::counter!("memsweep_deletions_total", "status" => "failure")
                            .increment(1);
                        result.delete_failures += 1;
                    },
                }
            },
        }
        Ok(())
    }
}

impl MemorySweeper<OpenMemoryClient> {
    /// Wires a sweeper against the remote store from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the store bearer token is missing.
    pub fn from_config(config: &SweepConfig) -> Result<Self> {
        let store = OpenMemoryClient::from_config(&config.store)?;
        let service = ClassificationService::from_config(&config.llm);
        Ok(Self::new(
            Arc::new(store),
            FanOutCoordinator::new(Arc::new(service)),
            config.llm.models.clone(),
            config.retention.clone(),
        ))
    }
}
