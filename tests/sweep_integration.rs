//! Sweep integration tests.
//!
//! Drives the whole pipeline (store paging, classifier fan-out, consensus,
//! retention decision and deletion) through the public API:
//! - Scripted classifiers against the in-memory store
//! - Real HTTP clients pointed at an unreachable endpoint, to check that
//!   transport failures degrade into retained memories and skipped pages
//!
//! These tests do NOT require network access or API keys.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic, dead_code)]

use memsweep::gc::{MemorySweeper, RetentionConfig};
use memsweep::llm::{LlmHttpConfig, LlmProvider, OpenAiClient};
use memsweep::models::{MemoryId, MemoryRecord};
use memsweep::storage::{InMemoryStore, MemoryStore, OpenMemoryClient};
use memsweep::{
    ClassificationAttempt, ClassificationService, ConsensusVerdict, Error, FanOutCoordinator,
    Result, calculate_consensus,
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Address nothing listens on.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Answers from a fixed table keyed by memory content.
struct Oracle {
    answers: HashMap<&'static str, &'static str>,
    calls: Arc<AtomicUsize>,
}

impl Oracle {
    fn new(answers: &[(&'static str, &'static str)]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl LlmProvider for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_system("", prompt)
    }

    fn complete_with_system(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = self
            .answers
            .iter()
            .find(|(content, _)| user.contains(*content))
            .map_or("unclassified", |(_, verdict)| *verdict);
        let body = serde_json::json!({
            "classification": verdict,
            "confidence": 0.8,
            "reasoning": "table",
        });
        Ok(format!("```json\n{body}\n```"))
    }
}

struct Broken;

impl LlmProvider for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn complete(&self, _prompt: &str) -> Result<String> {
        Err(Error::OperationFailed {
            operation: "complete".to_string(),
            cause: "HTTP 502".to_string(),
        })
    }
}

fn records(contents: &[&str]) -> Vec<MemoryRecord> {
    contents
        .iter()
        .enumerate()
        .map(|(i, c)| MemoryRecord::new(format!("mem-{i}"), *c))
        .collect()
}

fn model_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("model-{i}")).collect()
}

// ============================================================================
// End-to-end sweeps
// ============================================================================

mod sweeps {
    use super::*;

    /// Three models that agree on everything in the table.
    fn agreeing_service(answers: &[(&'static str, &'static str)]) -> ClassificationService {
        ClassificationService::new()
            .with_provider("model-0", Oracle::new(answers))
            .with_provider("model-1", Oracle::new(answers))
            .with_provider("model-2", Oracle::new(answers))
    }

    #[test]
    fn test_mixed_store_sweep() {
        let answers = [
            ("Pick up milk on the way home", "transient"),
            ("User is allergic to peanuts", "long-term"),
            ("Meeting moved to 3pm today", "transient"),
            ("The task went fine", "unclassified"),
        ];
        let store = Arc::new(InMemoryStore::with_records(records(&[
            "Pick up milk on the way home",
            "User is allergic to peanuts",
            "Meeting moved to 3pm today",
            "The task went fine",
        ])));
        let sweeper = MemorySweeper::new(
            Arc::clone(&store),
            FanOutCoordinator::new(Arc::new(agreeing_service(&answers))),
            model_ids(3),
            RetentionConfig::default(),
        );

        let result = sweeper.sweep(false).expect("sweep");

        assert_eq!(result.records_checked, 4);
        assert_eq!(result.deleted, 2);
        assert_eq!(result.retained, 2);
        // Every model declined the vague memory.
        assert_eq!(result.uncertain, 1);
        assert_eq!(result.classifier_failures, 3);
        assert_eq!(
            store.ids(),
            vec![MemoryId::new("mem-1"), MemoryId::new("mem-3")]
        );
    }

    #[test]
    fn test_dry_run_then_live_run() {
        let answers = [("buy stamps", "transient"), ("likes jazz", "long-term")];
        let store = Arc::new(InMemoryStore::with_records(records(&[
            "buy stamps",
            "likes jazz",
        ])));
        let sweeper = MemorySweeper::new(
            Arc::clone(&store),
            FanOutCoordinator::new(Arc::new(agreeing_service(&answers))),
            model_ids(3),
            RetentionConfig::default(),
        );

        let dry = sweeper.sweep(true).expect("sweep");
        assert_eq!(dry.would_delete, 1);
        assert_eq!(store.ids().len(), 2);

        let live = sweeper.sweep(false).expect("sweep");
        assert_eq!(live.deleted, 1);
        assert_eq!(store.ids(), vec![MemoryId::new("mem-1")]);
    }

    #[test]
    fn test_split_vote_respects_threshold() {
        // Two transient votes against one long-term: simple majority, 0.67.
        let service = ClassificationService::new()
            .with_provider("model-0", Oracle::new(&[("water plants", "transient")]))
            .with_provider("model-1", Oracle::new(&[("water plants", "transient")]))
            .with_provider("model-2", Oracle::new(&[("water plants", "long-term")]));
        let service = Arc::new(service);

        let strict = MemorySweeper::new(
            Arc::new(InMemoryStore::with_records(records(&["water plants"]))),
            FanOutCoordinator::new(Arc::clone(&service)),
            model_ids(3),
            RetentionConfig::default(),
        );
        assert_eq!(strict.sweep(false).expect("sweep").deleted, 0);

        let lenient = MemorySweeper::new(
            Arc::new(InMemoryStore::with_records(records(&["water plants"]))),
            FanOutCoordinator::new(service),
            model_ids(3),
            RetentionConfig::default().with_delete_threshold(0.6),
        );
        assert_eq!(lenient.sweep(false).expect("sweep").deleted, 1);
    }

    #[test]
    fn test_single_model_never_deletes() {
        let service = ClassificationService::new()
            .with_provider("model-0", Oracle::new(&[("buy stamps", "transient")]));
        let store = Arc::new(InMemoryStore::with_records(records(&["buy stamps"])));
        let sweeper = MemorySweeper::new(
            Arc::clone(&store),
            FanOutCoordinator::new(Arc::new(service)),
            model_ids(1),
            RetentionConfig::default().with_delete_threshold(0.0),
        );

        let result = sweeper.sweep(false).expect("sweep");
        assert_eq!(result.deleted, 0);
        assert_eq!(result.uncertain, 1);
        assert_eq!(store.ids().len(), 1);
    }

    #[test]
    fn test_each_model_called_once_per_memory() {
        let oracle = Oracle::new(&[("a", "long-term")]);
        let calls = Arc::clone(&oracle.calls);
        let service = ClassificationService::new()
            .with_provider("model-0", oracle)
            .with_provider("model-1", Oracle::new(&[]));
        let sweeper = MemorySweeper::new(
            Arc::new(InMemoryStore::with_records(records(&["a", "a", "a"]))),
            FanOutCoordinator::new(Arc::new(service)),
            model_ids(2),
            RetentionConfig::default().with_page_size(2),
        );

        let result = sweeper.sweep(false).expect("sweep");
        assert_eq!(result.records_checked, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_store_failures_do_not_abort() {
        let answers = [("stale", "transient")];
        let store = Arc::new(
            InMemoryStore::with_records(records(&["stale", "keep", "stale", "keep", "stale"]))
                .with_failing_page(2)
                .with_failing_delete("mem-0"),
        );
        let sweeper = MemorySweeper::new(
            Arc::clone(&store),
            FanOutCoordinator::new(Arc::new(agreeing_service(&answers))),
            model_ids(3),
            RetentionConfig::default().with_page_size(2),
        );

        let result = sweeper.sweep(true).expect("sweep");
        assert_eq!(result.page_failures, 1);
        assert_eq!(result.records_checked, 3);
        assert_eq!(result.would_delete, 2);

        let result = sweeper.sweep(false).expect("sweep");
        assert_eq!(result.delete_failures, 1);
        assert!(result.summary().contains("1 delete failures"));
        assert!(store.ids().contains(&MemoryId::new("mem-0")));
    }
}

// ============================================================================
// Fan-out and consensus through real providers
// ============================================================================

mod fan_out {
    use super::*;

    fn fast_http() -> LlmHttpConfig {
        LlmHttpConfig {
            timeout_ms: 2_000,
            connect_timeout_ms: 500,
        }
    }

    #[test]
    fn test_unreachable_endpoint_becomes_failures() {
        let mut service = ClassificationService::new();
        for id in model_ids(3) {
            let client = OpenAiClient::new()
                .with_api_key("sk-test")
                .with_endpoint(UNREACHABLE)
                .with_model(id.clone())
                .with_http_config(fast_http());
            service.register(id, Arc::new(client));
        }
        let coordinator = FanOutCoordinator::new(Arc::new(service));

        let attempts = coordinator.classify_all(&model_ids(3), "Call John at 3 PM today");
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| !a.is_success()));

        let consensus = calculate_consensus(attempts);
        assert_eq!(consensus.final_verdict, ConsensusVerdict::Uncertain);
        assert!((consensus.confidence - 0.1).abs() < f32::EPSILON);
        assert_eq!(consensus.failed_count, 3);
    }

    #[test]
    fn test_one_broken_model_still_reaches_consensus() {
        let service = ClassificationService::new()
            .with_provider("model-0", Oracle::new(&[("dentist", "transient")]))
            .with_provider("model-1", Broken)
            .with_provider("model-2", Oracle::new(&[("dentist", "transient")]));
        let coordinator = FanOutCoordinator::new(Arc::new(service));

        let consensus =
            calculate_consensus(coordinator.classify_all(&model_ids(3), "dentist tomorrow"));
        assert_eq!(consensus.final_verdict, ConsensusVerdict::Transient);
        assert!((consensus.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(consensus.successful_count, 2);

        match &consensus.attempts[1] {
            ClassificationAttempt::Failure { model_id, error, .. } => {
                assert_eq!(model_id, "model-1");
                assert!(error.contains("HTTP 502"));
            },
            ClassificationAttempt::Success { .. } => panic!("broken model succeeded"),
        }
    }

    #[test]
    fn test_unregistered_model_is_a_failure() {
        let service = ClassificationService::new()
            .with_provider("model-0", Oracle::new(&[("x", "transient")]));
        let coordinator = FanOutCoordinator::new(Arc::new(service));

        let attempts = coordinator.classify_all(&["model-0".to_string(), "ghost".to_string()], "x");
        assert_eq!(attempts[1].model_id(), "ghost");
        assert!(!attempts[1].is_success());
    }
}

// ============================================================================
// Remote store failures
// ============================================================================

mod remote_store {
    use super::*;

    #[test]
    fn test_unreachable_store_is_an_error() {
        let store = OpenMemoryClient::new(UNREACHABLE, SecretString::from("om-test"));
        let err = store
            .fetch_page(&memsweep::models::FilterRequest::default())
            .expect_err("nothing is listening");
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_sweep_against_unreachable_store_completes() {
        let store = Arc::new(OpenMemoryClient::new(UNREACHABLE, SecretString::from("om-test")));
        let service = ClassificationService::new()
            .with_provider("model-0", Broken)
            .with_provider("model-1", Broken);
        let sweeper = MemorySweeper::new(
            store,
            FanOutCoordinator::new(Arc::new(service)),
            model_ids(2),
            RetentionConfig::default(),
        );

        let result = sweeper.sweep(false).expect("sweep");
        assert_eq!(result.page_failures, 1);
        assert_eq!(result.records_checked, 0);
        assert!(result.has_failures());
    }
}
