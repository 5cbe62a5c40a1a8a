//! Concurrent classifier fan-out.
//!
//! Each model runs on its own scoped thread. The scope joins every thread
//! before returning, so consensus only ever sees a complete set of attempts.

use super::ClassificationService;
use crate::models::ClassificationAttempt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

/// Runs all classifiers for a memory concurrently and waits for all of them.
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
    service: Arc<ClassificationService>,
}

impl FanOutCoordinator {
    /// Creates a coordinator over the given classification service.
    #[must_use]
    pub const fn new(service: Arc<ClassificationService>) -> Self {
        Self { service }
    }

    /// Classifies `content` with every model in `model_ids`.
    ///
    /// Returns exactly one attempt per model id, in input order. A model that
    /// fails, or whose worker thread panics or cannot be spawned, yields a
    /// failed attempt and leaves its siblings untouched.
    #[must_use]
    pub fn classify_all(&self, model_ids: &[String], content: &str) -> Vec<ClassificationAttempt> {
        if model_ids.is_empty() {
            return Vec::new();
        }

        let attempts: Vec<ClassificationAttempt> = thread::scope(|scope| {
            let workers: Vec<_> = model_ids
                .iter()
                .map(|model_id| {
                    let spawned = thread::Builder::new()
                        .name(format!("classify:{model_id}"))
                        .spawn_scoped(scope, move || self.service.invoke(model_id, content));
                    (model_id, spawned)
                })
                .collect();

            workers
                .into_iter()
                .map(|(model_id, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        error!(model = %model_id, "Classifier thread panicked");
                        ClassificationAttempt::failure(
                            model_id.as_str(),
                            "classifier thread panicked",
                        )
                    }),
                    Err(e) => {
                        error!(model = %model_id, error = %e, "Failed to spawn classifier thread");
                        ClassificationAttempt::failure(
                            model_id.as_str(),
                            format!("failed to spawn classifier thread: {e}"),
                        )
                    },
                })
                .collect()
        });

        debug!(
            models = model_ids.len(),
            successful = attempts.iter().filter(|a| a.is_success()).count(),
            "Fan-out settled"
        );
        attempts
    }
}
