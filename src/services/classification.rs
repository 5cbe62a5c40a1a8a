//! Classifier invocation.
//!
//! One call, one model, one memory. Whatever goes wrong (unknown model,
//! transport, malformed output, a refusal to classify) is folded into a failed
//! attempt so callers never have to handle an error.

use crate::config::LlmConfig;
use crate::llm::{
    CLASSIFICATION_SYSTEM_PROMPT, LlmProvider, ModelClassification, ModelOutput, OpenAiClient,
    build_classification_prompt, build_http_client, parse_model_output,
};
use crate::models::{ClassificationAttempt, ClassificationResult, Verdict};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Invokes registered classifiers by model identifier.
#[derive(Clone, Default)]
pub struct ClassificationService {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ClassificationService {
    /// Creates a service with no registered models.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service with one `OpenAI`-compatible client per configured model.
    ///
    /// All clients share a single HTTP connection pool.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let http = build_http_client(config.http);
        let mut service = Self::new();
        for model_id in &config.models {
            let mut client = OpenAiClient::from_client(http.clone())
                .with_endpoint(config.base_url.clone())
                .with_model(model_id.clone())
                .with_attribution(config.referer.clone(), config.title.clone());
            if let Some(key) = &config.api_key {
                client = client.with_secret_key(key.clone());
            }
            service.register(model_id.clone(), Arc::new(client));
        }
        service
    }

    /// Registers a provider for a model identifier, replacing any previous one.
    pub fn register(&mut self, model_id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(model_id.into(), provider);
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with_provider(
        mut self,
        model_id: impl Into<String>,
        provider: impl LlmProvider + 'static,
    ) -> Self {
        self.register(model_id, Arc::new(provider));
        self
    }

    /// Returns `true` if a provider is registered for `model_id`.
    #[must_use]
    pub fn supports(&self, model_id: &str) -> bool {
        self.providers.contains_key(model_id)
    }

    /// Returns the registered model identifiers, sorted.
    #[must_use]
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Classifies `content` with one model.
    ///
    /// Performs exactly one request and never retries. Always returns an
    /// attempt for `model_id`.
    #[must_use]
    pub fn invoke(&self, model_id: &str, content: &str) -> ClassificationAttempt {
        let start = Instant::now();
        let attempt = match self.classify(model_id, content) {
            Ok(result) => ClassificationAttempt::success(result),
            Err(e) => {
                warn!(model = model_id, error = %e, "Classifier attempt failed");
                ClassificationAttempt::from_error(model_id, &e)
            },
        };

        let status = if attempt.is_success() {
            "success"
        } else {
            "failure"
        };
        metrics::counter!(
            "memsweep_classifications_total",
            "model" => model_id.to_string(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!(
            "memsweep_classification_duration_ms",
            "model" => model_id.to_string()
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);

        attempt
    }

    fn classify(&self, model_id: &str, content: &str) -> Result<ClassificationResult> {
        let provider = self
            .providers
            .get(model_id)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported model: {model_id}")))?;

        let user = build_classification_prompt(content);
        let response = provider.complete_with_system(CLASSIFICATION_SYSTEM_PROMPT, &user)?;
        let output = parse_model_output(&response)?;
        debug!(
            model = model_id,
            classification = ?output.classification,
            confidence = output.confidence,
            "Classifier responded"
        );

        to_result(model_id, output)
    }
}

impl std::fmt::Debug for ClassificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationService")
            .field("models", &self.model_ids())
            .finish()
    }
}

/// Converts validated model output into a vote.
#[allow(clippy::cast_possible_truncation)]
fn to_result(model_id: &str, output: ModelOutput) -> Result<ClassificationResult> {
    let verdict = match output.classification {
        ModelClassification::Transient => Verdict::Transient,
        ModelClassification::LongTerm => Verdict::LongTerm,
        ModelClassification::Unclassified => {
            return Err(Error::InvalidInput(format!(
                "model {model_id} left the memory unclassified: {}",
                output.reasoning
            )));
        },
    };

    Ok(ClassificationResult {
        model_id: model_id.to_string(),
        verdict,
        confidence: output.confidence.clamp(0.0, 1.0) as f32,
        reasoning: output.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        response: Result<String>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn ok(body: &str) -> Self {
            Self {
                response: Ok(body.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(Error::Unauthorized(message)) => Err(Error::Unauthorized(message.clone())),
                Err(e) => Err(Error::OperationFailed {
                    operation: "scripted".to_string(),
                    cause: e.to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_invoke_success() {
        let body = r#"{"classification": "transient", "confidence": 0.8, "reasoning": "errand"}"#;
        let service = ClassificationService::new().with_provider("m1", Scripted::ok(body));

        let attempt = service.invoke("m1", "Pick up milk");
        let result = attempt.result().expect("success");
        assert_eq!(result.model_id, "m1");
        assert_eq!(result.verdict, Verdict::Transient);
        assert!((result.confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(result.reasoning, "errand");
    }

    #[test]
    fn test_invoke_clamps_confidence() {
        let high = r#"{"classification": "long-term", "confidence": 7.5, "reasoning": "x"}"#;
        let low = r#"{"classification": "long-term", "confidence": -2, "reasoning": "x"}"#;
        let service = ClassificationService::new()
            .with_provider("high", Scripted::ok(high))
            .with_provider("low", Scripted::ok(low));

        let high = service.invoke("high", "c");
        let low = service.invoke("low", "c");
        assert!((high.result().expect("success").confidence - 1.0).abs() < f32::EPSILON);
        assert!(low.result().expect("success").confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_invoke_unsupported_model() {
        let attempt = ClassificationService::new().invoke("missing", "content");
        match attempt {
            ClassificationAttempt::Failure {
                model_id,
                error,
                credentials_rejected,
            } => {
                assert_eq!(model_id, "missing");
                assert!(!credentials_rejected);
                assert!(error.contains("unsupported model"));
            },
            ClassificationAttempt::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn test_invoke_unclassified_is_failure() {
        let body =
            r#"{"classification": "unclassified", "confidence": 0.9, "reasoning": "too vague"}"#;
        let service = ClassificationService::new().with_provider("m1", Scripted::ok(body));

        let attempt = service.invoke("m1", "it was successful");
        assert!(!attempt.is_success());
        assert_eq!(attempt.model_id(), "m1");
    }

    #[test]
    fn test_invoke_malformed_output_is_failure() {
        let service = ClassificationService::new()
            .with_provider("m1", Scripted::ok("definitely transient"));
        assert!(!service.invoke("m1", "content").is_success());
    }

    #[test]
    fn test_invoke_transport_error_is_failure() {
        let service = ClassificationService::new().with_provider(
            "m1",
            Scripted {
                response: Err(Error::InvalidInput("connection reset".to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let attempt = service.invoke("m1", "content");
        match attempt {
            ClassificationAttempt::Failure { error, .. } => {
                assert!(error.contains("connection reset"));
            },
            ClassificationAttempt::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn test_invoke_remembers_rejected_credentials() {
        let service = ClassificationService::new().with_provider(
            "m1",
            Scripted {
                response: Err(Error::Unauthorized("401 Unauthorized".to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let attempt = service.invoke("m1", "content");
        assert!(!attempt.is_success());
        assert!(attempt.is_credential_rejection());
    }

    #[test]
    fn test_invoke_calls_provider_exactly_once() {
        let provider = Scripted::ok("not json");
        let calls = Arc::clone(&provider.calls);
        let service = ClassificationService::new().with_provider("m1", provider);

        let _ = service.invoke("m1", "content");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_registers_every_model() {
        let config = LlmConfig {
            models: vec!["a/one".to_string(), "b/two".to_string()],
            ..LlmConfig::default()
        };
        let service = ClassificationService::from_config(&config);
        assert_eq!(service.model_ids(), vec!["a/one", "b/two"]);
        assert!(service.supports("a/one"));
        assert!(!service.supports("c/three"));
    }
}
