// Analysis Method Adapters
// Each adapter sends one claim through the executor and sanitizes the answer
// into its method's result shape

use crate::models::{
    AnalysisMethod, AnalysisOutcome, FactCheckResult, SocraticResult, TrustChainResult,
};
use crate::services::analysis::prompts::PromptTemplate;
use crate::services::config_store::AnalysisConfig;
use crate::services::providers::{ExecutorError, RequestExecutor};
use crate::services::sanitizer::{sanitize, StructuredResponse};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{method} request failed: {source}")]
    Request {
        method: AnalysisMethod,
        #[source]
        source: ExecutorError,
    },
    #[error("{method} response could not be sanitized: {error}")]
    Sanitization {
        method: AnalysisMethod,
        error: String,
        steps: Vec<String>,
    },
    #[error("{method} task aborted: {message}")]
    Aborted {
        method: AnalysisMethod,
        message: String,
    },
}

impl AnalysisError {
    pub fn method(&self) -> AnalysisMethod {
        match self {
            Self::Request { method, .. }
            | Self::Sanitization { method, .. }
            | Self::Aborted { method, .. } => *method,
        }
    }
}

/// One independently retryable analysis method
#[async_trait]
pub trait ClaimAnalyzer: Send + Sync {
    fn method(&self) -> AnalysisMethod;

    async fn analyze(&self, claim: &str) -> Result<AnalysisOutcome, AnalysisError>;
}

/// Prompt-driven adapter producing a `T` for one method.
///
/// Holds only immutable configuration and a shared executor, so one instance can
/// serve concurrent and repeated calls.
pub struct PromptAdapter<T> {
    template: PromptTemplate,
    executor: Arc<RequestExecutor>,
    _shape: PhantomData<fn() -> T>,
}

pub type FactCheckAdapter = PromptAdapter<FactCheckResult>;
pub type TrustChainAdapter = PromptAdapter<TrustChainResult>;
pub type SocraticAdapter = PromptAdapter<SocraticResult>;

impl<T> PromptAdapter<T>
where
    T: StructuredResponse + Into<AnalysisOutcome>,
{
    fn with_template(template: PromptTemplate, executor: Arc<RequestExecutor>) -> Self {
        Self {
            template,
            executor,
            _shape: PhantomData,
        }
    }

    /// Execute the prompt for `claim` and sanitize the answer into `T`
    pub async fn run(&self, claim: &str) -> Result<T, AnalysisError> {
        let method = self.template.method;
        let request = self.executor.chat_config(
            method.key(),
            &self.template.model,
            &self.template.system,
            claim,
            self.template.max_tokens,
        );

        let completion = self
            .executor
            .execute(&request)
            .await
            .map_err(|source| AnalysisError::Request { method, source })?;

        let sanitized = sanitize::<T>(&completion.content);
        let step_count = sanitized.steps_tried.len();
        match sanitized.into_result() {
            Ok(data) => {
                info!(
                    "[ADAPTER] {} parsed after {} step(s), {} attempt(s)",
                    method, step_count, completion.attempts
                );
                Ok(data)
            }
            Err((error, steps)) => {
                warn!("[ADAPTER] {} sanitization failed: {}", method, error);
                Err(AnalysisError::Sanitization {
                    method,
                    error,
                    steps,
                })
            }
        }
    }
}

impl FactCheckAdapter {
    pub fn fact_check(executor: Arc<RequestExecutor>, config: &AnalysisConfig) -> Self {
        Self::with_template(
            PromptTemplate::for_method(AnalysisMethod::FactCheck, config),
            executor,
        )
    }
}

impl TrustChainAdapter {
    pub fn trust_chain(executor: Arc<RequestExecutor>, config: &AnalysisConfig) -> Self {
        Self::with_template(
            PromptTemplate::for_method(AnalysisMethod::TrustChain, config),
            executor,
        )
    }
}

impl SocraticAdapter {
    pub fn socratic(executor: Arc<RequestExecutor>, config: &AnalysisConfig) -> Self {
        Self::with_template(
            PromptTemplate::for_method(AnalysisMethod::Socratic, config),
            executor,
        )
    }
}

#[async_trait]
impl<T> ClaimAnalyzer for PromptAdapter<T>
where
    T: StructuredResponse + Into<AnalysisOutcome> + Send + 'static,
{
    fn method(&self) -> AnalysisMethod {
        self.template.method
    }

    async fn analyze(&self, claim: &str) -> Result<AnalysisOutcome, AnalysisError> {
        self.run(claim).await.map(Into::into)
    }
}

/// The three adapters in fixed method order, sharing one executor
pub fn default_analyzers(
    executor: Arc<RequestExecutor>,
    config: &AnalysisConfig,
) -> Vec<Arc<dyn ClaimAnalyzer>> {
    let fact_check: Arc<dyn ClaimAnalyzer> =
        Arc::new(FactCheckAdapter::fact_check(executor.clone(), config));
    let trust_chain: Arc<dyn ClaimAnalyzer> =
        Arc::new(TrustChainAdapter::trust_chain(executor.clone(), config));
    let socratic: Arc<dyn ClaimAnalyzer> = Arc::new(SocraticAdapter::socratic(executor, config));
    vec![fact_check, trust_chain, socratic]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::tests::{ok_body, test_settings, ScriptedTransport};
    use crate::services::providers::TransportResponse;
    use crate::services::token_monitor::TokenMonitor;

    fn executor_with(transport: Arc<ScriptedTransport>) -> Arc<RequestExecutor> {
        Arc::new(
            RequestExecutor::with_transport(&test_settings(), transport, Arc::new(TokenMonitor::new()))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fact_check_adapter_uses_quick_model() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_body(
            "```json\n{\"verdict\":\"FALSE\",\"explanation\":\"Debunked\",\"sources\":[]}\n```",
        )]));
        let adapter = FactCheckAdapter::fact_check(executor_with(transport.clone()), &AnalysisConfig::default());

        let result = adapter.run("The moon is made of cheese").await.unwrap();
        assert_eq!(result.verdict, "FALSE");

        let requests = transport.requests.lock().unwrap();
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["model"], "sonar");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][1]["content"], "The moon is made of cheese");
    }

    #[tokio::test]
    async fn test_sanitization_failure_is_propagated() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_body("I'd rather not say.")]));
        let adapter = TrustChainAdapter::trust_chain(executor_with(transport), &AnalysisConfig::default());

        let err = adapter.analyze("claim").await.unwrap_err();
        match err {
            AnalysisError::Sanitization { method, steps, .. } => {
                assert_eq!(method, AnalysisMethod::TrustChain);
                assert!(!steps.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_request_failure_is_propagated() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(TransportResponse {
            status: 400,
            body: "bad request".to_string(),
        })]));
        let adapter = SocraticAdapter::socratic(executor_with(transport), &AnalysisConfig::default());

        let err = adapter.analyze("claim").await.unwrap_err();
        assert_eq!(err.method(), AnalysisMethod::Socratic);
        assert!(matches!(
            err,
            AnalysisError::Request {
                source: ExecutorError::PermanentClient { status: 400, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_default_analyzers_cover_every_method() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok_body("{}")]));
        let analyzers = default_analyzers(executor_with(transport), &AnalysisConfig::default());
        let methods: Vec<_> = analyzers.iter().map(|a| a.method()).collect();
        assert_eq!(methods, AnalysisMethod::ALL.to_vec());
    }
}
