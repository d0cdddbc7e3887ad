// Claim Analysis Service
// Wires executor, adapters, orchestrator, confidence engine and store together

use crate::models::{AnalysisRecord, CombinedAnalysis, ConfidenceReport};
use crate::services::analysis::adapters::{default_analyzers, ClaimAnalyzer};
use crate::services::analysis::confidence::ConfidenceEngine;
use crate::services::analysis::orchestrator::AnalysisOrchestrator;
use crate::services::claim_store::ClaimStore;
use crate::services::config_store::AppConfig;
use crate::services::providers::{ExecutorError, RequestExecutor};
use crate::services::token_monitor::TokenMonitor;
use std::sync::Arc;
use tracing::info;

pub struct ClaimAnalysisService {
    orchestrator: AnalysisOrchestrator,
    engine: ConfidenceEngine,
    store: Arc<ClaimStore>,
    token_monitor: Arc<TokenMonitor>,
}

impl ClaimAnalysisService {
    /// Build the HTTP-backed service; fails fast when the API key or base URL is missing
    pub fn from_config(config: &AppConfig) -> Result<Self, ExecutorError> {
        let token_monitor = Arc::new(TokenMonitor::new());
        let executor = Arc::new(RequestExecutor::new(&config.api, token_monitor.clone())?);
        let analyzers = default_analyzers(executor, &config.analysis);
        Ok(Self::with_analyzers(analyzers, config, token_monitor))
    }

    pub fn with_analyzers(
        analyzers: Vec<Arc<dyn ClaimAnalyzer>>,
        config: &AppConfig,
        token_monitor: Arc<TokenMonitor>,
    ) -> Self {
        Self {
            orchestrator: AnalysisOrchestrator::new(analyzers, config.analysis.retry_delay()),
            engine: ConfidenceEngine::from_config(&config.confidence),
            store: Arc::new(ClaimStore::new()),
            token_monitor,
        }
    }

    pub fn store(&self) -> &Arc<ClaimStore> {
        &self.store
    }

    pub fn token_monitor(&self) -> &Arc<TokenMonitor> {
        &self.token_monitor
    }

    pub async fn analyze_claim(&self, claim: &str) -> CombinedAnalysis {
        info!("[SERVICE] analyzing claim ({} chars)", claim.chars().count());
        self.orchestrator.analyze(claim).await
    }

    pub fn assess(&self, analysis: &CombinedAnalysis) -> ConfidenceReport {
        self.engine.aggregate(analysis)
    }

    /// Analyze, score and persist one claim
    pub async fn analyze_and_store(&self, claim: &str) -> AnalysisRecord {
        let analysis = self.analyze_claim(claim).await;
        let confidence = self.assess(&analysis);
        self.store.save(claim, analysis, confidence).await
    }
}
