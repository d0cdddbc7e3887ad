// Analysis Orchestrator
// Fans a claim out to every analyzer, retries failed methods one at a time,
// and assembles the combined result

use crate::models::{AnalysisMethod, AnalysisOutcome, CombinedAnalysis};
use crate::services::analysis::adapters::{AnalysisError, ClaimAnalyzer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Spacing inserted before each sequential retry
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

pub struct AnalysisOrchestrator {
    analyzers: Vec<Arc<dyn ClaimAnalyzer>>,
    retry_delay: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(analyzers: Vec<Arc<dyn ClaimAnalyzer>>, retry_delay: Duration) -> Self {
        Self {
            analyzers,
            retry_delay,
        }
    }

    /// Run every analyzer and return the combined result.
    ///
    /// Method failures never surface as errors: a method that fails both the
    /// concurrent pass and its retry is reported as rejected.
    pub async fn analyze(&self, claim: &str) -> CombinedAnalysis {
        let started = Instant::now();
        let claim: Arc<str> = Arc::from(claim);

        let mut outcomes = self.fan_out(&claim).await;

        let failed: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_none())
            .map(|(idx, _)| idx)
            .collect();

        if failed.is_empty() {
            info!(
                "[ORCHESTRATOR] all {} methods fulfilled on first pass (elapsed_ms={})",
                self.analyzers.len(),
                started.elapsed().as_millis()
            );
        } else {
            info!(
                "[ORCHESTRATOR] retrying {} failed method(s) sequentially",
                failed.len()
            );
            for idx in failed {
                tokio::time::sleep(self.retry_delay).await;
                outcomes[idx] = self.run_single(idx, &claim).await;
            }
        }

        let combined = CombinedAnalysis::assemble(outcomes.into_iter().flatten());
        info!(
            "[ORCHESTRATOR] done: fulfilled={:?} elapsed_ms={}",
            combined.present_methods(),
            started.elapsed().as_millis()
        );
        combined
    }

    /// Launch all analyzers concurrently and wait for every one to settle
    async fn fan_out(&self, claim: &Arc<str>) -> Vec<Option<AnalysisOutcome>> {
        let mut outcomes: Vec<Option<AnalysisOutcome>> = vec![None; self.analyzers.len()];
        let mut join_set: JoinSet<(usize, Result<AnalysisOutcome, AnalysisError>)> =
            JoinSet::new();

        for (idx, analyzer) in self.analyzers.iter().enumerate() {
            let analyzer = analyzer.clone();
            let claim = claim.clone();
            join_set.spawn(async move { (idx, analyzer.analyze(&claim).await) });
        }

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((idx, result)) => outcomes[idx] = self.accept(idx, result),
                Err(e) => warn!("[ORCHESTRATOR] analysis task failed: {}", e),
            }
        }

        outcomes
    }

    /// Retry one analyzer in its own task so a panic stays a method failure
    async fn run_single(&self, idx: usize, claim: &Arc<str>) -> Option<AnalysisOutcome> {
        let analyzer = self.analyzers[idx].clone();
        let method = analyzer.method();
        let claim = claim.clone();

        match tokio::spawn(async move { analyzer.analyze(&claim).await }).await {
            Ok(result) => self.accept(idx, result),
            Err(e) => {
                let err = AnalysisError::Aborted {
                    method,
                    message: e.to_string(),
                };
                warn!("[ORCHESTRATOR] retry failed: {}", err);
                None
            }
        }
    }

    fn accept(
        &self,
        idx: usize,
        result: Result<AnalysisOutcome, AnalysisError>,
    ) -> Option<AnalysisOutcome> {
        let expected = self.analyzers[idx].method();
        match result {
            Ok(outcome) if outcome.method() == Some(expected) => Some(outcome),
            Ok(outcome) => {
                warn!(
                    "[ORCHESTRATOR] {} returned a {:?} outcome; treating as failure",
                    expected,
                    outcome.method()
                );
                None
            }
            Err(e) => {
                warn!("[ORCHESTRATOR] {} failed: {}", expected, e);
                None
            }
        }
    }
}
