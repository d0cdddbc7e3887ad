// Token Usage Monitor
// Collects per-call token usage; shared by all concurrently running adapters

use crate::models::TokenUsage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Completion usage above this share of the budget is logged as a warning
const HIGH_USAGE_PERCENT: f64 = 90.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageMetrics {
    pub endpoint: String,
    pub usage: TokenUsage,
    pub max_tokens: u32,
    pub timestamp: DateTime<Utc>,
}

impl TokenUsageMetrics {
    pub fn usage_percentage(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        self.usage.completion_tokens as f64 / self.max_tokens as f64 * 100.0
    }
}

#[derive(Debug, Default)]
pub struct TokenMonitor {
    metrics: Mutex<Vec<TokenUsageMetrics>>,
}

impl TokenMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<TokenUsageMetrics>> {
        // A panic while holding the lock cannot leave a half-written Vec push behind
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, endpoint: &str, usage: TokenUsage, max_tokens: u32) {
        let entry = TokenUsageMetrics {
            endpoint: endpoint.to_string(),
            usage,
            max_tokens,
            timestamp: Utc::now(),
        };

        let pct = entry.usage_percentage();
        debug!(
            endpoint = endpoint,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            max_tokens = max_tokens,
            "[TOKENS] usage {:.2}%",
            pct
        );
        if pct > HIGH_USAGE_PERCENT {
            warn!("[TOKENS] High token usage detected for {}: {:.2}%", endpoint, pct);
        }

        self.entries().push(entry);
    }

    pub fn snapshot(&self) -> Vec<TokenUsageMetrics> {
        self.entries().clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-field mean over all recorded calls, rounded to whole tokens
    pub fn average(&self) -> TokenUsage {
        let entries = self.entries();
        if entries.is_empty() {
            return TokenUsage::default();
        }

        let n = entries.len() as f64;
        let avg = |field: fn(&TokenUsage) -> u32| {
            let sum: f64 = entries.iter().map(|m| field(&m.usage) as f64).sum();
            (sum / n).round() as u32
        };

        TokenUsage {
            prompt_tokens: avg(|u| u.prompt_tokens),
            completion_tokens: avg(|u| u.completion_tokens),
            total_tokens: avg(|u| u.total_tokens),
        }
    }
}
