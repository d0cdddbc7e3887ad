// Truth-Tracer Core Services

pub mod analysis;
pub mod claim_store;
pub mod config_store;
pub mod providers;
pub mod sanitizer;
pub mod token_monitor;

pub use analysis::{ClaimAnalysisService, ConfidenceEngine};
pub use claim_store::ClaimStore;
pub use config_store::*;
pub use providers::*;
pub use sanitizer::{sanitize, SanitizationResult, StructuredResponse};
pub use token_monitor::{TokenMonitor, TokenUsageMetrics};
