// Claim Analysis
// Prompt adapters, fan-out orchestration and confidence aggregation

pub mod adapters;
pub mod confidence;
pub mod orchestrator;
pub mod prompts;
pub mod service;
pub mod validation;

pub use adapters::{
    default_analyzers, AnalysisError, ClaimAnalyzer, FactCheckAdapter, PromptAdapter,
    SocraticAdapter, TrustChainAdapter,
};
pub use confidence::{aggregate, aggregate_with_threshold, ConfidenceEngine, VerdictScore};
pub use orchestrator::AnalysisOrchestrator;
pub use prompts::{ModelVariant, PromptTemplate};
pub use service::ClaimAnalysisService;
