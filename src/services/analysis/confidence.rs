// Confidence Aggregation Engine
// Scores each present method, combines the scores with configured weights
// and builds a deterministic explanation

use crate::models::{
    CombinedAnalysis, ConfidenceFactor, ConfidenceLevel, ConfidenceReport, ConfidenceWeights,
    FactCheckResult, FactorScore, SocraticResult, TrustChainResult, Verdict, CREDIBILITY_DEFAULT,
};
use crate::services::config_store::ConfidenceConfig;
use std::collections::HashSet;
use tracing::debug;

/// Default score required for a claim to count as verified
pub const VERIFIED_THRESHOLD: f64 = 0.7;

/// Neutral sub-score for unknown verdicts and missing trust chains
pub const NEUTRAL_SCORE: f64 = 0.5;

const SOCRATIC_BASE_SCORE: f64 = 0.5;
const SOCRATIC_STEP_INCREMENT: f64 = 0.1;
const SOCRATIC_CONCLUSION_BONUS: f64 = 0.1;
const SOCRATIC_FLAWS_BONUS: f64 = 0.1;
const SOCRATIC_STRENGTHS_BONUS: f64 = 0.1;

/// Source reliability when the fact-check cites nothing
const NO_SOURCES_SCORE: f64 = 0.3;

const EMPTY_EXPLANATION: &str = "No analysis method completed successfully.";

pub struct VerdictScore;

impl VerdictScore {
    /// Total lookup: recognized verdicts (any casing) map to fixed scores, anything else to 0.5
    pub fn lookup(verdict: &str) -> f64 {
        match Verdict::parse(verdict) {
            Some(Verdict::True) => 1.0,
            Some(Verdict::False) => 0.0,
            Some(Verdict::Misleading) => 0.3,
            Some(Verdict::Unverifiable) => 0.5,
            None => NEUTRAL_SCORE,
        }
    }
}

// ============ Sub-scores ============

pub fn fact_check_score(result: &FactCheckResult) -> f64 {
    VerdictScore::lookup(&result.verdict)
}

/// Mean source rating; a chain without sources counts as not found
pub fn trust_chain_score(result: &TrustChainResult) -> f64 {
    if result.sources.is_empty() {
        return NEUTRAL_SCORE;
    }
    let total: f64 = result
        .sources
        .iter()
        .map(|s| s.reliability.as_ref().map_or(CREDIBILITY_DEFAULT, |r| r.value()))
        .sum();
    (total / result.sources.len() as f64).clamp(0.0, 1.0)
}

pub fn socratic_score(result: &SocraticResult) -> f64 {
    let c = &result.conclusion;
    let mut score =
        SOCRATIC_BASE_SCORE + SOCRATIC_STEP_INCREMENT * result.reasoning_steps.len() as f64;
    if !c.logical_validity.trim().is_empty() {
        score += SOCRATIC_CONCLUSION_BONUS;
    }
    if !c.key_flaws.trim().is_empty() {
        score += SOCRATIC_FLAWS_BONUS;
    }
    if !c.strengths.trim().is_empty() {
        score += SOCRATIC_STRENGTHS_BONUS;
    }
    score.min(1.0)
}

pub fn source_reliability_score(result: &FactCheckResult) -> f64 {
    if result.sources.is_empty() {
        return NO_SOURCES_SCORE;
    }
    let total: f64 = result
        .sources
        .iter()
        .map(|s| s.reliability.as_ref().map_or(CREDIBILITY_DEFAULT, |r| r.value()))
        .sum();
    total / result.sources.len() as f64
}

/// Agreement between the verdict and the trust-chain confidence, averaged with the
/// overlap of cited URLs (0.5 when either side cites nothing)
pub fn evidence_consistency_score(fact_check: &FactCheckResult, trust_chain: &TrustChainResult) -> f64 {
    let trust_confidence = trust_chain
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or_else(|| trust_chain_score(trust_chain));
    let rating = 1.0 - (fact_check_score(fact_check) - trust_confidence).abs();

    let fact_urls: HashSet<&str> = fact_check
        .sources
        .iter()
        .map(|s| s.url.as_str())
        .filter(|u| !u.is_empty())
        .collect();
    let trust_urls: HashSet<&str> = trust_chain
        .sources
        .iter()
        .map(|s| s.url.as_str())
        .filter(|u| !u.is_empty())
        .collect();

    let overlap = if fact_urls.is_empty() || trust_urls.is_empty() {
        NEUTRAL_SCORE
    } else {
        let shared = fact_urls.intersection(&trust_urls).count() as f64;
        let union = fact_urls.union(&trust_urls).count() as f64;
        shared / union
    };

    (rating + overlap) / 2.0
}

// ============ Aggregation ============

/// `Σ(score·weight) / Σ(weight)` over the supplied terms; 0 when no weight remains
pub fn combine_weighted(terms: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = terms.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = terms.iter().map(|(s, w)| s * w).sum();
    (weighted / total_weight).clamp(0.0, 1.0)
}

fn factor_score(analysis: &CombinedAnalysis, factor: ConfidenceFactor) -> Option<f64> {
    match factor {
        ConfidenceFactor::FactCheck => analysis.fact_check().map(fact_check_score),
        ConfidenceFactor::TrustChain => analysis.trust_chain().map(trust_chain_score),
        ConfidenceFactor::Socratic => analysis.socratic().map(socratic_score),
        ConfidenceFactor::SourceReliability => analysis.fact_check().map(source_reliability_score),
        ConfidenceFactor::EvidenceConsistency => match (analysis.fact_check(), analysis.trust_chain()) {
            (Some(f), Some(t)) => Some(evidence_consistency_score(f, t)),
            _ => None,
        },
    }
}

pub fn aggregate(analysis: &CombinedAnalysis, weights: &ConfidenceWeights) -> ConfidenceReport {
    aggregate_with_threshold(analysis, weights, VERIFIED_THRESHOLD)
}

pub fn aggregate_with_threshold(
    analysis: &CombinedAnalysis,
    weights: &ConfidenceWeights,
    threshold: f64,
) -> ConfidenceReport {
    let factors: Vec<FactorScore> = ConfidenceFactor::ALL
        .into_iter()
        .filter_map(|factor| {
            let weight = weights.get(factor)?;
            let score = factor_score(analysis, factor)?;
            Some(FactorScore {
                factor,
                score,
                weight,
            })
        })
        .collect();

    let terms: Vec<(f64, f64)> = factors.iter().map(|f| (f.score, f.weight)).collect();
    let score = combine_weighted(&terms);

    debug!(
        factors = ?factors,
        "[CONFIDENCE] score={:.3} threshold={}",
        score,
        threshold
    );

    ConfidenceReport {
        score,
        verified: score >= threshold,
        explanation: build_explanation(analysis),
        level: ConfidenceLevel::from_score(score),
        factors,
    }
}

fn push_non_empty(lines: &mut Vec<String>, label: &str, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        lines.push(format!("{}: {}", label, text));
    }
}

fn source_label(name: &str, url: &str) -> String {
    match (name.trim().is_empty(), url.trim().is_empty()) {
        (false, false) => format!("{} ({})", name.trim(), url.trim()),
        (false, true) => name.trim().to_string(),
        _ => url.trim().to_string(),
    }
}

/// Explanation lines in fixed method order: fact-check, trust-chain, socratic
pub fn build_explanation(analysis: &CombinedAnalysis) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(fact) = analysis.fact_check() {
        lines.push(format!(
            "Fact check ({}): {}",
            fact.verdict.trim(),
            fact.explanation.trim()
        ));
        if let Some(notes) = &fact.notes {
            push_non_empty(&mut lines, "Notes", notes);
        }
        let sources: Vec<String> = fact
            .sources
            .iter()
            .map(|s| source_label(&s.title, &s.url))
            .filter(|s| !s.is_empty())
            .collect();
        push_non_empty(&mut lines, "Fact check sources", &sources.join(", "));
    }

    if let Some(trust) = analysis.trust_chain() {
        if trust.explanation.trim().is_empty() {
            let summary = if trust.sources.is_empty() {
                "No trust chain found"
            } else {
                "Trust chain verified"
            };
            lines.push(format!("Trust chain: {}", summary));
        } else {
            lines.push(format!("Trust chain: {}", trust.explanation.trim()));
        }
        let sources: Vec<String> = trust
            .sources
            .iter()
            .map(|s| source_label(&s.name, &s.url))
            .filter(|s| !s.is_empty())
            .collect();
        push_non_empty(&mut lines, "Trust chain sources", &sources.join(", "));
        push_non_empty(&mut lines, "Gaps", &trust.gaps.join("; "));
    }

    if let Some(socratic) = analysis.socratic() {
        let c = &socratic.conclusion;
        if c.logical_validity.trim().is_empty() {
            lines.push(format!(
                "Reasoning: {} step(s) examined",
                socratic.reasoning_steps.len()
            ));
        } else {
            lines.push(format!("Reasoning: {}", c.logical_validity.trim()));
        }
        push_non_empty(&mut lines, "Key flaws", &c.key_flaws);
        push_non_empty(&mut lines, "Strengths", &c.strengths);
    }

    if lines.is_empty() {
        return EMPTY_EXPLANATION.to_string();
    }
    lines.join("\n")
}

/// Aggregation with weights and threshold fixed at construction
#[derive(Debug, Clone)]
pub struct ConfidenceEngine {
    weights: ConfidenceWeights,
    threshold: f64,
}

impl Default for ConfidenceEngine {
    fn default() -> Self {
        Self::new(ConfidenceWeights::default(), VERIFIED_THRESHOLD)
    }
}

impl ConfidenceEngine {
    pub fn new(weights: ConfidenceWeights, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    pub fn from_config(config: &ConfidenceConfig) -> Self {
        Self::new(config.weights.clone(), config.verified_threshold)
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn aggregate(&self, analysis: &CombinedAnalysis) -> ConfidenceReport {
        aggregate_with_threshold(analysis, &self.weights, self.threshold)
    }
}
