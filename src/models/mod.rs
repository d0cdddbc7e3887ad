// Truth-Tracer Data Models
// Result shapes for the three analysis methods, the combined view and confidence output

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Score for a `High` source rating label
pub const CREDIBILITY_HIGH: f64 = 1.0;
/// Score for a `Medium` source rating label
pub const CREDIBILITY_MEDIUM: f64 = 0.6;
/// Score for a `Low` source rating label
pub const CREDIBILITY_LOW: f64 = 0.2;
/// Score for an unknown label or a non-finite number
pub const CREDIBILITY_DEFAULT: f64 = 0.5;

// ============ Analysis Methods ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisMethod {
    FactCheck,
    TrustChain,
    Socratic,
}

impl AnalysisMethod {
    /// Fixed method order used for retries and explanations
    pub const ALL: [AnalysisMethod; 3] = [
        AnalysisMethod::FactCheck,
        AnalysisMethod::TrustChain,
        AnalysisMethod::Socratic,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::FactCheck => "factCheck",
            Self::TrustChain => "trustChain",
            Self::Socratic => "socratic",
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodStatus {
    Fulfilled,
    Rejected,
}

// ============ Source Ratings ============

/// Reliability or credibility of a cited source.
///
/// Models answer with a number, a numeric string or a `High`/`Medium`/`Low`
/// label; all are normalized through [`SourceRating::value`]. Numbers above 1
/// and up to 100 are read as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRating {
    Score(f64),
    Label(String),
}

impl SourceRating {
    pub fn value(&self) -> f64 {
        match self {
            Self::Score(v) => normalize_score(*v),
            Self::Label(label) => {
                let label = label.trim().trim_end_matches('%').trim();
                if let Ok(v) = label.parse::<f64>() {
                    return normalize_score(v);
                }
                match label.to_lowercase().as_str() {
                    "high" => CREDIBILITY_HIGH,
                    "medium" => CREDIBILITY_MEDIUM,
                    "low" => CREDIBILITY_LOW,
                    _ => CREDIBILITY_DEFAULT,
                }
            }
        }
    }
}

fn normalize_score(v: f64) -> f64 {
    if !v.is_finite() {
        CREDIBILITY_DEFAULT
    } else if v > 1.0 {
        (v / 100.0).clamp(0.0, 1.0)
    } else {
        v.max(0.0)
    }
}

// ============ Fact Check ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unverifiable,
}

impl Verdict {
    /// Case-insensitive lookup; `None` for anything outside the four verdicts
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "TRUE" => Some(Self::True),
            "FALSE" => Some(Self::False),
            "MISLEADING" => Some(Self::Misleading),
            "UNVERIFIABLE" => Some(Self::Unverifiable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Misleading => "MISLEADING",
            Self::Unverifiable => "UNVERIFIABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<SourceRating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckResult {
    /// Raw verdict text as returned; unrecognized values are kept and scored neutrally
    pub verdict: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub sources: Vec<FactCheckSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============ Trust Chain ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "credibility", skip_serializing_if = "Option::is_none")]
    pub reliability: Option<SourceRating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OriginalSource {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<SourceRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropagationNode {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<SourceRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustChainResult {
    pub has_trust_chain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub sources: Vec<TrustSource>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_source: Option<OriginalSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub propagation_path: Vec<PropagationNode>,
}

// ============ Socratic Reasoning ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStep {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub implications: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SocraticConclusion {
    #[serde(default)]
    pub logical_validity: String,
    #[serde(default)]
    pub key_flaws: String,
    #[serde(default)]
    pub strengths: String,
    #[serde(default)]
    pub recommendations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocraticResult {
    #[serde(default)]
    pub reasoning_steps: Vec<ReasoningStep>,
    pub conclusion: SocraticConclusion,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallacies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

// ============ Outcomes & Combined View ============

/// Result of one adapter run, tagged by the method that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "data", rename_all = "camelCase")]
pub enum AnalysisOutcome {
    FactCheck(FactCheckResult),
    TrustChain(TrustChainResult),
    Socratic(SocraticResult),
    Absent,
}

impl AnalysisOutcome {
    pub fn method(&self) -> Option<AnalysisMethod> {
        match self {
            Self::FactCheck(_) => Some(AnalysisMethod::FactCheck),
            Self::TrustChain(_) => Some(AnalysisMethod::TrustChain),
            Self::Socratic(_) => Some(AnalysisMethod::Socratic),
            Self::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl From<FactCheckResult> for AnalysisOutcome {
    fn from(value: FactCheckResult) -> Self {
        Self::FactCheck(value)
    }
}

impl From<TrustChainResult> for AnalysisOutcome {
    fn from(value: TrustChainResult) -> Self {
        Self::TrustChain(value)
    }
}

impl From<SocraticResult> for AnalysisOutcome {
    fn from(value: SocraticResult) -> Self {
        Self::Socratic(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub fact_check: MethodStatus,
    pub trust_chain: MethodStatus,
    pub socratic: MethodStatus,
    pub timestamp: String,
}

/// Final per-claim result of the orchestrator.
///
/// Built once through [`CombinedAnalysis::assemble`]; the status of every method is
/// derived from whether its data is present, so a `rejected` method can never carry data.
/// Fields are private and there are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedAnalysis {
    fact_check: Option<FactCheckResult>,
    trust_chain: Option<TrustChainResult>,
    socratic: Option<SocraticResult>,
    status: AnalysisStatus,
}

impl CombinedAnalysis {
    /// Place each present outcome into its slot. Later outcomes for the same method win;
    /// `Absent` entries are ignored.
    pub fn assemble<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = AnalysisOutcome>,
    {
        let mut fact_check = None;
        let mut trust_chain = None;
        let mut socratic = None;

        for outcome in outcomes {
            match outcome {
                AnalysisOutcome::FactCheck(r) => fact_check = Some(r),
                AnalysisOutcome::TrustChain(r) => trust_chain = Some(r),
                AnalysisOutcome::Socratic(r) => socratic = Some(r),
                AnalysisOutcome::Absent => {}
            }
        }

        let status = AnalysisStatus {
            fact_check: status_for(fact_check.is_some()),
            trust_chain: status_for(trust_chain.is_some()),
            socratic: status_for(socratic.is_some()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        Self {
            fact_check,
            trust_chain,
            socratic,
            status,
        }
    }

    pub fn fact_check(&self) -> Option<&FactCheckResult> {
        self.fact_check.as_ref()
    }

    pub fn trust_chain(&self) -> Option<&TrustChainResult> {
        self.trust_chain.as_ref()
    }

    pub fn socratic(&self) -> Option<&SocraticResult> {
        self.socratic.as_ref()
    }

    pub fn status(&self) -> &AnalysisStatus {
        &self.status
    }

    pub fn status_of(&self, method: AnalysisMethod) -> MethodStatus {
        match method {
            AnalysisMethod::FactCheck => self.status.fact_check,
            AnalysisMethod::TrustChain => self.status.trust_chain,
            AnalysisMethod::Socratic => self.status.socratic,
        }
    }

    pub fn present_methods(&self) -> Vec<AnalysisMethod> {
        AnalysisMethod::ALL
            .into_iter()
            .filter(|m| self.status_of(*m) == MethodStatus::Fulfilled)
            .collect()
    }
}

fn status_for(present: bool) -> MethodStatus {
    if present {
        MethodStatus::Fulfilled
    } else {
        MethodStatus::Rejected
    }
}

// ============ Token Usage ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

// ============ Confidence ============

/// A term of the confidence weighted mean. The three analysis methods are always
/// available; the two supplementary factors only count when a weight is configured.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceFactor {
    FactCheck,
    TrustChain,
    Socratic,
    SourceReliability,
    EvidenceConsistency,
}

impl ConfidenceFactor {
    pub const ALL: [ConfidenceFactor; 5] = [
        ConfidenceFactor::FactCheck,
        ConfidenceFactor::TrustChain,
        ConfidenceFactor::Socratic,
        ConfidenceFactor::SourceReliability,
        ConfidenceFactor::EvidenceConsistency,
    ];
}

impl From<AnalysisMethod> for ConfidenceFactor {
    fn from(method: AnalysisMethod) -> Self {
        match method {
            AnalysisMethod::FactCheck => Self::FactCheck,
            AnalysisMethod::TrustChain => Self::TrustChain,
            AnalysisMethod::Socratic => Self::Socratic,
        }
    }
}

/// Per-factor weights in `[0, 1]`. They need not sum to 1; aggregation divides by
/// the total weight of the factors that actually produced a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfidenceWeights(BTreeMap<ConfidenceFactor, f64>);

impl<'de> Deserialize<'de> for ConfidenceWeights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<ConfidenceFactor, f64>::deserialize(deserializer)?;
        let mut weights = Self::empty();
        for (factor, weight) in raw {
            weights.set(factor, weight);
        }
        Ok(weights)
    }
}

impl ConfidenceWeights {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, factor: ConfidenceFactor, weight: f64) -> Self {
        self.set(factor, weight);
        self
    }

    /// Store a weight clamped to `[0, 1]`; non-finite values are ignored
    pub fn set(&mut self, factor: ConfidenceFactor, weight: f64) {
        if weight.is_finite() {
            self.0.insert(factor, weight.clamp(0.0, 1.0));
        }
    }

    pub fn get(&self, factor: ConfidenceFactor) -> Option<f64> {
        self.0.get(&factor).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfidenceFactor, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self::empty()
            .with(ConfidenceFactor::FactCheck, 0.4)
            .with(ConfidenceFactor::TrustChain, 0.3)
            .with(ConfidenceFactor::Socratic, 0.3)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.7 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else if score >= 0.3 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScore {
    pub factor: ConfidenceFactor,
    pub score: f64,
    pub weight: f64,
}

/// Read-only view produced by the aggregation engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub score: f64,
    pub verified: bool,
    pub explanation: String,
    pub level: ConfidenceLevel,
    pub factors: Vec<FactorScore>,
}

// ============ Stored Records ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub claim: String,
    pub analysis: CombinedAnalysis,
    pub confidence: ConfidenceReport,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub verified: Option<bool>,
    pub confidence_level: Option<ConfidenceLevel>,
}

impl RecordFilter {
    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if self.start_date.is_some_and(|start| record.created_at < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| record.created_at > end) {
            return false;
        }
        if self
            .verified
            .is_some_and(|verified| record.confidence.verified != verified)
        {
            return false;
        }
        if self
            .confidence_level
            .is_some_and(|level| record.confidence.level != level)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact_check(verdict: &str) -> FactCheckResult {
        FactCheckResult {
            verdict: verdict.to_string(),
            explanation: "checked".to_string(),
            sources: Vec::new(),
            confidence: None,
            notes: None,
        }
    }

    #[test]
    fn test_source_rating_labels_and_scores() {
        assert_eq!(SourceRating::Label("High".into()).value(), 1.0);
        assert_eq!(SourceRating::Label(" medium ".into()).value(), 0.6);
        assert_eq!(SourceRating::Label("LOW".into()).value(), 0.2);
        assert_eq!(SourceRating::Label("questionable".into()).value(), 0.5);
        assert_eq!(SourceRating::Score(-0.2).value(), 0.0);
        assert_eq!(SourceRating::Score(f64::NAN).value(), 0.5);
    }

    #[test]
    fn test_source_rating_numeric_labels_and_percentages() {
        assert_eq!(SourceRating::Label("0.8".into()).value(), 0.8);
        assert_eq!(SourceRating::Label(" 75% ".into()).value(), 0.75);
        assert_eq!(SourceRating::Score(80.0).value(), 0.8);
        assert_eq!(SourceRating::Score(100.0).value(), 1.0);
        assert_eq!(SourceRating::Score(250.0).value(), 1.0);
        assert_eq!(SourceRating::Score(1.0).value(), 1.0);
    }

    #[test]
    fn test_source_rating_deserializes_number_or_label() {
        let parsed: Vec<SourceRating> = serde_json::from_str(r#"[0.8, "High"]"#).unwrap();
        assert_eq!(parsed[0], SourceRating::Score(0.8));
        assert_eq!(parsed[1], SourceRating::Label("High".to_string()));
    }

    #[test]
    fn test_verdict_parse_is_case_insensitive() {
        assert_eq!(Verdict::parse("true"), Some(Verdict::True));
        assert_eq!(Verdict::parse(" Misleading "), Some(Verdict::Misleading));
        assert_eq!(Verdict::parse("PARTLY TRUE"), None);
    }

    #[test]
    fn test_assemble_derives_status_from_presence() {
        let combined = CombinedAnalysis::assemble(vec![
            AnalysisOutcome::from(fact_check("TRUE")),
            AnalysisOutcome::Absent,
        ]);
        assert_eq!(combined.status().fact_check, MethodStatus::Fulfilled);
        assert_eq!(combined.status().trust_chain, MethodStatus::Rejected);
        assert_eq!(combined.status().socratic, MethodStatus::Rejected);
        assert!(combined.trust_chain().is_none());
        assert_eq!(combined.present_methods(), vec![AnalysisMethod::FactCheck]);
    }

    #[test]
    fn test_combined_analysis_serializes_view_shape() {
        let combined = CombinedAnalysis::assemble(Vec::new());
        let json = serde_json::to_value(&combined).unwrap();
        assert!(json["factCheck"].is_null());
        assert!(json["trustChain"].is_null());
        assert!(json["socratic"].is_null());
        assert_eq!(json["status"]["factCheck"], "rejected");
        assert!(json["status"]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_weights_clamp_and_default() {
        let weights = ConfidenceWeights::empty()
            .with(ConfidenceFactor::FactCheck, 1.5)
            .with(ConfidenceFactor::Socratic, f64::NAN);
        assert_eq!(weights.get(ConfidenceFactor::FactCheck), Some(1.0));
        assert_eq!(weights.get(ConfidenceFactor::Socratic), None);

        let parsed: ConfidenceWeights =
            serde_json::from_str(r#"{"factCheck":5.0,"trustChain":-0.9}"#).unwrap();
        assert_eq!(parsed.get(ConfidenceFactor::FactCheck), Some(1.0));
        assert_eq!(parsed.get(ConfidenceFactor::TrustChain), Some(0.0));

        let defaults = ConfidenceWeights::default();
        assert_eq!(defaults.get(ConfidenceFactor::TrustChain), Some(0.3));
        assert_eq!(defaults.get(ConfidenceFactor::SourceReliability), None);
    }

    #[test]
    fn test_confidence_level_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.3), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::VeryLow);
    }
}
