// Prompt Templates
// Fixed system instructions, token budgets and model variants for the three analysis methods

use crate::models::AnalysisMethod;
use crate::services::config_store::AnalysisConfig;

/// Quick answers use the lighter model and a smaller budget
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ModelVariant {
    Quick,
    Detailed,
}

impl ModelVariant {
    pub fn max_tokens(&self) -> u32 {
        match self {
            Self::Quick => 500,
            Self::Detailed => 1000,
        }
    }

    pub fn model_name<'a>(&self, config: &'a AnalysisConfig) -> &'a str {
        match self {
            Self::Quick => &config.quick_model,
            Self::Detailed => &config.detailed_model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub method: AnalysisMethod,
    pub system: String,
    pub model: String,
    pub max_tokens: u32,
}

impl PromptTemplate {
    pub fn for_method(method: AnalysisMethod, config: &AnalysisConfig) -> Self {
        let (system, variant) = match method {
            AnalysisMethod::FactCheck => (FACT_CHECK_SYSTEM_PROMPT, ModelVariant::Quick),
            AnalysisMethod::TrustChain => (TRUST_CHAIN_SYSTEM_PROMPT, ModelVariant::Detailed),
            AnalysisMethod::Socratic => (SOCRATIC_SYSTEM_PROMPT, ModelVariant::Detailed),
        };

        Self {
            method,
            system: system.to_string(),
            model: variant.model_name(config).to_string(),
            max_tokens: variant.max_tokens(),
        }
    }
}

const FACT_CHECK_SYSTEM_PROMPT: &str = r#"You are a fact-checking assistant. Verify the user's claim quickly and accurately.

Respond with valid JSON only, with no text outside the JSON object:
{
  "verdict": "TRUE" | "FALSE" | "MISLEADING" | "UNVERIFIABLE",
  "explanation": "Short explanation of the verdict",
  "sources": [
    {"title": "Source title", "url": "Source URL", "reliability": "High" | "Medium" | "Low"}
  ],
  "notes": "Optional extra context"
}

Rules:
1. Give one clear verdict.
2. Keep the explanation brief and factual.
3. Cite at least one reliable source.
4. Use neutral, objective language."#;

const TRUST_CHAIN_SYSTEM_PROMPT: &str = r#"You trace where a claim originated and how it spread.

Respond with valid JSON only, with no text outside the JSON object:
{
  "hasTrustChain": true | false,
  "confidence": number between 0 and 1,
  "sources": [
    {"name": "Source name", "url": "Source URL", "reliability": number between 0 and 1}
  ],
  "explanation": "How the claim travelled from its origin",
  "gaps": ["Weak or missing links in the chain"],
  "context": "Additional context"
}

Rules:
1. Decide whether a verifiable chain of sources exists.
2. Base the confidence on the reliability of the sources.
3. List every relevant source with its reliability.
4. Name the gaps explicitly."#;

const SOCRATIC_SYSTEM_PROMPT: &str = r#"You examine claims through Socratic questioning and critical analysis.

Respond with valid JSON only, with no text outside the JSON object:
{
  "reasoningSteps": [
    {
      "question": "Critical question about the claim",
      "analysis": "Logical analysis of this aspect",
      "evidence": "Supporting or contradicting evidence",
      "implications": "What this reveals about the claim"
    }
  ],
  "conclusion": {
    "logicalValidity": "Assessment of the claim's logical structure",
    "keyFlaws": "Major flaws or gaps",
    "strengths": "Strong aspects of the claim",
    "recommendations": "How the claim could be strengthened"
  }
}

Rules:
1. Question assumptions and evidence.
2. Consider counterarguments.
3. Stay objective."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_use_model_variants() {
        let config = AnalysisConfig::default();

        let fact = PromptTemplate::for_method(AnalysisMethod::FactCheck, &config);
        assert_eq!(fact.model, "sonar");
        assert_eq!(fact.max_tokens, 500);
        assert!(fact.system.contains("\"verdict\""));

        let trust = PromptTemplate::for_method(AnalysisMethod::TrustChain, &config);
        assert_eq!(trust.model, "sonar-pro");
        assert_eq!(trust.max_tokens, 1000);
        assert!(trust.system.contains("hasTrustChain"));

        let socratic = PromptTemplate::for_method(AnalysisMethod::Socratic, &config);
        assert_eq!(socratic.model, "sonar-pro");
        assert!(socratic.system.contains("reasoningSteps"));
    }

    #[test]
    fn test_model_names_follow_config() {
        let config = AnalysisConfig {
            quick_model: "mini".to_string(),
            detailed_model: "large".to_string(),
            ..AnalysisConfig::default()
        };
        assert_eq!(
            PromptTemplate::for_method(AnalysisMethod::FactCheck, &config).model,
            "mini"
        );
        assert_eq!(
            PromptTemplate::for_method(AnalysisMethod::Socratic, &config).model,
            "large"
        );
    }
}
