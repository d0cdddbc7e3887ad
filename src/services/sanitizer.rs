// Response Sanitizer
// Coerces noisy model output into a validated structured value.
// Never fails: every call returns a SanitizationResult with the trail of steps tried.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

/// A response shape the sanitizer can produce
pub trait StructuredResponse: DeserializeOwned + Sized {
    /// Human-readable shape name used in error messages
    const SHAPE: &'static str;

    /// Whether [`StructuredResponse::from_labeled_text`] is implemented for this shape
    const SUPPORTS_LABELED_TEXT: bool = false;

    /// Semantic checks applied after deserialization succeeded
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Parse `LABEL: value` style free text. Only tried after every JSON stage failed.
    fn from_labeled_text(_text: &str) -> Option<Self> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub original_response: String,
    pub steps_tried: Vec<String>,
}

impl<T> SanitizationResult<T> {
    fn succeeded(data: T, original: &str, steps: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            original_response: original.to_string(),
            steps_tried: steps,
        }
    }

    fn failed(error: String, original: &str, steps: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            original_response: original.to_string(),
            steps_tried: steps,
        }
    }

    /// Convert into a `Result`, keeping the steps trail on failure
    pub fn into_result(self) -> Result<T, (String, Vec<String>)> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err((
                self.error
                    .unwrap_or_else(|| "Sanitization produced no data".to_string()),
                self.steps_tried,
            )),
        }
    }
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<think>.*?</think>").expect("think block regex"))
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("fenced block regex"))
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("json object regex"))
}

fn try_parse<T: StructuredResponse>(candidate: &str) -> Result<T, String> {
    let value: T = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

/// Run the fallback pipeline over `raw`, short-circuiting on the first stage that
/// yields a valid `T`:
///
/// 1. direct parse of the trimmed text
/// 2. remove `<think>...</think>` blocks and re-parse
/// 3. each fenced code block, in order of appearance
/// 4. the greedy `{...}` span
/// 5. final trim and parse
/// 6. labeled-text parsing, for shapes that support it
pub fn sanitize<T: StructuredResponse>(raw: &str) -> SanitizationResult<T> {
    let mut steps: Vec<String> = Vec::new();

    // 1
    match try_parse::<T>(raw.trim()) {
        Ok(data) => {
            steps.push("Response was already valid JSON".to_string());
            return SanitizationResult::succeeded(data, raw, steps);
        }
        Err(e) => steps.push(format!("Direct parse failed: {}", e)),
    }

    // 2
    let think_blocks = think_block_re().find_iter(raw).count();
    let cleaned = if think_blocks > 0 {
        let stripped = think_block_re().replace_all(raw, "").into_owned();
        if let Ok(data) = try_parse::<T>(stripped.trim()) {
            steps.push(format!(
                "Removed {} <think> block(s); remaining text is valid JSON",
                think_blocks
            ));
            return SanitizationResult::succeeded(data, raw, steps);
        }
        steps.push(format!("Removed {} <think> block(s)", think_blocks));
        stripped
    } else {
        steps.push("No <think> blocks found".to_string());
        raw.to_string()
    };

    // 3
    let candidates: Vec<&str> = fenced_block_re()
        .captures_iter(&cleaned)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect();
    if candidates.is_empty() {
        steps.push("No fenced code blocks found".to_string());
    } else {
        for (idx, candidate) in candidates.iter().enumerate() {
            if let Ok(data) = try_parse::<T>(candidate) {
                steps.push(format!(
                    "Extracted and validated JSON from code block {}",
                    idx + 1
                ));
                return SanitizationResult::succeeded(data, raw, steps);
            }
        }
        steps.push(format!(
            "Found {} code block(s) but none valid",
            candidates.len()
        ));
    }

    // 4
    match json_object_re().find(&cleaned) {
        Some(m) => match try_parse::<T>(m.as_str()) {
            Ok(data) => {
                steps.push("Extracted valid JSON object from free text".to_string());
                return SanitizationResult::succeeded(data, raw, steps);
            }
            Err(e) => steps.push(format!("Largest {{...}} span did not parse: {}", e)),
        },
        None => steps.push("No {...} span found in free text".to_string()),
    }

    // 5
    let trimmed = cleaned.trim();
    match try_parse::<T>(trimmed) {
        Ok(data) => {
            steps.push("Validated JSON after final trim".to_string());
            return SanitizationResult::succeeded(data, raw, steps);
        }
        Err(_) => steps.push("Final trim parse failed".to_string()),
    }

    // 6
    if T::SUPPORTS_LABELED_TEXT {
        match T::from_labeled_text(trimmed).filter(|d| d.validate().is_ok()) {
            Some(data) => {
                steps.push("Parsed labeled text fields".to_string());
                return SanitizationResult::succeeded(data, raw, steps);
            }
            None => steps.push("Labeled text parse failed".to_string()),
        }
    }

    let error = format!("Unable to sanitize response to valid {} JSON", T::SHAPE);
    debug!(
        shape = T::SHAPE,
        steps = ?steps,
        original_response = raw,
        "[SANITIZER] Response sanitization failed"
    );
    SanitizationResult::failed(error, raw, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Sample {
        verdict: String,
        #[serde(default)]
        score: f64,
    }

    impl StructuredResponse for Sample {
        const SHAPE: &'static str = "sample";

        fn validate(&self) -> Result<(), String> {
            if self.verdict.trim().is_empty() {
                return Err("empty verdict".to_string());
            }
            Ok(())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Labeled {
        verdict: String,
    }

    impl StructuredResponse for Labeled {
        const SHAPE: &'static str = "labeled";
        const SUPPORTS_LABELED_TEXT: bool = true;

        fn from_labeled_text(text: &str) -> Option<Self> {
            text.lines()
                .find_map(|l| l.strip_prefix("VERDICT:"))
                .map(|v| Labeled {
                    verdict: v.trim().to_string(),
                })
        }
    }

    fn position(steps: &[String], prefix: &str) -> usize {
        steps
            .iter()
            .position(|s| s.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing step {prefix:?} in {steps:?}"))
    }

    #[test]
    fn test_already_valid_is_single_step() {
        let raw = r#"  {"verdict":"TRUE","score":0.5}  "#;
        let result = sanitize::<Sample>(raw);
        assert!(result.success);
        assert_eq!(
            result.data,
            Some(Sample {
                verdict: "TRUE".to_string(),
                score: 0.5
            })
        );
        assert_eq!(result.steps_tried, vec!["Response was already valid JSON"]);
        assert_eq!(result.original_response, raw);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_think_block_removed_before_fenced_extraction() {
        let raw = "<think>\nlet me reason {not json}\n</think>\nHere you go:\n```json\n{\"verdict\":\"FALSE\"}\n```";
        let result = sanitize::<Sample>(raw);
        assert!(result.success);
        assert_eq!(result.data.unwrap().verdict, "FALSE");

        let think = position(&result.steps_tried, "Removed 1 <think>");
        let fenced = position(&result.steps_tried, "Extracted and validated JSON from code block");
        assert!(think < fenced);
    }

    #[test]
    fn test_think_only_wrapper_parses_after_removal() {
        let raw = "<THINK>hmm</THINK>{\"verdict\":\"TRUE\"}";
        let result = sanitize::<Sample>(raw);
        assert!(result.success);
        assert!(result.steps_tried[1].contains("remaining text is valid JSON"));
    }

    #[test]
    fn test_first_valid_fenced_block_wins() {
        let raw = "```\nnot json\n```\ntext\n```json\n{\"verdict\":\"MISLEADING\"}\n```\n```json\n{\"verdict\":\"TRUE\"}\n```";
        let result = sanitize::<Sample>(raw);
        assert_eq!(result.data.unwrap().verdict, "MISLEADING");
        assert!(result
            .steps_tried
            .iter()
            .any(|s| s == "Extracted and validated JSON from code block 2"));
    }

    #[test]
    fn test_brace_span_in_free_text() {
        let raw = "Sure! The answer is {\"verdict\": \"TRUE\", \"score\": 1.0} as requested.";
        let result = sanitize::<Sample>(raw);
        assert!(result.success);
        position(&result.steps_tried, "No fenced code blocks found");
        assert_eq!(
            result.steps_tried.last().unwrap(),
            "Extracted valid JSON object from free text"
        );
    }

    #[test]
    fn test_shape_validation_rejects_parsable_json() {
        let result = sanitize::<Sample>(r#"{"verdict":"   "}"#);
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("sample"));
    }

    #[test]
    fn test_total_failure_keeps_full_trail() {
        let result = sanitize::<Sample>("I cannot answer that.");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.steps_tried.len(), 5);
        assert_eq!(result.steps_tried.last().unwrap(), "Final trim parse failed");
        assert!(result.clone().into_result().is_err());
    }

    #[test]
    fn test_labeled_text_is_last_resort() {
        let result = sanitize::<Labeled>("VERDICT: FALSE\nEXPLANATION: nope");
        assert!(result.success);
        assert_eq!(result.data.unwrap().verdict, "FALSE");
        assert_eq!(result.steps_tried.last().unwrap(), "Parsed labeled text fields");

        let failed = sanitize::<Labeled>("nothing useful");
        assert_eq!(failed.steps_tried.last().unwrap(), "Labeled text parse failed");
    }
}
