// Shape Validation
// Per-method structural checks applied at the sanitizer boundary,
// plus the labeled-text reader for fact-check answers

use crate::models::{
    FactCheckResult, FactCheckSource, SocraticResult, SourceRating, TrustChainResult,
};
use crate::services::sanitizer::StructuredResponse;
use regex::Regex;
use std::sync::OnceLock;

fn check_score(name: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() => Err(format!("{} is not a finite number", name)),
        _ => Ok(()),
    }
}

fn check_rating(name: &str, rating: Option<&SourceRating>) -> Result<(), String> {
    match rating {
        Some(SourceRating::Score(v)) if !v.is_finite() => {
            Err(format!("{} is not a finite number", name))
        }
        _ => Ok(()),
    }
}

impl StructuredResponse for FactCheckResult {
    const SHAPE: &'static str = "fact-check";
    const SUPPORTS_LABELED_TEXT: bool = true;

    fn validate(&self) -> Result<(), String> {
        if self.verdict.trim().is_empty() {
            return Err("verdict is empty".to_string());
        }
        check_score("confidence", self.confidence)?;
        for source in &self.sources {
            check_rating("source reliability", source.reliability.as_ref())?;
        }
        Ok(())
    }

    fn from_labeled_text(text: &str) -> Option<Self> {
        parse_labeled_fact_check(text)
    }
}

impl StructuredResponse for TrustChainResult {
    const SHAPE: &'static str = "trust-chain";

    fn validate(&self) -> Result<(), String> {
        check_score("confidence", self.confidence)?;
        for source in &self.sources {
            check_rating("source reliability", source.reliability.as_ref())?;
        }
        if let Some(original) = &self.original_source {
            check_rating("original source credibility", original.credibility.as_ref())?;
        }
        Ok(())
    }
}

impl StructuredResponse for SocraticResult {
    const SHAPE: &'static str = "socratic";

    fn validate(&self) -> Result<(), String> {
        check_score("confidence", self.confidence)?;
        let c = &self.conclusion;
        let has_conclusion = [
            &c.logical_validity,
            &c.key_flaws,
            &c.strengths,
            &c.recommendations,
        ]
        .iter()
        .any(|field| !field.trim().is_empty());

        if self.reasoning_steps.is_empty() && !has_conclusion {
            return Err("no reasoning steps and an empty conclusion".to_string());
        }
        Ok(())
    }
}

// ============ Labeled Text ============

#[derive(Debug, Copy, Clone, PartialEq)]
enum Section {
    None,
    Verdict,
    Explanation,
    Sources,
    Notes,
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s)\]>]+").expect("url regex"))
}

fn reliability_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[(high|medium|low)\]").expect("reliability regex"))
}

/// Split `LABEL: rest` when the label is one of the known section headers
fn section_header(line: &str) -> Option<(Section, &str)> {
    let (label, rest) = line.split_once(':')?;
    let section = match label.trim().to_uppercase().as_str() {
        "VERDICT" => Section::Verdict,
        "EXPLANATION" => Section::Explanation,
        "SOURCES" => Section::Sources,
        "NOTES" => Section::Notes,
        _ => return None,
    };
    Some((section, rest.trim()))
}

fn parse_source_line(line: &str) -> Option<FactCheckSource> {
    let line = line
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
        .trim();
    if line.is_empty() {
        return None;
    }

    let url = url_re()
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let reliability = reliability_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| SourceRating::Label(m.as_str().to_string()));

    let mut title = url_re().replace_all(line, "").into_owned();
    title = reliability_re().replace_all(&title, "").into_owned();
    let title = title
        .trim()
        .trim_end_matches(|c: char| c == '-' || c == ':' || c == '(' || c == ')')
        .trim()
        .to_string();

    Some(FactCheckSource {
        title,
        url,
        reliability,
    })
}

fn append(buf: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(text);
}

/// Read a fact-check answer written as labeled lines:
///
/// ```text
/// VERDICT: FALSE
/// EXPLANATION: ...
/// SOURCES:
/// - Title https://example.org [High]
/// NOTES: ...
/// ```
///
/// Continuation lines belong to the most recent label. Returns `None` when no verdict line exists.
fn parse_labeled_fact_check(text: &str) -> Option<FactCheckResult> {
    let mut section = Section::None;
    let mut verdict = String::new();
    let mut explanation = String::new();
    let mut notes = String::new();
    let mut sources = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let content = match section_header(line) {
            Some((next, rest)) => {
                section = next;
                rest
            }
            None => line,
        };

        match section {
            Section::None => {}
            Section::Verdict => append(&mut verdict, content),
            Section::Explanation => append(&mut explanation, content),
            Section::Notes => append(&mut notes, content),
            Section::Sources => sources.extend(parse_source_line(content)),
        }
    }

    let verdict = verdict
        .trim_matches(|c: char| c == '*' || c == '"' || c.is_whitespace())
        .to_uppercase();
    if verdict.is_empty() {
        return None;
    }

    Some(FactCheckResult {
        verdict,
        explanation,
        sources,
        confidence: None,
        notes: (!notes.is_empty()).then_some(notes),
    })
}
