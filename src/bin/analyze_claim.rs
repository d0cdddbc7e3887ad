use anyhow::{anyhow, Context};
use serde::Serialize;
use std::path::PathBuf;
use truth_tracer_lib::init_logging;
use truth_tracer_lib::models::{CombinedAnalysis, ConfidenceReport};
use truth_tracer_lib::services::token_monitor::TokenUsageMetrics;
use truth_tracer_lib::services::{AppConfig, ClaimAnalysisService, ConfigStore};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a> {
    id: String,
    claim: &'a str,
    analysis: &'a CombinedAnalysis,
    confidence: &'a ConfidenceReport,
    token_usage: Vec<TokenUsageMetrics>,
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Positional words that are neither a flag nor a flag's value
fn claim_text(args: &[String]) -> String {
    let mut words = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--out" || arg == "--config" {
            skip_next = true;
            continue;
        }
        words.push(arg.as_str());
    }
    words.join(" ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let claim = claim_text(&args);
    if claim.trim().is_empty() {
        eprintln!(
            "Usage:\n  cargo run --bin analyze_claim -- <claim text> [--out <json_path>] [--config <dir>]\n\nNotes:\n  - SONAR_API_KEY and SONAR_API_URL must be set in the environment or config file.\n  - Set TRUTHTRACER_DISABLE_FILE_LOG=1 to log to the console only."
        );
        return Ok(());
    }

    init_logging();

    let out_path = parse_arg_value(&args, "--out");
    let config_dir = parse_arg_value(&args, "--config")
        .map(PathBuf::from)
        .or_else(ConfigStore::default_config_dir);

    let store = config_dir.map(ConfigStore::new);
    let config = AppConfig::resolve(store.as_ref()).map_err(|e| anyhow!(e))?;
    let service = ClaimAnalysisService::from_config(&config)?;

    let record = service.analyze_and_store(&claim).await;

    eprintln!(
        "Score: {:.3} ({:?}, verified={})",
        record.confidence.score, record.confidence.level, record.confidence.verified
    );
    for method in record.analysis.present_methods() {
        eprintln!("  fulfilled: {}", method);
    }

    let output = Output {
        id: record.id.to_string(),
        claim: &record.claim,
        analysis: &record.analysis,
        confidence: &record.confidence,
        token_usage: service.token_monitor().snapshot(),
    };
    let json = serde_json::to_string_pretty(&output).context("serialize output")?;

    match out_path {
        Some(path) => {
            std::fs::write(&path, &json).with_context(|| format!("write {}", path))?;
            eprintln!("Wrote {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
