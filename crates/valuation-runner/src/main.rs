//! valuation-runner: value a company from a JSON request file.
//!
//! Usage:
//!   cargo run -p valuation-runner -- demos/acme.json
//!   cargo run -p valuation-runner -- demos/acme.json --no-sensitivity --compact

mod request;

use anyhow::{Context, Result};
use dcf_engine::DcfEngine;
use model_selector::{ModelSelector, SectorTables};
use request::{ValuationReport, ValuationRequest};
use valuation_core::ValuationConfig;
use valuation_orchestrator::{compute_sotp, MultiModelOrchestrator};

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr so stdout carries only the report
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Sector tables from `VALUATION_SECTOR_TABLES` (a JSON file), else built-ins.
fn load_sector_tables() -> Result<SectorTables> {
    match std::env::var("VALUATION_SECTOR_TABLES") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read sector tables from {}", path))?;
            let tables = SectorTables::from_json(&raw)
                .with_context(|| format!("Invalid sector tables in {}", path))?;
            tracing::info!("Loaded {} sector overrides from {}", tables.override_count(), path);
            Ok(tables)
        }
        Err(_) => Ok(SectorTables::default()),
    }
}

fn run(request: ValuationRequest, config: ValuationConfig, tables: SectorTables, sensitivity: bool) -> Result<ValuationReport> {
    let engine = DcfEngine::with_config(config.clone());
    let history = &request.history;

    let assumptions = match request.assumptions {
        Some(a) => a,
        None => {
            let a = engine.compute_default_assumptions(history);
            tracing::info!(
                "Derived assumptions for {}: growth {:.2}%, margin {:.2}%",
                history.ticker,
                a.revenue_growth_rate,
                a.ebitda_margin
            );
            a
        }
    };

    let valuation = engine
        .compute_valuation(history, &assumptions)
        .with_context(|| format!("DCF valuation failed for {}", history.ticker))?;
    tracing::info!(
        "{}: intrinsic value {:.2}/share ({} warnings)",
        history.ticker,
        valuation.intrinsic_value_per_share,
        valuation.warnings.len()
    );

    let sensitivity = if sensitivity {
        Some(engine.compute_sensitivity(history, &assumptions)?)
    } else {
        None
    };

    let selector = ModelSelector::new(tables);
    let (model_recommendation, consensus) = match &request.signal {
        Some(signal) => {
            let recommendation = selector.recommend_model(signal);
            let orchestrator = MultiModelOrchestrator::new(config.clone(), selector);
            let consensus = match orchestrator.compute_multi_model_valuation(
                history,
                signal,
                request.model_preference,
            ) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!("Multi-model valuation failed for {}: {}", history.ticker, e);
                    None
                }
            };
            (Some(recommendation), consensus)
        }
        None => (None, None),
    };

    let sotp = if request.segments.is_empty() {
        None
    } else {
        let shares = valuation.shares_used;
        Some(compute_sotp(&request.segments, valuation.net_debt, shares, &config.models)?)
    };

    Ok(ValuationReport {
        ticker: history.ticker.clone(),
        valuation,
        sensitivity,
        model_recommendation,
        consensus,
        sotp,
    })
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let path = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .context("Usage: valuation-runner <request.json> [--no-sensitivity] [--compact]")?;
    let sensitivity = !args.iter().any(|a| a == "--no-sensitivity");
    let compact = args.iter().any(|a| a == "--compact");

    let config = ValuationConfig::from_env()?;
    let tables = load_sector_tables()?;

    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let request = ValuationRequest::from_json(&raw).with_context(|| format!("Invalid request in {}", path))?;

    let report = run(request, config, tables, sensitivity)?;
    let out = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", out);
    Ok(())
}
