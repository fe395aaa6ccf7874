//! LiftGuard - elevator door-mechanism KPI analytics
//!
//! # Usage
//!
//! ```bash
//! # Analyse a KPI export and print the report as JSON
//! liftguard analyze --input kpis.csv --preset past-3-months --pretty
//!
//! # Serve the JSON API
//! liftguard serve --addr 127.0.0.1:8080
//!
//! # Print the effective threshold table / validate a config file
//! liftguard thresholds
//! liftguard check-config liftguard.toml
//! ```
//!
//! # Environment Variables
//!
//! - `LIFTGUARD_CONFIG`: Path to the TOML config (default: `./liftguard.toml`)
//! - `LIFTGUARD_SERVER_ADDR`: Bind address for `serve`
//! - `LIFTGUARD_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use liftguard::api::create_app;
use liftguard::config::{AnalysisConfig, ConfigError};
use liftguard::normalizer::{load_table, TableFormat};
use liftguard::types::{DatePreset, SeriesGranularity};
use liftguard::{AnalysisSection, AnalysisService, ContextParams};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "liftguard")]
#[command(about = "Elevator door-mechanism KPI analytics")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides LIFTGUARD_CONFIG and ./liftguard.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Analyse a CSV or JSON table and print the report as JSON
    Analyze(AnalyzeArgs),

    /// Serve the JSON API
    Serve {
        /// Override the server address (default: "0.0.0.0:8080")
        #[arg(short, long, env = "LIFTGUARD_SERVER_ADDR")]
        addr: Option<String>,
    },

    /// Print the effective KPI threshold table
    Thresholds,

    /// Validate a config file and report every problem found
    CheckConfig {
        /// Config file to validate
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Input table (.csv or .json)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format when the extension is ambiguous
    #[arg(long)]
    format: Option<TableFormat>,

    /// Restrict to these equipment ids
    #[arg(long = "equipment", value_delimiter = ',')]
    equipment: Vec<String>,

    /// Restrict to these floors
    #[arg(long = "floor", value_delimiter = ',')]
    floors: Vec<String>,

    /// Restrict to these KPIs (raw or canonical names)
    #[arg(long = "kpi", value_delimiter = ',')]
    kpis: Vec<String>,

    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "preset")]
    from: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "preset")]
    to: Option<NaiveDate>,

    /// Relative window ending at the latest reading (e.g. past-month)
    #[arg(long)]
    preset: Option<DatePreset>,

    /// Anomaly sensitivity factor k (0.5-3.0)
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Forecast horizon in days (30-730)
    #[arg(long)]
    horizon: Option<u32>,

    /// KPI weight as kpi=w; repeatable
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,

    /// all, anomalies, health or forecast
    #[arg(long, default_value = "all")]
    section: AnalysisSection,

    /// equipment_floor_kpi or equipment_kpi
    #[arg(long)]
    granularity: Option<SeriesGranularity>,

    /// Invocation date for remaining-life figures (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (kpi, w) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected kpi=weight, got '{raw}'"))?;
    let w: f64 = w
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight '{w}': {e}"))?;
    Ok((kpi.trim().to_string(), w))
}

impl AnalyzeArgs {
    fn context_params(&self) -> ContextParams {
        let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
        ContextParams {
            equipment: non_empty(&self.equipment),
            floors: non_empty(&self.floors),
            kpis: non_empty(&self.kpis),
            from: self.from,
            to: self.to,
            preset: self.preset,
            sensitivity: self.sensitivity,
            horizon_days: self.horizon,
            weights: self.weights.iter().cloned().collect::<BTreeMap<_, _>>(),
            granularity: self.granularity,
            today: self.today,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(AnalysisConfig::load()),
    }
}

async fn run_analyze(config: AnalysisConfig, args: &AnalyzeArgs) -> Result<()> {
    let raw = load_table(&args.input, args.format)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    info!(
        input = %args.input.display(),
        columns = raw.columns.len(),
        rows = raw.rows.len(),
        "Loaded input table"
    );

    let service = AnalysisService::new(config);
    let ctx = service.context(args.context_params());
    let report = service.analyze(raw, ctx, args.section).await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

async fn run_serve(config: AnalysisConfig, addr: Option<String>) -> Result<()> {
    let server_addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let app = create_app(AnalysisService::new(config));

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!("HTTP server listening on {}", server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

fn run_thresholds(config: &AnalysisConfig) {
    let policy = config.threshold_policy();
    let bound = |b: Option<f64>| b.map_or_else(|| "-".to_string(), |v| v.to_string());
    println!("{:<32} {:>8} {:>8}  {}", "KPI", "LOW", "HIGH", "REMEDY");
    for entry in policy.entries() {
        println!(
            "{:<32} {:>8} {:>8}  {}",
            entry.display_name,
            bound(entry.spec.low),
            bound(entry.spec.high),
            entry.remedy
        );
    }
}

fn run_check_config(file: &Path) -> Result<()> {
    match AnalysisConfig::load_from_file(file) {
        Ok(_) => {
            println!("{}: OK", file.display());
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for e in &errors {
                println!("  - {e}");
            }
            anyhow::bail!("{}: {} validation error(s)", file.display(), errors.len())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", file.display())),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    match args.command {
        SubCommand::CheckConfig { file } => run_check_config(&file),
        SubCommand::Thresholds => {
            run_thresholds(&load_config(args.config.as_deref())?);
            Ok(())
        }
        SubCommand::Analyze(analyze) => {
            let config = load_config(args.config.as_deref())?;
            if analyze.from.is_some() != analyze.to.is_some() {
                warn!("Only one of --from/--to given; the other side is open");
            }
            run_analyze(config, &analyze).await
        }
        SubCommand::Serve { addr } => run_serve(load_config(args.config.as_deref())?, addr).await,
    }
}
