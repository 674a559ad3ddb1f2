//! CLI entry point for the taxi emissions pipeline.
//!
//! Provides subcommands for cleaning raw trip partitions, enriching them with
//! CO₂ estimates, and reporting on the consolidated views.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use taxi_emissions::config::{EMISSION_FACTORS_FILE, PipelineConfig, parse_cabs, parse_years};
use taxi_emissions::output::print_json;
use taxi_emissions::pipeline::{run_all, run_analysis, run_clean, run_transform};
use taxi_emissions::session::with_session;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "taxi_emissions")]
#[command(about = "Estimate and analyze CO2 emissions of NYC taxi trips", long_about = None)]
struct Cli {
    /// Directory holding raw partitions and derived artifacts
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for JSON summaries
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Year range, e.g. "2015-2024" or "2024"
    #[arg(long, global = true)]
    years: Option<String>,

    /// Comma-separated cab types, e.g. "yellow,green"
    #[arg(long, global = true)]
    cabs: Option<String>,

    /// Emission factor CSV
    #[arg(long, global = true)]
    emissions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter and deduplicate raw partitions
    Clean,
    /// Add CO₂ and time-bucket columns to clean partitions
    Transform,
    /// Report on the enriched views
    Analyze {
        /// Restrict the report to a single year
        #[arg(short, long)]
        year: Option<i32>,

        /// Also log the summaries as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Clean, transform and analyze in one session
    Run {
        /// Restrict the report to a single year
        #[arg(short, long)]
        year: Option<i32>,
    },
}

impl Cli {
    /// Layers command-line overrides on top of the environment config.
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env()?;
        if let Some(dir) = &self.data_dir {
            // The factor table follows the data directory unless set explicitly.
            if config.emission_factors == config.data_dir.join(EMISSION_FACTORS_FILE) {
                config.emission_factors = dir.join(EMISSION_FACTORS_FILE);
            }
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(years) = &self.years {
            config.years = parse_years(years)?;
        }
        if let Some(cabs) = &self.cabs {
            config.cabs = parse_cabs(cabs)?;
        }
        if let Some(path) = &self.emissions {
            config.emission_factors = path.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/taxi_emissions.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("taxi_emissions.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!(
        data_dir = %config.data_dir.display(),
        output_dir = %config.output_dir.display(),
        years = ?config.years,
        cabs = ?config.cabs,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Clean => {
            with_session(config, run_clean)?;
        }
        Commands::Transform => {
            with_session(config, run_transform)?;
        }
        Commands::Analyze { year, json } => {
            let outcome = with_session(config, |s| run_analysis(s, year))?;
            if json {
                print_json(&outcome.summaries)?;
            }
            info!(summaries = outcome.written.len(), "Analysis finished");
        }
        Commands::Run { year } => {
            let (clean, transform, analysis) = with_session(config, |s| run_all(s, year))?;
            info!(
                cleaned = clean.produced.len(),
                transformed = transform.produced.len(),
                summaries = analysis.written.len(),
                "Pipeline finished"
            );
        }
    }

    Ok(())
}
