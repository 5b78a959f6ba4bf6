//! AgroVision CLI
//!
//! Diagnose a leaf photo with the local classifier or the remote service,
//! optionally enriched with field sensor readings.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use agro_core::cli::{load_json_file, setup_cli_logging};
use agro_core::{
    AppConfig, DiagnosisResult, FusionEngine, HealthStatus, ProviderKind, SensorSnapshot, KNOWLEDGE_BASE,
};
use agro_inference::{backend, DiagnosisPipeline, ProbeReport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "agrovision.toml";

/// AgroVision plant leaf diagnosis
#[derive(Parser, Debug)]
#[command(name = "agrovision")]
#[command(version)]
#[command(about = "Plant leaf diagnosis with sensor fusion", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diagnose a leaf image
    Analyze {
        /// Image file or `data:` URI
        image: String,

        /// JSON file with a sensor snapshot
        #[arg(long, value_name = "FILE", conflicts_with = "temperature")]
        sensors: Option<PathBuf>,

        /// Air temperature in °C
        #[arg(long, requires_all = ["humidity", "soil_moisture", "light_level"])]
        temperature: Option<f32>,

        /// Relative humidity in percent
        #[arg(long, requires = "temperature")]
        humidity: Option<f32>,

        /// Soil moisture in percent
        #[arg(long, requires = "temperature")]
        soil_moisture: Option<f32>,

        /// Light level in lux
        #[arg(long, requires = "temperature")]
        light_level: Option<f32>,

        /// Override the configured provider (local or remote)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Print the diagnosis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether the configured provider is ready
    Probe {
        /// Override the configured provider (local or remote)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the knowledge base classes
    Classes,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_cli_logging(cli.verbose)?;

    match cli.command {
        Commands::Analyze {
            image,
            sensors,
            temperature,
            humidity,
            soil_moisture,
            light_level,
            provider,
            json,
        } => {
            let config = load_config(cli.config.as_deref(), provider)?;
            let sensors = match (sensors, temperature, humidity, soil_moisture, light_level) {
                (Some(path), ..) => Some(
                    load_json_file::<SensorSnapshot>(&path)
                        .with_context(|| format!("Failed to load sensors from {}", path.display()))?,
                ),
                (None, Some(t), Some(h), Some(s), Some(l)) => Some(SensorSnapshot::new(t, h, s, l)),
                _ => None,
            };
            run_analyze(&config, &image, sensors.as_ref(), json).await
        }
        Commands::Probe { provider, json } => {
            let config = load_config(cli.config.as_deref(), provider)?;
            run_probe(&config, json).await
        }
        Commands::Classes => {
            run_classes();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Explicit file, then `./agrovision.toml`, then defaults; env and flags override
fn load_config(path: Option<&Path>, provider: Option<ProviderKind>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => AppConfig::load(Path::new(DEFAULT_CONFIG_FILE))?,
        None => AppConfig::default(),
    };

    config.apply_env()?;
    if let Some(provider) = provider {
        config.provider = provider;
    }
    config.validate()?;

    debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn run_analyze(
    config: &AppConfig,
    image: &str,
    sensors: Option<&SensorSnapshot>,
    json: bool,
) -> Result<ExitCode> {
    let pipeline = DiagnosisPipeline::from_config(config)?;

    if !json {
        print_probe(&pipeline.probe().await);
        if config.provider == ProviderKind::Local {
            println!("  🖥️  Backend:  {}", backend::backend_name());
        }
        println!();
    }

    info!("Running analysis");
    let result = pipeline.analyze_input(image, sensors).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if let Some(sensors) = sensors {
            print_sensors(config, sensors);
        }
        print_diagnosis(&result);
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_probe(config: &AppConfig, json: bool) -> Result<ExitCode> {
    let pipeline = DiagnosisPipeline::from_config(config)?;
    let report = pipeline.probe().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_probe(&report);
    }

    Ok(if report.available {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_classes() {
    println!("{}", "Knowledge Base:".cyan().bold());
    for (index, entry) in KNOWLEDGE_BASE.iter().enumerate() {
        let status = match entry.status {
            HealthStatus::Healthy => "healthy ".green(),
            HealthStatus::Diseased => "diseased".red(),
            HealthStatus::Uncertain => "unknown ".yellow(),
        };
        println!("  {:>2}  {}  {:<28} {}", index, status, entry.name, entry.label.dimmed());
    }
}

fn print_probe(report: &ProbeReport) {
    println!("{}", "Provider:".cyan().bold());
    println!("  🔌 Provider: {}", report.provider);
    if let Some(location) = &report.location {
        println!("  📍 Looking at: {}", location);
    }
    if report.available {
        println!("  {} {}", "✅".green(), "Ready".green());
    } else {
        println!("  {} {}", "⚠️".yellow(), "Not available, results will be degraded".yellow());
    }
}

fn print_sensors(config: &AppConfig, sensors: &SensorSnapshot) {
    println!("{}", "Sensors:".cyan().bold());
    println!(
        "  🌡️  {:.1} °C   💧 {:.0}%   🌱 {:.0}%   ☀️  {:.0} lux",
        sensors.temperature, sensors.humidity, sensors.soil_moisture, sensors.light_level
    );

    let alerts = FusionEngine::new(config.fusion).alerts(sensors);
    if !alerts.is_empty() {
        let names: Vec<String> = alerts.iter().map(|a| format!("{a:?}")).collect();
        println!("  {} {}", "Alerts:".yellow(), names.join(", "));
    }
    println!();
}

fn print_diagnosis(result: &DiagnosisResult) {
    let status = match result.status {
        HealthStatus::Healthy => result.status.to_string().green().bold(),
        HealthStatus::Diseased => result.status.to_string().red().bold(),
        HealthStatus::Uncertain => result.status.to_string().yellow().bold(),
    };

    println!("{}", "Diagnosis:".cyan().bold());
    println!("  {} {} ({}% confidence)", status, result.disease_name.bold(), result.confidence);
    println!("  {}", result.description);

    if !result.recommendations.is_empty() {
        println!();
        println!("{}", "Recommendations:".cyan().bold());
        for recommendation in &result.recommendations {
            println!("  - {}", recommendation);
        }
    }

    println!();
    println!("  {}", result.timestamp.dimmed());
}
