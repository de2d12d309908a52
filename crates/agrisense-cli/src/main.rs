use std::fs;
use std::path::{Path, PathBuf};

use agrisense_engine::{AgrisenseEngine, EngineConfig, OperationRequest, OperationResponse};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

#[derive(Debug, Parser)]
#[command(name = "agrisense", version, about = "Crop recommendation, yield and disease diagnosis")]
struct Cli {
    /// JSON Lines event log; stderr when omitted.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, global = true)]
    crop_model: Option<PathBuf>,
    #[arg(long, global = true)]
    yield_model: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Diagnose(DiagnoseArgs),
    Weather(WeatherArgs),
    Recommend(RecommendArgs),
    RecommendLocation(RecommendLocationArgs),
    PredictYield(PredictYieldArgs),
}

#[derive(Debug, Parser)]
struct DiagnoseArgs {
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct WeatherArgs {
    #[arg(long)]
    location: Option<String>,
}

// Numeric fields stay as text so the engine validates them like any other payload.
#[derive(Debug, Parser)]
struct RecommendArgs {
    #[arg(long)]
    temperature: Option<String>,
    #[arg(long)]
    humidity: Option<String>,
    #[arg(long)]
    ph: Option<String>,
    #[arg(long)]
    rainfall: Option<String>,
}

#[derive(Debug, Parser)]
struct RecommendLocationArgs {
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    ph: Option<String>,
}

#[derive(Debug, Parser)]
struct PredictYieldArgs {
    #[arg(long)]
    temperature: Option<String>,
    #[arg(long)]
    humidity: Option<String>,
    #[arg(long)]
    rainfall: Option<String>,
    #[arg(long)]
    crop_type: Option<String>,
    #[arg(long)]
    land_size: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("agrisense error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(path) = cli.events {
        config.events_path = Some(path);
    }
    if let Some(path) = cli.crop_model {
        config.crop_model_path = path;
    }
    if let Some(path) = cli.yield_model {
        config.yield_model_path = path;
    }
    for key in config.missing_keys() {
        eprintln!("agrisense warning: {key} not set; calls that need it will fail");
    }

    let engine = AgrisenseEngine::from_config(&config)?;
    let request = match cli.command {
        Command::Diagnose(args) => OperationRequest::DiagnoseDisease {
            image: read_image(args.image.as_deref())?,
        },
        Command::Weather(args) => OperationRequest::GetWeather {
            location: args.location,
        },
        Command::Recommend(args) => OperationRequest::RecommendCrop {
            payload: text_payload(&[
                ("temperature", args.temperature),
                ("humidity", args.humidity),
                ("ph", args.ph),
                ("rainfall", args.rainfall),
            ]),
        },
        Command::RecommendLocation(args) => OperationRequest::RecommendForLocation {
            payload: text_payload(&[("location", args.location), ("ph", args.ph)]),
        },
        Command::PredictYield(args) => OperationRequest::PredictYield {
            payload: text_payload(&[
                ("temperature", args.temperature),
                ("humidity", args.humidity),
                ("rainfall", args.rainfall),
                ("crop_type", args.crop_type),
                ("land_size", args.land_size),
            ]),
        },
    };

    let response = engine.handle(request);
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(exit_code(&response))
}

fn read_image(path: Option<&Path>) -> Result<Option<Vec<u8>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(Some(bytes))
}

fn text_payload(fields: &[(&str, Option<String>)]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|text| ((*key).to_string(), Value::String(text.clone())))
        })
        .collect()
}

fn exit_code(response: &OperationResponse) -> i32 {
    if response.is_success() {
        0
    } else if response.is_client_error() {
        2
    } else {
        1
    }
}
