use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gentrisk::{
    config::{log_filter, Settings},
    features::FEATURES,
    inference,
    input::ModelInput,
    reference::{map_prediction, ReferenceTable},
    report::generate_report,
};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(name = "gentrisk")]
#[command(about = "Score gentrification risk for Nairobi subcounties")]
struct Args {
    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one request with one model
    Predict {
        /// Request JSON file, `-` for stdin
        #[arg(short, long)]
        input: PathBuf,
        /// Model name; defaults to the configured default model
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Score one request with several models
    Compare {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, value_delimiter = ',', required = true)]
        models: Vec<String>,
    },
    /// Score a subcounty from the generated reference table
    Map {
        #[arg(short, long)]
        subcounty: String,
        #[arg(short, long, default_value = "rf")]
        model: String,
        #[arg(short, long)]
        year: Option<i32>,
        /// Reference table; defaults to the generated file in the data dir
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// Score a request and write a text report
    Report {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        subcounty: Option<String>,
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Print the model feature columns
    Features,
}

fn read_input(path: &Path) -> Result<ModelInput> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading request {:?}", path))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing request {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(log_filter())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(d) = args.models_dir {
        settings.models_dir = d;
    }
    if let Some(d) = args.data_dir {
        settings.data_dir = d;
    }
    if let Some(d) = args.reports_dir {
        settings.reports_dir = d;
    }

    match args.command {
        Command::Features => print_json(&serde_json::json!({ "features": FEATURES })),
        Command::Predict { input, model } => {
            let registry = settings.registry();
            let model = model.unwrap_or_else(|| settings.default_model.clone());
            let row = read_input(&input)?.to_feature_row()?;
            let prediction = inference::predict(&registry, &model, &row)?;
            print_json(&prediction)
        }
        Command::Compare { input, models } => {
            let registry = settings.registry();
            let results = inference::compare(&registry, &models, &read_input(&input)?)?;
            print_json(&results)
        }
        Command::Map {
            subcounty,
            model,
            year,
            reference,
        } => {
            let registry = settings.registry();
            let path = reference.unwrap_or_else(|| settings.reference_output_path());
            let table = ReferenceTable::load(&path).with_context(|| {
                format!(
                    "reference file {:?} not found or unreadable; run generate_reference first",
                    path
                )
            })?;
            let prediction = map_prediction(&registry, &table, &subcounty, &model, year)?;
            print_json(&prediction)
        }
        Command::Report {
            input,
            model,
            subcounty,
            year,
        } => {
            let registry = settings.registry();
            let model = model.unwrap_or_else(|| settings.default_model.clone());
            let (report, path) = generate_report(
                &registry,
                &model,
                read_input(&input)?,
                subcounty.as_deref(),
                year,
                &settings.reports_dir,
            )?;
            info!(score = report.score, risk = %report.risk_category, "report ready");
            println!("{}", path.display());
            Ok(())
        }
    }
}
