use anyhow::Result;
use clap::Parser;
use gentrisk::{
    config::{log_filter, Settings},
    model::ModelRegistry,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(name = "inspect_models")]
#[command(about = "List loaded models and the columns they expect")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scan this directory for any `*.json` artifact instead of the
    /// configured model files
    #[arg(long)]
    scan: Option<PathBuf>,
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let registry = match &args.scan {
        Some(dir) => ModelRegistry::discover(dir)?,
        None => Settings::load(args.config.as_deref())?.registry(),
    };

    if registry.is_empty() {
        warn!("no models loaded");
        println!("No models loaded.");
        return Ok(());
    }

    for name in registry.names() {
        let Some(model) = registry.get(name) else {
            continue;
        };
        println!("\n=== {} ===", name);
        println!("kind: {}", model.kind());
        println!(
            "probability output: {}",
            if model.probability_output().is_some() { "yes" } else { "no" }
        );
        match model.expected_columns() {
            Some(cap) => {
                let cols = cap.columns();
                println!("expected columns ({}):", cols.len());
                for c in cols {
                    println!("  {}", c);
                }
            }
            None => println!("expected columns: none declared"),
        }
    }
    Ok(())
}
