use anyhow::Result;
use clap::Parser;
use gentrisk::{
    config::{log_filter, Settings},
    reference::generate_file,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(name = "generate_reference")]
#[command(about = "Write a synthetic multi-year reference table from the base one")]
struct Args {
    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base reference table (default: <data_dir>/subcounty_reference.json)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output table (default: <data_dir>/subcounty_reference_updated.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// RNG seed (default: configured seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// One independent stream per subcounty, processed in parallel
    #[arg(long)]
    parallel: bool,
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let input = args.input.unwrap_or_else(|| settings.reference_path());
    let output = args.output.unwrap_or_else(|| settings.reference_output_path());
    let seed = args.seed.unwrap_or(settings.seed);

    let generated = generate_file(&input, &output, seed, args.parallel)?;
    for (subcounty, offset) in &generated.offsets {
        info!(%subcounty, offset, "subcounty offset");
    }
    println!("Generated: {}", output.display());
    Ok(())
}
