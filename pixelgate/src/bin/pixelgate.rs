//! Pipeline driver CLI.
//!
//! Exit code contract: 0 iff every stage passed; 1 otherwise, with the
//! first failed stage's reason surfaced in the report.

use anyhow::Context as _;
use clap::Parser;
use pixelgate::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pixelgate", version, about = "Dependency-gated verification pipeline")]
struct Cli {
    /// Path to the pipeline manifest (JSON). Defaults to the built-in
    /// verification pipeline.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory to run stages in.
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// Override the comparison threshold for all regression stages.
    #[arg(long)]
    threshold: Option<u64>,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "pixelgate=warn",
        1 => "pixelgate=info",
        _ => "pixelgate=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let manifest = match &cli.manifest {
        Some(path) => PipelineManifest::from_path(path)
            .with_context(|| format!("loading manifest {}", path.display()))?,
        None => PipelineManifest::default_pipeline(),
    };

    let driver = Driver::new(
        manifest,
        DriverOptions {
            working_dir: cli.working_dir.clone(),
            threshold_override: cli.threshold,
            sink: Arc::new(LoggingEventSink::info()),
        },
    );

    let report = driver.run().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    std::process::exit(report.exit_code());
}
