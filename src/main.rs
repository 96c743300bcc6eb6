mod config;
mod generate;
mod reference;
mod source;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::{BadReferencePolicy, Config};
use generate::RunOptions;
use reference::ReferenceSource;

#[derive(Parser)]
#[command(name = "pcr-ics")]
#[command(version)]
#[command(
    about = "iCalendar generator for Princess Connect! Re:Dive (公主连结Re:Dive) CN server events"
)]
struct Cli {
    /// The reference ics file: a local path, an http(s) URL, or "none"
    #[arg(long)]
    ref_calendar_path: Option<String>,

    /// The ics output path
    #[arg(long)]
    target: Option<PathBuf>,

    /// Config file (defaults to ./pcr-ics.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// What to do when the reference calendar can't be read
    #[arg(long, value_enum)]
    on_bad_reference: Option<BadReferencePolicy>,

    /// Regenerate even if the reference calendar is already at the latest data version
    #[arg(long)]
    force: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let reference =
        ReferenceSource::parse(cli.ref_calendar_path.as_deref().unwrap_or(config.reference.as_str()));
    let target = cli.target.unwrap_or_else(|| config.target.clone());
    let policy = cli.on_bad_reference.unwrap_or(config.on_bad_reference);

    generate::run(RunOptions {
        reference,
        target,
        policy,
        force: cli.force,
        config,
    })
    .await
}

fn init_logging() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {}", e))
}
