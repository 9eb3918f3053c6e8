use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use photo_label::config::Config;
use photo_label::pipeline::{self, LogReporter};
use photo_label::vision::{GoogleVisionService, LabelService};

#[derive(Parser, Debug)]
#[command(
    name = "photo-label",
    version,
    about = "Tag photos with image-recognition labels stored as IPTC keywords"
)]
struct Cli {
    /// Directory to start scanning for files
    #[arg(value_name = "ROOT_DIRECTORY")]
    root_directory: PathBuf,

    /// More detailed log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level));
    if cli.verbose == 0 {
        logger.format_timestamp(None);
    }
    logger.init();

    if !cli.root_directory.is_dir() {
        anyhow::bail!("Not a directory: {}", cli.root_directory.display());
    }

    let config = Config::load(None)?;
    if config.vision.resolved_api_key().is_empty() {
        anyhow::bail!(
            "No Vision API key configured. Set \"vision.api_key\" in config.json or the {} environment variable.",
            photo_label::config::API_KEY_ENV
        );
    }

    let service = GoogleVisionService::from_config(&config.vision);
    log::info!("Label service: {}", service.name());

    let summary = pipeline::walk_and_tag(&cli.root_directory, &service, &config, &mut LogReporter)
        .await
        .with_context(|| format!("Labeling stopped in {}", cli.root_directory.display()))?;

    log::info!("Done: {} file(s) looked at", summary.total());
    Ok(())
}
