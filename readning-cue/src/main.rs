//! readning-cue - command-line entry point
//!
//! `generate` runs the pipeline over a text file, either as a whole book or
//! as a single page, and prints the report as JSON. `pages` lists what the
//! page store already holds for a book.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readning_common::config::load_config;
use readning_common::db::init_database;
use readning_cue::analysis::OllamaPhaseDetector;
use readning_cue::config::RuntimeConfig;
use readning_cue::documents::{full_text, load_document};
use readning_cue::generation::{HttpAudioGenerator, LocalArtifactStore};
use readning_cue::store::{BookRecord, PageStore};
use readning_cue::workflow::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "readning-cue")]
#[command(about = "Emotion-aware background music generation for long-form text")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "READNING_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and generated audio
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate audio cues for a text file
    Generate {
        #[arg(long)]
        book_id: String,

        #[arg(long)]
        user: String,

        #[arg(long, default_value = "")]
        title: String,

        /// Plain-text input file
        #[arg(long)]
        input: PathBuf,

        /// Treat the whole input as this single page
        #[arg(long)]
        page: Option<u32>,
    },

    /// List generated pages of a book
    Pages {
        #[arg(long)]
        book_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let runtime = RuntimeConfig::resolve(config, args.root.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| runtime.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting readning-cue {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", runtime.root_folder.display());
    info!("Database: {}", runtime.database_path.display());

    let pool = init_database(&runtime.database_path)
        .await
        .context("Failed to open database")?;
    let store = PageStore::new(pool, runtime.storage.max_lock_wait_ms);

    match args.command {
        Command::Generate {
            book_id,
            user,
            title,
            input,
            page,
        } => {
            let chapters = load_document(&input).await?;
            let text = full_text(&chapters);

            let detector = OllamaPhaseDetector::new(runtime.detector.clone())
                .context("Failed to build phase detector client")?;
            let generator = HttpAudioGenerator::new(&runtime.generator, runtime.generator_request_timeout())
                .context("Failed to build generator client")?;
            let artifacts = LocalArtifactStore::new(&runtime.output_root, &runtime.storage.url_prefix);

            let pipeline = Pipeline::new(
                Arc::new(detector),
                Arc::new(generator),
                store,
                artifacts,
                runtime.pipeline.clone(),
                runtime.generator.clip_duration_secs,
            );

            let book = BookRecord {
                id: book_id,
                user_id: user,
                title,
            };

            let report = match page {
                Some(page) => pipeline.run_unit(&book, page, &text).await?,
                None => pipeline.run_book(&book, &text).await?,
            };

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Pages { book_id } => {
            store.health_check().await.context("Database health check failed")?;
            let pages = store.list_pages(&book_id).await?;
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
    }

    Ok(())
}
