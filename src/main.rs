use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod app;
mod assistant;
mod cli;
mod config;
mod eid;
mod ingest;
mod providers;
mod registry;
mod semantic;
mod session;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;
use providers::{DocumentExtractor, FileExtractor};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkOutput {
    index: usize,
    words: usize,
    text: String,
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let config = AppFactory::load_config()?;

    match args.command {
        cli::Command::Daemon { addr } => {
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            let app = AppFactory::create_app(&config)?;
            web::start_daemon(app, &addr)
        }

        cli::Command::Chunk {
            file,
            size,
            overlap,
        } => {
            let bytes = std::fs::read(&file)?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let text = FileExtractor.extract_text(&bytes, &filename)?;
            let chunks = semantic::chunk(
                &text,
                size.unwrap_or(config.chunking.chunk_size),
                overlap.unwrap_or(config.chunking.overlap),
            )?;

            let output: Vec<ChunkOutput> = chunks
                .into_iter()
                .enumerate()
                .map(|(index, text)| ChunkOutput {
                    index,
                    words: text.split_whitespace().count(),
                    text,
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }

        cli::Command::Config {} => {
            println!("# {}", config.base_path().join("config.yaml").display());
            print!("{}", serde_yml::to_string(&config)?);
            Ok(())
        }
    }
}
