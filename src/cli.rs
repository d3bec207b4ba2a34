use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start lectern as a service.
    Daemon {
        /// Address to listen on. Overrides `listen_addr` from config.yaml
        #[clap(long)]
        addr: Option<String>,
    },

    /// Split a local document into the chunks an upload would index.
    ///
    /// Prints the chunks as JSON. Nothing is embedded or stored.
    Chunk {
        /// A text, markdown or (with the pdf feature) PDF file
        file: PathBuf,

        /// Words per chunk. Defaults to `chunking.chunk_size` from config
        #[clap(long)]
        size: Option<usize>,

        /// Words shared by neighbouring chunks. Defaults to `chunking.overlap`
        #[clap(long)]
        overlap: Option<usize>,
    },

    /// Print the effective configuration.
    Config {},
}
