use anyhow::Result;
use clap::{Parser, Subcommand};
use context_index::commands::{SearchOptions, build_index, search, show_status};
use context_index::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "context-index")]
#[command(about = "Index a folder of text documents and retrieve the passages closest to a query")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the corpus and the index (default: ~/.context-index)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and indexing settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Rebuild the index from the corpus directory
    Build,
    /// Retrieve the fragments closest to a query
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of fragments to consider
        #[arg(long)]
        top_k: Option<usize>,
        /// Character budget for the returned fragments
        #[arg(long)]
        max_characters: Option<usize>,
        /// Print the source document and distance of each fragment
        #[arg(long, short)]
        verbose: bool,
    },
    /// Show the state of the stored index and the embedding server
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Config { show } => {
            let config_dir = get_config_dir(config_dir)?;
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Build => {
            build_index(config_dir)?;
        }
        Commands::Search {
            query,
            top_k,
            max_characters,
            verbose,
        } => {
            let options = SearchOptions {
                top_k,
                max_characters,
                verbose,
            };
            search(config_dir, &query, &options)?;
        }
        Commands::Status => {
            show_status(config_dir)?;
        }
    }

    Ok(())
}
