use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

use crate::config::{Config, get_config_dir};
use crate::embeddings::ollama::OllamaClient;
use crate::engine::RetrievalEngine;
use crate::indexer::{IndexBuilder, IndexingStats};
use crate::store::IndexStore;

/// Options for a single query from the command line
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub max_characters: Option<usize>,
    pub verbose: bool,
}

fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let config_dir = get_config_dir(config_dir)?;
    Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))
}

/// Rebuild the index from the corpus directory and save it, replacing any stored blob
#[inline]
pub fn build_index(config_dir: Option<&Path>) -> Result<IndexingStats> {
    let config = load_config(config_dir)?;
    let corpus_dir = config.corpus_dir();
    let store = IndexStore::new(config.index_path());

    let client = OllamaClient::new(&config.ollama)?;
    client
        .health_check()
        .context("Ollama is not ready; run `context-index config` to check the connection")?;

    println!(
        "Building index from {} with model {}",
        style(corpus_dir.display()).cyan(),
        style(client.model()).cyan()
    );

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );

    let builder = IndexBuilder::new(&client, config.chunking.clone()).with_progress(progress);
    let (snapshot, stats) = builder.build(&corpus_dir)?;
    store.save(&snapshot)?;

    println!("{}", style("✓ Index built").green());
    println!("  Documents found: {}", stats.documents_found);
    println!("  Documents indexed: {}", stats.documents_indexed);
    println!("  Documents skipped: {}", stats.documents_skipped);
    println!("  Fragments: {}", stats.fragments_created);
    if stats.errors_encountered > 0 {
        println!(
            "  {}",
            style(format!("Errors: {}", stats.errors_encountered)).yellow()
        );
    }
    println!("  Saved to: {}", store.path().display());

    Ok(stats)
}

/// Answer `query` from the stored index, building it first when needed
#[inline]
pub fn search(config_dir: Option<&Path>, query: &str, options: &SearchOptions) -> Result<()> {
    let config = load_config(config_dir)?;
    let top_k = options.top_k.unwrap_or(config.retrieval.top_k);
    let max_characters = options
        .max_characters
        .unwrap_or(config.retrieval.max_characters);

    let client = OllamaClient::new(&config.ollama)?;
    let store = IndexStore::new(config.index_path());
    let engine = RetrievalEngine::open(client, &store, &config.corpus_dir(), &config.chunking)?;

    info!(
        "Searching for '{}' (top_k={}, max_characters={})",
        query, top_k, max_characters
    );
    let hits = engine.search_hits(query, top_k, max_characters)?;

    if hits.is_empty() {
        eprintln!(
            "{}",
            style("No fragments fit within the character budget.").yellow()
        );
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        if options.verbose {
            println!(
                "{}",
                style(format!(
                    "#{} {} [fragment {}] distance {:.4}",
                    rank + 1,
                    hit.document,
                    hit.ordinal,
                    hit.distance
                ))
                .dim()
            );
        }
        println!("{}", hit.text);
        println!();
    }

    Ok(())
}

/// Print the state of the stored index and the embedding server
#[inline]
pub fn show_status(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir).unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config::default()
    });

    println!("📊 Context Index Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Corpus: {}", config.corpus_dir().display());
    println!();

    println!("🗄️  Index Status:");
    let store = IndexStore::new(config.index_path());
    println!("   Path: {}", store.path().display());
    match store.load() {
        Ok(snapshot) => {
            println!("   ✅ Loaded");
            println!("   📋 Model: {}", snapshot.model());
            println!("   🧩 Fragments: {}", snapshot.len());
            println!("   📐 Dimension: {}", snapshot.index().dimension());
            println!("   ✂️  Fragment Size: {}", snapshot.fragment_size());
            println!(
                "   🕒 Built: {}",
                snapshot.created_at().format("%Y-%m-%d %H:%M:%S UTC")
            );
            if snapshot.model() != config.ollama.model {
                println!(
                    "   ⚠️  Built with a different model than '{}'; the next search will rebuild it",
                    config.ollama.model
                );
            }
            if snapshot.fragment_size() != config.chunking.fragment_size {
                println!(
                    "   ⚠️  Split at {} characters but {} is configured; the next search will rebuild it",
                    snapshot.fragment_size(),
                    config.chunking.fragment_size
                );
            }
        }
        Err(e) if e.is_rebuildable() => {
            println!("   💤 Not usable, will be rebuilt on next search - {}", e);
        }
        Err(e) => {
            println!("   ❌ {}", e);
        }
    }
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Connected but unhealthy - {}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {}", e);
        }
    }

    Ok(())
}
