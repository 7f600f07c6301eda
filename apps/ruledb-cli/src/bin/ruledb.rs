use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ruledb_core::config::Config;
use ruledb_hybrid::{HybridSearchEngine, RetrievalRequest};

#[derive(Parser)]
#[command(name = "ruledb", about = "Index an employee handbook and search it with hybrid retrieval")]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml.
    #[arg(long, global = true, env = "RULEDB_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the collection from a document.
    Index {
        /// Index this .txt/.pdf file instead of `document.base_path`.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Base path without extension; `.txt` is preferred over `.pdf`.
        #[arg(long, conflicts_with = "file")]
        base: Option<PathBuf>,
    },
    /// Search the collection.
    Query {
        text: String,
        #[arg(long = "top-k", short = 'k')]
        top_k: Option<usize>,
        /// Print the tool-call JSON response instead of a listing.
        #[arg(long)]
        json: bool,
    },
    /// Show how many entries the collection holds.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let mut settings = config.settings().context("loading configuration")?;
    if let Command::Index { base: Some(base), .. } = &cli.command {
        settings.document.base_path = base.to_string_lossy().into_owned();
    }
    let engine = HybridSearchEngine::from_settings(settings).await?;

    match cli.command {
        Command::Index { file: Some(file), .. } => {
            let report = engine.index_file(&file).await?;
            info!(chunks = report.written, model = %report.embedding_model, "index finished");
            println!("✅ Indexed {} chunks from {} into '{}'", report.written, report.path.display(), report.collection);
        }
        Command::Index { .. } => match engine.index_configured_document().await? {
            Some(report) => {
                info!(chunks = report.written, model = %report.embedding_model, "index finished");
                println!("✅ Indexed {} chunks from {} into '{}'", report.written, report.path.display(), report.collection)
            }
            None => {
                warn!(base = %engine.document_base().display(), "no document to index");
                println!("ℹ️  No {0}.txt or {0}.pdf found, nothing to index", engine.document_base().display())
            }
        },
        Command::Query { text, top_k, json } => {
            if json {
                let response = engine.tool().call(RetrievalRequest { query: text, top_k }).await;
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                let hits = engine.search(&text, top_k).await?;
                info!(hits = hits.len(), "query finished");
                if hits.is_empty() {
                    println!("No relevant sections found.");
                }
                for hit in hits {
                    println!(
                        "{}. [{} #{}/{}] score={:.4} similarity={:.4}",
                        hit.rank,
                        hit.metadata.source,
                        hit.metadata.chunk_index + 1,
                        hit.metadata.total_chunks,
                        hit.score,
                        hit.similarity
                    );
                    println!("   {}", hit.text.chars().take(200).collect::<String>().replace('\n', " "));
                }
            }
        }
        Command::Status => {
            let count = engine.status().await?;
            println!("Collection '{}' holds {} entries", engine.collection(), count);
        }
    }
    Ok(())
}
