use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::error;
use tracing_subscriber::EnvFilter;

use config::{Config, ConfigError};
use embeddings::{Catalog, OpenAiEmbedding, QueryEmbedding};
use loader::FailurePolicy;
use store::PgExecutor;

mod config;
mod embeddings;
mod loader;
mod models;
mod search;
mod store;
#[cfg(test)]
mod testing;
mod vector_literal;

#[derive(Parser)]
#[command(name = "article-search")]
#[command(about = "Load article embeddings into pgvector and search them by similarity")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert every *.json article document in a directory
    Load {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Continue past failed writes and report them at the end
        #[arg(long)]
        keep_going: bool,
    },
    /// Print the articles closest to a query embedding
    Query {
        /// Embed this text with the OpenAI API instead of using the catalog
        #[arg(long, conflicts_with = "entry")]
        text: Option<String>,
        /// Index into the precomputed embedding catalog
        #[arg(long, default_value_t = 0)]
        entry: usize,
        #[arg(long, default_value = "assets/feelings.json")]
        catalog: PathBuf,
        #[arg(long, default_value_t = search::DEFAULT_LIMIT)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    match cli.command {
        Commands::Load {
            data_dir,
            keep_going,
        } => {
            let config = Config::from_env(false)?;
            let policy = if keep_going {
                FailurePolicy::KeepGoing
            } else {
                FailurePolicy::Abort
            };

            let pool = store::create_connection_pool(&config).await?;
            let executor = PgExecutor::new(pool);

            let report = loader::load_articles(&executor, &config, &data_dir, policy).await?;

            report.finish()?;
        }
        Commands::Query {
            text,
            entry,
            catalog,
            limit,
        } => {
            let config = Config::from_env(true)?;

            let source = match text {
                Some(text) => {
                    let api_key = config
                        .openai_api_key
                        .clone()
                        .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
                    QueryEmbedding::Generated {
                        client: OpenAiEmbedding::new(api_key),
                        text,
                    }
                }
                None => QueryEmbedding::Precomputed {
                    catalog: Catalog::from_file(&catalog)?,
                    index: entry,
                },
            };

            let embedding = source.resolve().await?;

            let pool = store::create_connection_pool(&config).await?;
            let executor = PgExecutor::new(pool);

            let rows = search::search_similar(&executor, &config, &embedding, limit).await?;

            search::print_rows(&rows, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}
