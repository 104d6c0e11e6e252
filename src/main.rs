use clap::{Parser, Subcommand};
use kb_search::Result;
use kb_search::commands::{rebuild, search, show_config, show_status};

#[derive(Parser)]
#[command(name = "kb-search")]
#[command(about = "Semantic retrieval over git docs, wiki pages, and local documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active configuration
    Config,
    /// Rebuild the vector index for one or all domains
    Rebuild {
        /// Rebuild only this domain
        #[arg(long)]
        domain: Option<String>,
    },
    /// Search the knowledge base and print the retrieved context
    Search {
        /// The query text
        query: String,
        /// Maximum number of chunks to retrieve
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Search only this domain instead of routing by keywords
        #[arg(long)]
        domain: Option<String>,
    },
    /// Show embedding backend health and per-domain index sizes
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config => {
            show_config()?;
        }
        Commands::Rebuild { domain } => {
            rebuild(domain).await?;
        }
        Commands::Search {
            query,
            limit,
            domain,
        } => {
            search(query, limit, domain).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
