mod render;
mod shell;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use viewer_core::browse::{BrowseRequest, DEFAULT_BROWSE_LIMIT, MAX_BROWSE_OFFSET, execute_browse};
use viewer_core::connector::{ConnectionTarget, Connector, DEFAULT_HOST, DEFAULT_PORT};
use viewer_core::embedding::OllamaClient;
use viewer_core::http_client::{DEFAULT_DATABASE, DEFAULT_TENANT};
use viewer_core::inspect::{find_collection, inspect};
use viewer_core::query::{DEFAULT_QUERY_RESULTS, QueryRequest, execute_query};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

// --- Configuration using once_cell::sync::Lazy ---
static OLLAMA_URL: Lazy<String> =
    Lazy::new(|| env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()));
static EMBEDDING_MODEL: Lazy<String> = Lazy::new(|| {
    env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string())
});

#[derive(Parser, Debug)]
#[clap(author, version, about = "View Chroma DB collections", long_about = None)]
struct Cli {
    /// ChromaDB host (for Docker/server mode)
    #[clap(long, global = true, default_value = DEFAULT_HOST)]
    host: String,
    /// ChromaDB port (for Docker/server mode)
    #[clap(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Local ChromaDB path (for persistent mode); takes precedence over host and port
    #[clap(long, global = true)]
    path: Option<PathBuf>,
    /// Tenant on the ChromaDB server
    #[clap(long, global = true, default_value = DEFAULT_TENANT)]
    tenant: String,
    /// Database on the ChromaDB server
    #[clap(long, global = true, default_value = DEFAULT_DATABASE)]
    database: String,
    /// Ollama endpoint used to embed query text [env: OLLAMA_URL]
    #[clap(long, global = true)]
    ollama_url: Option<String>,
    /// Ollama embedding model [env: EMBEDDING_MODEL]
    #[clap(long, global = true)]
    embedding_model: Option<String>,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every collection with its contents (default)
    List,
    /// Show a page of a collection's items
    Browse {
        /// Collection name
        collection: String,
        /// Items to show
        #[clap(short, long, default_value_t = DEFAULT_BROWSE_LIMIT as u64,
               value_parser = clap::value_parser!(u64).range(1..=100))]
        limit: u64,
        /// Start from item
        #[clap(short, long, default_value_t = 0,
               value_parser = clap::value_parser!(u64).range(0..=MAX_BROWSE_OFFSET as u64))]
        offset: u64,
    },
    /// Run a similarity search against a collection
    Query {
        /// Collection name
        collection: String,
        /// Search text
        text: String,
        /// Number of results
        #[clap(short = 'n', long, default_value_t = DEFAULT_QUERY_RESULTS as u64,
               value_parser = clap::value_parser!(u64).range(1..=50))]
        n_results: u64,
        /// Leave distances out of the results
        #[clap(long)]
        no_distances: bool,
        /// Metadata filter (JSON format, e.g. {"category": "science"})
        #[clap(long = "where")]
        where_filter: Option<String>,
        /// Document content filter (e.g. {"$contains": "keyword"})
        #[clap(long)]
        where_document: Option<String>,
    },
    /// Interactive shell
    Shell,
}

async fn run(store: &Connector<OllamaClient>, command: Commands) -> Result<(), String> {
    match command {
        Commands::List => {
            let listing = inspect(store).await.map_err(|e| e.to_string())?;
            print!("{}", render::render_listing(&listing));
        }
        Commands::Browse {
            collection,
            limit,
            offset,
        } => {
            let collection = find_collection(store, &collection)
                .await
                .map_err(|e| e.to_string())?;
            let request = BrowseRequest::new(limit as usize, offset as usize);
            let outcome = execute_browse(store, &collection, &request)
                .await
                .map_err(|e| render::render_browse_error(&e))?;
            print!("{}", render::render_browse(&outcome));
        }
        Commands::Query {
            collection,
            text,
            n_results,
            no_distances,
            where_filter,
            where_document,
        } => {
            let collection = find_collection(store, &collection)
                .await
                .map_err(|e| e.to_string())?;
            let request = QueryRequest {
                text,
                n_results: n_results as usize,
                include_distances: !no_distances,
                where_filter: where_filter.unwrap_or_default(),
                where_document: where_document.unwrap_or_default(),
            };
            let report = execute_query(store, &collection, &request)
                .await
                .map_err(|e| render::render_query_error(&e))?;
            print!("{}", render::render_query(&report));
        }
        Commands::Shell => {
            shell::run_shell(store).await.map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with rendered tables
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "chroma_viewer=info,viewer_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(".env file loaded from: {:?}", path),
        Err(_) => tracing::debug!("No .env file loaded; using the process environment"),
    }

    let cli = Cli::parse();
    let target = ConnectionTarget::from_args(&cli.host, cli.port, cli.path.clone())
        .with_namespace(&cli.tenant, &cli.database);
    let embedder = OllamaClient::new(
        cli.ollama_url.unwrap_or_else(|| OLLAMA_URL.clone()),
        cli.embedding_model.unwrap_or_else(|| EMBEDDING_MODEL.clone()),
    );

    println!("### {}", target);
    let store = match Connector::connect(&target, embedder).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", render::render_connection_error(&target, &e));
            return ExitCode::FAILURE;
        }
    };

    match run(&store, cli.command.unwrap_or(Commands::List)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            let message = if message.starts_with("error:") {
                message
            } else {
                format!("error: {message}")
            };
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_remote_localhost() {
        let cli = Cli::try_parse_from(["chroma-viewer"]).unwrap();
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 8000);
        assert!(cli.path.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "chroma-viewer",
            "query",
            "articles",
            "borrow checker",
            "-n",
            "12",
            "--no-distances",
            "--where",
            r#"{"topic": "rust"}"#,
            "--path",
            "/data/chroma",
        ])
        .unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("/data/chroma")));
        match cli.command {
            Some(Commands::Query {
                n_results,
                no_distances,
                where_filter,
                where_document,
                ..
            }) => {
                assert_eq!(n_results, 12);
                assert!(no_distances);
                assert_eq!(where_filter.as_deref(), Some(r#"{"topic": "rust"}"#));
                assert!(where_document.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        assert!(Cli::try_parse_from(["chroma-viewer", "query", "c", "t", "-n", "51"]).is_err());
        assert!(Cli::try_parse_from(["chroma-viewer", "browse", "c", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["chroma-viewer", "browse", "c", "--limit", "100"]).is_ok());
        assert!(
            Cli::try_parse_from(["chroma-viewer", "browse", "c", "--offset", "9223372036854775808"])
                .is_err()
        );
    }
}
