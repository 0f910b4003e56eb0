use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyrag::{
    answer::ChatService,
    api,
    chunking::{self, SourceMetadata, SplitOptions},
    config::{self, Config},
    embedding, generation, logging,
    metrics::PipelineMetrics,
    processing::{ChunkBudget, DocumentService, RagApi, RagService, RawDocument},
    retrieval::{QueryClassifier, RetrievalLimits, Retriever},
    store,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "rustyrag",
    version,
    about = "Chunk documents, index them, and answer questions over them"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Print the chunks a file would produce as JSON, without storing anything.
    Split {
        /// Text or Markdown file to split.
        file: PathBuf,
        /// Chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Overlap between adjacent chunks in characters.
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Index every `.txt` and `.md` file under a path for one owner.
    Ingest {
        /// File or directory to walk.
        path: PathBuf,
        /// Owner the documents belong to.
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            logging::init_tracing(false);
            serve().await
        }
        Command::Split {
            file,
            chunk_size,
            chunk_overlap,
        } => {
            logging::init_tracing(true);
            split(&file, chunk_size, chunk_overlap)
        }
        Command::Ingest { path, owner } => {
            logging::init_tracing(true);
            ingest(&path, &owner).await
        }
    }
}

async fn serve() -> Result<()> {
    let config = config::init_config().context("Failed to load configuration")?;
    let service = build_service(config).await?;
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn split(file: &Path, chunk_size: Option<usize>, chunk_overlap: Option<usize>) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let options = SplitOptions {
        chunk_size: chunk_size.unwrap_or(chunking::DEFAULT_CHUNK_SIZE),
        chunk_overlap,
        metadata: SourceMetadata {
            source: file_name(file),
            ..SourceMetadata::default()
        },
        separators: None,
    };
    let chunks = chunking::split_text(&text, &options)?;
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}

async fn ingest(path: &Path, owner: &str) -> Result<()> {
    let config = config::init_config().context("Failed to load configuration")?;
    let service = build_service(config).await?;

    let mut indexed = 0usize;
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let file = entry.path();
        let Some(media_type) = media_type_for(file) else {
            continue;
        };
        let Some(filename) = file_name(file) else {
            continue;
        };
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;

        match service
            .ingest(RawDocument {
                owner_id: owner.to_string(),
                filename,
                text,
                media_type: media_type.to_string(),
            })
            .await
        {
            Ok(outcome) => {
                indexed += 1;
                println!("{}", serde_json::to_string(&outcome)?);
            }
            Err(err) if err.is_input_error() => {
                tracing::warn!(file = %file.display(), error = %err, "Skipping file");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to ingest {}", file.display()));
            }
        }
    }
    tracing::info!(owner, indexed, "Ingestion finished");
    Ok(())
}

/// Wire every pipeline component from the loaded configuration.
async fn build_service(config: &Config) -> Result<RagService> {
    let metrics = Arc::new(PipelineMetrics::new());
    let embedder = embedding::build_embedding_client(config)?;
    let generator = generation::build_generation_client(config)?;
    let store = store::build_vector_store(config)
        .await
        .context("Failed to prepare vector store")?;
    let classifier = match &config.summary_patterns {
        Some(patterns) => QueryClassifier::from_patterns(patterns)?,
        None => QueryClassifier::with_defaults()?,
    };

    let budget = ChunkBudget {
        chunk_size: config.text_splitter_chunk_size,
        chunk_overlap: config.effective_chunk_overlap(),
    };
    let documents = DocumentService::new(embedder.clone(), store.clone(), budget, metrics.clone());
    let retriever = Retriever::new(
        embedder,
        store,
        RetrievalLimits {
            targeted: config.retrieval_targeted_limit,
            summary: config.retrieval_summary_limit,
        },
    );
    let chat = ChatService::new(
        classifier,
        retriever,
        generator,
        config.history_window,
        metrics.clone(),
    );
    Ok(RagService::new(documents, chat, metrics))
}

fn media_type_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "md" | "markdown" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
