use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_semantic_core::{
    ContentExtractor, ElasticStore, EmbeddingProvider, HashEmbedder, HttpEmbedder,
    JsonFileRecords, LopdfExtractor, PdfPipeline, SearchQuery, PDF_CONTENT_TYPE,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "pdf-semantic", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch base URL
    #[arg(long, default_value = "http://localhost:9200")]
    elasticsearch_url: String,

    /// Index that holds embedded content blocks
    #[arg(long, default_value = "pdf_blocks")]
    index_name: String,

    /// Elasticsearch API key
    #[arg(long, env = "ES_API_KEY")]
    api_key: Option<String>,

    /// Embedding endpoint URL; the local hashing embedder is used when absent
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Bearer token for the embedding endpoint
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// JSON file that persists document metadata records
    #[arg(long, default_value = "records.json")]
    records_path: String,

    /// Caller identity recorded as the document owner
    #[arg(long, default_value = "local")]
    owner: String,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one PDF, or every PDF under a folder, and index its content.
    Upload {
        /// PDF file or folder to scan recursively.
        #[arg(long)]
        path: String,
    },
    /// Semantic search over indexed content blocks.
    Search {
        /// Natural-language query
        #[arg(long)]
        query: String,
        /// Restrict results to one uploaded document.
        #[arg(long)]
        document_id: Option<String>,
        /// Number of hits to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Extract and print content blocks without indexing anything.
    Extract {
        #[arg(long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.embedding_url.clone() {
        Some(url) => {
            let embedder = HttpEmbedder::new(&url, cli.embedding_api_key.clone())?;
            run(cli, embedder).await
        }
        None => run(cli, HashEmbedder::default()).await,
    }
}

async fn run<E: EmbeddingProvider>(cli: Cli, embedder: E) -> anyhow::Result<()> {
    if let Command::Extract { path } = &cli.command {
        let bytes = tokio::fs::read(path).await?;
        let blocks = LopdfExtractor::default().extract(&bytes)?;
        for block in blocks {
            println!(
                "[{} page={} index={}]",
                block.kind, block.page_number, block.block_index
            );
            if let Some(error) = &block.error {
                println!("  error: {error}");
            }
            if !block.content.is_empty() {
                println!("{}", block.content);
            }
        }
        return Ok(());
    }

    let mut index = ElasticStore::new(&cli.elasticsearch_url, &cli.index_name)?;
    if let Some(api_key) = &cli.api_key {
        index = index.with_api_key(api_key);
    }

    let pipeline = PdfPipeline::new(
        LopdfExtractor::default(),
        embedder,
        index,
        JsonFileRecords::new(&cli.records_path),
    );

    match cli.command {
        Command::Upload { path } => {
            let files = discover_pdf_files(Path::new(&path));
            anyhow::ensure!(!files.is_empty(), "no pdf files found under {path}");

            let mut uploaded = 0usize;
            for file in files {
                let file_name = file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("unnamed.pdf")
                    .to_string();
                let bytes = tokio::fs::read(&file).await?;

                match pipeline
                    .ingest(&bytes, PDF_CONTENT_TYPE, &file_name, &cli.owner)
                    .await
                {
                    Ok(record) => {
                        uploaded += 1;
                        println!(
                            "uploaded {} document_id={} blocks={}",
                            file_name, record.document_id, record.block_count
                        );
                    }
                    Err(error) => {
                        warn!(path = %file.display(), %error, "upload failed");
                    }
                }
            }

            info!(uploaded, finished_at = %Utc::now().to_rfc3339(), "upload run complete");
        }
        Command::Search {
            query,
            document_id,
            top_k,
        } => {
            let mut search_query = SearchQuery::new(query).with_top_k(top_k);
            if let Some(document_id) = document_id {
                search_query = search_query.scoped_to(document_id);
            }

            let hits = pipeline.search(&search_query, &cli.owner).await?;

            for hit in hits {
                println!(
                    "score={:.4} document_id={} {} page={} index={}",
                    hit.score, hit.document_id, hit.kind, hit.page_number, hit.block_index
                );
                println!("  {}", hit.content);
            }
        }
        Command::Extract { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn discover_pdf_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}
