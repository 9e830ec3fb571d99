use chrono::Utc;
use clap::{Parser, Subcommand};
use medidoc_core::{
    discover_upload_files, load_upload, BatchReport, HttpBlobStore, HttpOcrGateway,
    IngestionPipeline, MemoryRepository, PipelineOptions, SearchEngine, SearchOptions, SearchPage,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medidoc", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Blob storage base URL
    #[arg(long, env = "MEDIDOC_STORAGE_URL", default_value = "http://localhost:10000")]
    storage_url: String,

    /// Blob storage container
    #[arg(long, default_value = "documents")]
    container: String,

    /// Blob storage API key
    #[arg(long, env = "MEDIDOC_STORAGE_KEY")]
    storage_key: Option<String>,

    /// OCR extraction endpoint
    #[arg(long, env = "MEDIDOC_OCR_URL", default_value = "http://localhost:7071/extract")]
    ocr_url: String,

    /// OCR API key
    #[arg(long, env = "MEDIDOC_OCR_KEY")]
    ocr_key: Option<String>,

    /// Concurrency ceiling for batch ingestion.
    #[arg(long, default_value = "4")]
    max_workers: usize,

    /// Owner recorded on ingested documents and used as a search filter.
    #[arg(long)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every supported file under a folder as one batch.
    Ingest {
        /// Folder scanned recursively for documents.
        #[arg(long)]
        folder: String,
    },
    /// Ingest a folder, then rank its documents by patient-name similarity.
    Search {
        /// Patient name or partial name.
        #[arg(long)]
        term: String,
        /// Folder that provides the document corpus.
        #[arg(long)]
        folder: String,
        /// Minimum similarity score to keep.
        #[arg(long)]
        min_similarity: Option<f64>,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        skip: usize,
    },
    /// Ingest a folder, then suggest patient names completing a partial term.
    Suggest {
        #[arg(long)]
        term: String,
        #[arg(long)]
        folder: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Ingest a folder, then list the documents of one patient.
    Patient {
        /// Patient name, matched exactly or by prefix.
        #[arg(long)]
        name: String,
        #[arg(long)]
        folder: String,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        skip: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let storage = HttpBlobStore::new(&cli.storage_url, &cli.container, cli.storage_key.clone())
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let ocr = HttpOcrGateway::new(&cli.ocr_url, cli.ocr_key.clone());
    let options = PipelineOptions {
        max_workers: cli.max_workers,
        ..Default::default()
    };
    let pipeline = IngestionPipeline::new(storage, ocr, MemoryRepository::new(), options);
    let engine = SearchEngine::with_repository(pipeline.repository(), SearchOptions::default());

    info!(started_at = %Utc::now().to_rfc3339(), "medidoc boot");

    match cli.command {
        Command::Ingest { folder } => {
            let report = ingest_folder(&pipeline, &folder, cli.owner.as_deref()).await?;
            print_batch_report(&report);
        }
        Command::Search {
            term,
            folder,
            min_similarity,
            limit,
            skip,
        } => {
            ingest_folder(&pipeline, &folder, cli.owner.as_deref()).await?;
            let page = engine
                .search_patients(&term, cli.owner.as_deref(), min_similarity, limit, skip)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            print_search_page(&page);
        }
        Command::Suggest { term, folder, limit } => {
            ingest_folder(&pipeline, &folder, cli.owner.as_deref()).await?;
            let suggestions = engine
                .suggest_patient_names(&term, cli.owner.as_deref(), limit)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("suggestions for '{term}':");
            for suggestion in suggestions {
                println!(
                    "  {} score={:.4} documents={}",
                    suggestion.name, suggestion.score, suggestion.frequency
                );
            }
        }
        Command::Patient {
            name,
            folder,
            limit,
            skip,
        } => {
            ingest_folder(&pipeline, &folder, cli.owner.as_deref()).await?;
            let page = engine
                .documents_for_patient(&name, cli.owner.as_deref(), limit, skip)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            print_search_page(&page);
        }
    }

    Ok(())
}

async fn ingest_folder<S, O, R>(
    pipeline: &IngestionPipeline<S, O, R>,
    folder: &str,
    owner: Option<&str>,
) -> anyhow::Result<BatchReport>
where
    S: medidoc_core::StorageGateway + Send + Sync + 'static,
    O: medidoc_core::OcrGateway + Send + Sync + 'static,
    R: medidoc_core::DocumentRepository + Send + Sync + 'static,
{
    let files = discover_upload_files(Path::new(folder));
    if files.is_empty() {
        anyhow::bail!("no supported documents found in {folder}");
    }

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        match load_upload(&path) {
            Ok(mut upload) => {
                upload.owner_user_id = owner.map(str::to_string);
                uploads.push(upload);
            }
            Err(error) => warn!(path = %path.display(), %error, "skipping unreadable file"),
        }
    }

    pipeline
        .ingest_batch(uploads)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}

fn print_batch_report(report: &BatchReport) {
    println!(
        "batch {}: {}/{} processed, {} failed, success_rate={:.2}%",
        report.batch_id,
        report.processed_count,
        report.total_files,
        report.failed_count,
        report.success_rate
    );

    for document in &report.documents {
        let patient = document
            .normalized_patient_name()
            .unwrap_or("<sin metadata>");
        println!(
            "  [{}] {} patient={} status={}",
            document.batch_index.unwrap_or_default(),
            document.filename,
            patient,
            document.processing_status.as_str()
        );
    }

    for failure in &report.failures {
        println!(
            "  [{}] {} FAILED: {}",
            failure.batch_index, failure.filename, failure.reason
        );
    }
}

fn print_search_page(page: &SearchPage) {
    println!(
        "query: {} (normalized: {}) total_found={} page={}/{}",
        page.search_term,
        page.normalized_term,
        page.total_found,
        if page.limit == 0 { 0 } else { page.skip / page.limit + 1 },
        page.total_pages
    );

    for item in &page.matches {
        let record = &item.record;
        println!(
            "  [{}] score={:.4} {} expediente={} episodio={} categoria={}",
            item.match_kind.as_str(),
            item.similarity_score,
            record.normalized_patient_name().unwrap_or_default(),
            record
                .medical
                .as_ref()
                .map(|info| info.expediente.as_str())
                .unwrap_or_default(),
            record
                .medical
                .as_ref()
                .map(|info| info.numero_episodio.as_str())
                .unwrap_or_default(),
            record
                .medical
                .as_ref()
                .map(|info| info.categoria.as_str())
                .unwrap_or_default(),
        );
        println!("    document_id={} file={}", record.document_id, record.filename);
    }

    if page.matches.is_empty() {
        println!("  (no matches above the similarity threshold)");
    }
}
