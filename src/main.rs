use anyhow::Context;
use clap::{Parser, Subcommand};
use docflow::ingest::{DocumentSource, IngestClient, UploadOptions, UploadOrchestrator};
use docflow::{config, logging};
use futures_util::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docflow",
    version,
    about = "Submit documents for asynchronous ingestion and query the corpus"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload PDF documents; directories are scanned recursively.
    Upload {
        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a question against the ingested corpus.
    Query {
        /// Natural-language question.
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();

    match Cli::parse().command {
        Command::Upload { paths } => run_upload(paths).await,
        Command::Query { text } => run_query(&text).await,
    }
}

async fn run_upload(paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let files = collect_files(&paths)?;
    anyhow::ensure!(
        !files.is_empty(),
        "no PDF documents found under the given paths"
    );
    let documents = try_join_all(files.into_iter().map(read_document)).await?;

    let client = Arc::new(IngestClient::new()?);
    let orchestrator = UploadOrchestrator::new(client, UploadOptions::from_config());

    if documents.len() == 1 {
        let document = documents.into_iter().next().expect("one document");
        orchestrator.submit_single(document).await?;
    } else {
        orchestrator.submit_batch(documents).await?;
    }

    let registry = orchestrator.registry();
    registry.wait_all_terminal().await;

    let mut failed = 0usize;
    for job in registry.snapshot() {
        match &job.last_error {
            Some(error) => {
                failed += 1;
                println!("{}: {} ({error})", job.filename, job.state);
            }
            None => println!("{}: {}", job.filename, job.state),
        }
    }

    let snapshot = orchestrator.metrics_snapshot();
    tracing::info!(
        documents = snapshot.documents_submitted,
        completed = snapshot.documents_completed,
        failed = snapshot.documents_failed,
        status_polls = snapshot.status_polls,
        "Upload finished"
    );
    anyhow::ensure!(failed == 0, "{failed} document(s) failed to ingest");
    Ok(())
}

async fn run_query(text: &str) -> anyhow::Result<()> {
    let client = IngestClient::new()?;
    let answer = client.query(text).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {source}");
        }
    }
    Ok(())
}

fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.with_context(|| format!("failed to scan {}", path.display()))?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

async fn read_document(path: PathBuf) -> anyhow::Result<DocumentSource> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", path.display()))?;
    let content = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(DocumentSource { filename, content })
}
