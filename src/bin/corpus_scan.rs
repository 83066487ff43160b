use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use doc_chat::ingest::chunker::chunk_text;
use doc_chat::ingest::extractor::extract_text;
use doc_chat::ingest::walker::walk_directory;

/// Dry run of document ingestion: walk a folder, extract and chunk every
/// supported file, and report what the index would contain. Needs no API
/// key — nothing is embedded.
#[derive(Parser, Debug)]
#[command(name = "corpus-scan")]
#[command(about = "Scan a document folder and report extractable chunks")]
struct Args {
    /// Directory to recursively scan
    #[arg(short, long, env = "UPLOAD_DIR")]
    dir: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// Ignore .txt/.md files
    #[arg(long)]
    no_plain_text: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if !args.dir.exists() {
        anyhow::bail!("Directory does not exist: {}", args.dir.display());
    }
    if args.chunk_overlap >= args.chunk_size {
        anyhow::bail!(
            "--chunk-overlap ({}) must be smaller than --chunk-size ({})",
            args.chunk_overlap,
            args.chunk_size
        );
    }

    println!("Scanning directory: {}", args.dir.display());
    let files = walk_directory(&args.dir, !args.no_plain_text);
    println!("Found {} supported files", files.len());

    if files.is_empty() {
        println!("No supported files found. Exiting.");
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut total_chunks = 0usize;
    let mut per_file: Vec<(PathBuf, usize)> = Vec::new();
    let mut failed_files: Vec<(PathBuf, String)> = Vec::new();

    for (path, format) in &files {
        pb.set_message(
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
        );

        match extract_text(path, *format) {
            Ok(text) => {
                let chunks = chunk_text(&text, args.chunk_size, args.chunk_overlap);
                total_chunks += chunks.len();
                per_file.push((path.clone(), chunks.len()));
            }
            Err(e) => failed_files.push((path.clone(), e.to_string())),
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");

    println!("\nScan complete!");
    println!("  Files readable: {}/{}", per_file.len(), files.len());
    println!("  Files failed:   {}", failed_files.len());
    println!("  Total chunks:   {}", total_chunks);

    println!("\nChunks per file:");
    for (path, count) in &per_file {
        println!("  {}: {}", path.display(), count);
    }

    if !failed_files.is_empty() {
        println!("\nFailed files:");
        for (path, err) in &failed_files {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}
