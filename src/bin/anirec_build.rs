use std::path::PathBuf;

use anirec::catalog::CatalogLoader;
use anirec::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use anirec::config::EmbeddingArgs;
use anirec::embedder;
use anirec::index_builder::{IndexBuilder, IndexBuilderConfig, DEFAULT_BATCH_SIZE};
use anirec::logging;
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "anirec-build",
    about = "Clean the anime catalog, embed it and persist the vector index"
)]
struct BuildCli {
    /// Raw catalog CSV with Name, Genres and sypnopsis columns
    #[arg(
        long,
        env = "ANIREC_CATALOG",
        default_value = "data/bronze/anime_with_synopsis.csv"
    )]
    catalog: PathBuf,

    /// Cleaned single-column document table written before indexing
    #[arg(
        long,
        env = "ANIREC_PROCESSED",
        default_value = "data/silver/anime_updated.csv"
    )]
    processed: PathBuf,

    /// Directory that receives the vector index
    #[arg(long, env = "ANIREC_PERSIST_DIR", default_value = "data/gold")]
    persist_dir: PathBuf,

    /// Maximum chunk length in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Max number of chunks to send per embedding request
    #[arg(long, env = "ANIREC_EMBED_BATCH", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = BuildCli::parse();
    logging::init(&cli.log_level);

    let report = CatalogLoader::new(&cli.catalog, &cli.processed)
        .process()
        .with_context(|| format!("failed to process catalog {:?}", cli.catalog))?;
    println!(
        "cleaned {} documents into {} ({} dropped, {} malformed)",
        report.documents,
        report.output.display(),
        report.dropped,
        report.malformed
    );

    let embedder = embedder::from_config(&cli.embedding.to_config())
        .context("failed to configure embedder")?;
    let builder = IndexBuilder::new(
        embedder,
        &IndexBuilderConfig {
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
            batch_size: cli.batch_size,
        },
    )
    .context("invalid chunking settings")?;
    let built = builder
        .build_and_save_vectorstore(&report.output, &cli.persist_dir)
        .with_context(|| format!("failed to build vector index at {:?}", cli.persist_dir))?;
    println!(
        "indexed {} chunks from {} documents ({} dims) into {}",
        built.chunks,
        built.documents,
        built.dimensions,
        built.location.display()
    );
    Ok(())
}
