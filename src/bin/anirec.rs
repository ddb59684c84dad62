use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anirec::config::{EmbeddingArgs, LlmArgs, PipelineConfig, DEFAULT_TOP_K};
use anirec::logging;
use anirec::{Recommendation, RecommendationPipeline};
use anyhow::{Context, Result};
use clap::Parser;

const GREETING: &str = "Hi! I'm an anime recommender. How can I help you today?";
const FAILURE_NOTICE: &str =
    "Sorry, something went wrong while generating recommendations. Please try again.";

#[derive(Parser, Debug)]
#[command(
    name = "anirec",
    about = "Ask for anime recommendations grounded in the local catalog index"
)]
struct ChatCli {
    /// Answer a single request and exit instead of starting the chat loop
    #[arg(long)]
    query: Option<String>,

    /// Directory holding the vector index built by anirec-build
    #[arg(long, env = "ANIREC_PERSIST_DIR", default_value = "data/gold")]
    persist_dir: PathBuf,

    /// Number of catalog chunks retrieved per request
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Print the catalog chunks each answer was grounded in
    #[arg(long, default_value_t = false)]
    show_sources: bool,

    #[command(flatten)]
    embedding: EmbeddingArgs,

    #[command(flatten)]
    llm: LlmArgs,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = ChatCli::parse();
    logging::init(&cli.log_level);

    let config = PipelineConfig {
        persist_dir: cli.persist_dir.clone(),
        top_k: cli.top_k,
        embedding: cli.embedding.to_config(),
        llm: cli.llm.to_config(),
    };
    let pipeline = RecommendationPipeline::from_config(&config)
        .context("failed to start the recommender")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Some(query) = cli.query.as_deref() {
        let recommendation = pipeline
            .recommend(query)
            .context("failed to generate recommendations")?;
        print_recommendation(&recommendation, cli.show_sources, &mut out)?;
        return Ok(());
    }

    writeln!(out, "{GREETING}")?;
    let stdin = io::stdin();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }
        answer(&pipeline, query, cli.show_sources, &mut out)?;
    }
    Ok(())
}

fn answer(
    pipeline: &RecommendationPipeline,
    query: &str,
    show_sources: bool,
    out: &mut impl Write,
) -> Result<()> {
    match pipeline.recommend(query) {
        Ok(recommendation) => print_recommendation(&recommendation, show_sources, out)?,
        // the facade already logged the cause
        Err(_) => writeln!(out, "{FAILURE_NOTICE}")?,
    }
    Ok(())
}

fn print_recommendation(
    recommendation: &Recommendation,
    show_sources: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "{}\n", recommendation.answer)?;
    if !show_sources {
        return Ok(());
    }
    writeln!(out, "--- Sources ---")?;
    for (i, chunk) in recommendation.sources.iter().enumerate() {
        writeln!(out, "Document {}", i + 1)?;
        writeln!(out, "{}", chunk.text)?;
        writeln!(
            out,
            "(source: {}, row: {})\n",
            chunk.metadata.source, chunk.metadata.row
        )?;
    }
    Ok(())
}
