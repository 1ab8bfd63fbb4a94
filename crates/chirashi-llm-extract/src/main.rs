//! Flyer extraction CLI
//!
//! Run an ensemble of vision-model extractions against one real-estate
//! flyer photo and print the reconciled listing with agreement rates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use chirashi_core::FieldSchema;
use chirashi_llm_extract::{
    batch::{run_batch, BatchPolicy},
    ensemble::reconcile,
    models::{openai::OpenAIClient, ImagePayload, VisionModel},
    output,
};

#[derive(Parser)]
#[command(name = "chirashi")]
#[command(about = "Ensemble LLM extraction for real-estate flyer photos")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract listing data from a flyer photo
    Extract {
        /// Path to the flyer image (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,

        /// Number of extraction calls to issue (1-10)
        #[arg(short, long, default_value = "5")]
        requests: usize,

        /// Maximum concurrently in-flight calls
        #[arg(short, long, default_value = "5")]
        concurrency: usize,

        /// Vision model to use
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: VisionModel,

        /// Directory to write result.json and raw_responses.json into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a cost estimate without calling the provider
    Estimate {
        /// Number of extraction calls to estimate for (1-10)
        #[arg(short, long, default_value = "5")]
        requests: usize,

        /// Vision model to price
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: VisionModel,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "chirashi_llm_extract=info"
                    .parse()
                    .expect("directive is compile-time constant"),
            ),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Extract {
            image,
            requests,
            concurrency,
            model,
            output,
        } => {
            extract(&image, requests, concurrency, model, output.as_deref()).await?;
        }
        Command::Estimate { requests, model } => {
            estimate(requests, model)?;
        }
    }

    Ok(())
}

async fn extract(
    image_path: &std::path::Path,
    requests: usize,
    concurrency: usize,
    model: VisionModel,
    output_dir: Option<&std::path::Path>,
) -> Result<()> {
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set. Run: source .env")?;

    let image = ImagePayload::from_path(image_path)
        .with_context(|| format!("failed to load image {}", image_path.display()))?;
    info!(
        image = %image_path.display(),
        bytes = image.size(),
        %model,
        "loaded flyer image"
    );

    let schema = FieldSchema::listing();
    let policy = BatchPolicy::new(requests)?.with_max_concurrency(concurrency)?;
    let client = OpenAIClient::new(api_key);

    let outcome = run_batch(
        &policy,
        |index| client.extract(model, &image, &schema, index),
        |progress| info!("progress: {:.0}%", progress.percent()),
    )
    .await?;

    if outcome.is_partial() {
        warn!(
            "{} of {} calls succeeded; reconciling the available runs",
            outcome.succeeded, outcome.requested
        );
    }

    let reconciled = reconcile(&outcome.runs, &schema);
    let doc = output::build_result_document(&outcome, &reconciled, &schema, model);

    println!("{}", output::generate_report(&doc, &schema));

    if let Some(dir) = output_dir {
        output::save_results(&doc, &outcome, dir)?;
        info!("saved results to {}", dir.display());
    }

    Ok(())
}

// Rough per-call token shape for a flyer photo: the image dominates input,
// the listing JSON dominates output.
const TYPICAL_INPUT_TOKENS: u64 = 1500;
const TYPICAL_OUTPUT_TOKENS: u64 = 600;

fn estimate(requests: usize, model: VisionModel) -> Result<()> {
    // Validate the bound the same way a real batch would.
    let policy = BatchPolicy::new(requests)?;
    let per_call = model.calculate_cost(TYPICAL_INPUT_TOKENS, TYPICAL_OUTPUT_TOKENS);
    let total = per_call * policy.request_count() as f64;

    println!("コスト見積もり ({model}):\n");
    println!("| リクエスト回数 | 1回あたり | 合計 |");
    println!("|----------------|-----------|------|");
    println!(
        "| {} | ${per_call:.4} | ${total:.4} |",
        policy.request_count()
    );
    println!(
        "\n想定トークン数/回: 入力 {TYPICAL_INPUT_TOKENS}, 出力 {TYPICAL_OUTPUT_TOKENS}"
    );

    Ok(())
}
