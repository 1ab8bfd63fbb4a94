//! # chirashi-llm-extract
//!
//! Ensemble extraction of listing data from real-estate flyer photos.
//!
//! One flyer image is sent to a multimodal model several times; the
//! disagreeing records are reconciled into a single best-guess listing by
//! per-field majority vote, with agreement rates and token cost reported
//! alongside.
//!
//! ## Workflow
//!
//! 1. Load the flyer photo ([`ImagePayload`])
//! 2. Fan out N extraction calls under a concurrency window
//!    ([`batch::run_batch`] with a [`batch::BatchPolicy`])
//! 3. Reconcile the run sequence ([`ensemble::reconcile`])
//! 4. Render or persist the result ([`output`])
//!
//! ## Example
//!
//! ```no_run
//! use chirashi_core::FieldSchema;
//! use chirashi_llm_extract::{
//!     batch::{run_batch, BatchPolicy},
//!     ensemble::reconcile,
//!     models::{openai::OpenAIClient, ImagePayload, VisionModel},
//! };
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let schema = FieldSchema::listing();
//! let image = ImagePayload::from_path(Path::new("flyer.jpg"))?;
//! let client = OpenAIClient::new(std::env::var("OPENAI_API_KEY")?);
//! let model = VisionModel::Gpt4oMini;
//!
//! let policy = BatchPolicy::new(5)?;
//! let outcome = run_batch(
//!     &policy,
//!     |index| client.extract(model, &image, &schema, index),
//!     |progress| println!("{:.0}%", progress.percent()),
//! )
//! .await?;
//!
//! let reconciled = reconcile(&outcome.runs, &schema);
//! println!("家賃: {}", reconciled.final_record.normalized("家賃"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`models`] - image payload, model/pricing catalog, run types, provider client
//! - [`prompt`] - field-enumerating extraction prompt
//! - [`batch`] - wave scheduling, drop-failed policy, progress events
//! - [`ensemble`] - majority-vote reconciliation and agreement rates
//! - [`usage`] - token/cost accounting
//! - [`output`] - Markdown report and JSON persistence

pub mod batch;
pub mod ensemble;
pub mod models;
pub mod output;
pub mod prompt;
pub mod usage;

pub use batch::{run_batch, BatchOutcome, BatchPolicy, BatchProgress};
pub use ensemble::{match_rate_against_peers, reconcile, FieldMatchRate, ReconciledBatch};
pub use models::{openai::OpenAIClient, ExtractionRun, ImageFormat, ImagePayload, VisionModel};
pub use output::{build_result_document, generate_report, save_results, ResultDocument};
pub use usage::{UsageAccount, UsageSnapshot};
