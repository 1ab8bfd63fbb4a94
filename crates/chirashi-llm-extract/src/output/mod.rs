//! Report formatting and result persistence.
//!
//! This module renders the outcome of a settled batch for consumers:
//!
//! - **Markdown report**: per-field comparison table with agreement rates,
//!   the reconciled record, per-run summaries, and the usage/cost block.
//! - **JSON persistence**: `result.json` (final record, match rates, run
//!   summaries, usage snapshot) and `raw_responses.json` (the verbatim
//!   provider payloads) for audit.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use chirashi_core::{ExtractedRecord, FieldSchema};
use serde::{Deserialize, Serialize};

use crate::batch::BatchOutcome;
use crate::ensemble::{match_rate_against_peers, FieldMatchRate, ReconciledBatch};
use crate::models::VisionModel;
use crate::usage::UsageSnapshot;

/// Summary of one run for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Index of the originating request within the batch.
    pub request_index: usize,
    /// Provider-reported input tokens.
    pub input_tokens: u64,
    /// Provider-reported output tokens.
    pub output_tokens: u64,
    /// Mean agreement with the other runs across all schema fields.
    pub peer_agreement: f64,
    /// The run's normalized record.
    pub record: ExtractedRecord,
}

/// Everything a rendering surface needs from one settled batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// When the batch settled.
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Model used for every call in the batch.
    pub model: VisionModel,
    /// Calls requested.
    pub requested: usize,
    /// Calls that produced a run.
    pub succeeded: usize,
    /// The reconciled consensus record.
    pub final_record: ExtractedRecord,
    /// Per-field agreement rates in schema order.
    pub match_rates: Vec<FieldMatchRate>,
    /// One summary per run, in run-sequence order.
    pub runs: Vec<RunSummary>,
    /// Usage and estimated cost for the batch.
    pub usage: UsageSnapshot,
}

/// Assemble the result document for a settled batch.
#[must_use]
pub fn build_result_document(
    outcome: &BatchOutcome,
    reconciled: &ReconciledBatch,
    schema: &FieldSchema,
    model: VisionModel,
) -> ResultDocument {
    let runs = outcome
        .runs
        .iter()
        .enumerate()
        .map(|(position, run)| {
            let peers: Vec<_> = outcome
                .runs
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != position)
                .map(|(_, peer)| peer.clone())
                .collect();
            let peer_agreement = if schema.is_empty() {
                100.0
            } else {
                schema
                    .iter()
                    .map(|field| match_rate_against_peers(run, &peers, field))
                    .sum::<f64>()
                    / schema.len() as f64
            };
            RunSummary {
                request_index: run.request_index,
                input_tokens: run.input_tokens,
                output_tokens: run.output_tokens,
                peer_agreement,
                record: run.record.clone(),
            }
        })
        .collect();

    ResultDocument {
        generated_at: chrono::Utc::now(),
        model,
        requested: outcome.requested,
        succeeded: outcome.succeeded,
        final_record: reconciled.final_record.clone(),
        match_rates: reconciled.match_rates.clone(),
        runs,
        usage: outcome.usage.snapshot(model),
    }
}

/// Render the result document as a Markdown report.
#[must_use]
pub fn generate_report(doc: &ResultDocument, schema: &FieldSchema) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# 物件情報抽出レポート\n");
    let _ = writeln!(
        md,
        "- 実行日時: {}",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(md, "- モデル: {}", doc.model);
    let _ = writeln!(
        md,
        "- 抽出回数: {} / {} 回成功\n",
        doc.succeeded, doc.requested
    );

    // Comparison table: one row per field, one column per run.
    let _ = writeln!(md, "## 抽出結果の比較\n");
    let mut header = String::from("| 項目 | 一致率 |");
    let mut rule = String::from("|------|--------|");
    for summary in &doc.runs {
        let _ = write!(header, " 抽出 #{} |", summary.request_index + 1);
        rule.push_str("--------|");
    }
    let _ = writeln!(md, "{header}");
    let _ = writeln!(md, "{rule}");

    for rate in &doc.match_rates {
        let _ = write!(md, "| {} | {:.0}% |", rate.field, rate.rate);
        for summary in &doc.runs {
            let _ = write!(md, " {} |", summary.record.normalized(&rate.field));
        }
        md.push('\n');
    }

    // The reconciled record.
    let _ = writeln!(md, "\n## 最終結果\n");
    let _ = writeln!(md, "| 項目 | 値 |");
    let _ = writeln!(md, "|------|----|");
    for field in schema.iter() {
        let _ = writeln!(md, "| {} | {} |", field, doc.final_record.normalized(field));
    }

    // Per-run confidence relative to peers.
    let _ = writeln!(md, "\n## 個別の抽出結果\n");
    for summary in &doc.runs {
        let _ = writeln!(
            md,
            "- 結果 #{}: 平均一致率 {:.0}% ({} 入力 / {} 出力トークン)",
            summary.request_index + 1,
            summary.peer_agreement,
            summary.input_tokens,
            summary.output_tokens
        );
    }

    // Usage block.
    let (input_rate, output_rate) = doc.model.cost_per_million();
    let input_cost = doc.usage.input_tokens as f64 * input_rate / 1_000_000.0;
    let output_cost = doc.usage.output_tokens as f64 * output_rate / 1_000_000.0;
    let _ = writeln!(md, "\n## API使用状況\n");
    let _ = writeln!(md, "- 総リクエスト数: {}回", doc.usage.total_requests);
    let _ = writeln!(
        md,
        "- 入力トークン数: {}トークン (${input_cost:.4})",
        doc.usage.input_tokens
    );
    let _ = writeln!(
        md,
        "- 出力トークン数: {}トークン (${output_cost:.4})",
        doc.usage.output_tokens
    );
    let _ = writeln!(md, "- 総トークン数: {}トークン", doc.usage.total_tokens());
    let _ = writeln!(md, "- 推定総コスト: ${:.4}", doc.usage.estimated_cost_usd);

    md
}

/// Persist the result document and the verbatim provider payloads.
///
/// Creates `result.json` and `raw_responses.json` under `output_dir`.
///
/// # Errors
///
/// Returns an error if directory creation, serialization, or writing fails.
pub fn save_results(doc: &ResultDocument, outcome: &BatchOutcome, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let result_path = output_dir.join("result.json");
    std::fs::write(&result_path, serde_json::to_string_pretty(doc)?)?;

    // Raw bodies are JSON text already; keep them structured where they
    // parse, verbatim strings where they do not.
    let raw: Vec<serde_json::Value> = outcome
        .runs
        .iter()
        .map(|run| {
            serde_json::from_str(&run.raw_response)
                .unwrap_or_else(|_| serde_json::Value::String(run.raw_response.clone()))
        })
        .collect();
    let raw_path = output_dir.join("raw_responses.json");
    std::fs::write(&raw_path, serde_json::to_string_pretty(&raw)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchOutcome;
    use crate::ensemble::reconcile;
    use crate::models::ExtractionRun;
    use crate::usage::UsageAccount;
    use chirashi_core::FieldValue;

    fn sample_outcome() -> (BatchOutcome, FieldSchema) {
        let schema = FieldSchema::new(["家賃", "住所"]).unwrap();
        let mut usage = UsageAccount::new();

        let mut runs = Vec::new();
        for (index, rent) in ["8.5万円", "8.5万円", "8.6万円"].iter().enumerate() {
            let mut record = ExtractedRecord::new();
            record.insert("家賃", FieldValue::scalar(*rent));
            record.insert("住所", FieldValue::scalar("東京都台東区1-2-3"));
            usage.record(1000, 200);
            runs.push(ExtractionRun {
                request_index: index,
                record,
                raw_response: r#"{"ok":true}"#.to_string(),
                input_tokens: 1000,
                output_tokens: 200,
            });
        }

        (
            BatchOutcome {
                runs,
                usage,
                requested: 4,
                succeeded: 3,
            },
            schema,
        )
    }

    #[test]
    fn test_report_contains_comparison_and_usage() {
        let (outcome, schema) = sample_outcome();
        let reconciled = reconcile(&outcome.runs, &schema);
        let doc = build_result_document(&outcome, &reconciled, &schema, VisionModel::Gpt4oMini);
        let report = generate_report(&doc, &schema);

        assert!(report.contains("## 抽出結果の比較"));
        assert!(report.contains("| 家賃 | 67% |"));
        assert!(report.contains("抽出 #1"));
        assert!(report.contains("## API使用状況"));
        assert!(report.contains("- 総リクエスト数: 3回"));
        assert!(report.contains("- 総トークン数: 3600トークン"));
        assert!(report.contains("3 / 4 回成功"));
    }

    #[test]
    fn test_peer_agreement_annotates_each_run() {
        let (outcome, schema) = sample_outcome();
        let reconciled = reconcile(&outcome.runs, &schema);
        let doc = build_result_document(&outcome, &reconciled, &schema, VisionModel::Gpt4oMini);

        // Runs 0 and 1 agree on both fields with one of two peers on 家賃
        // and both peers on 住所: (50 + 100) / 2.
        assert!((doc.runs[0].peer_agreement - 75.0).abs() < 1e-9);
        assert!((doc.runs[1].peer_agreement - 75.0).abs() < 1e-9);
        // Run 2 disagrees on 家賃 with both peers: (0 + 100) / 2.
        assert!((doc.runs[2].peer_agreement - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_results_writes_both_files() {
        let (outcome, schema) = sample_outcome();
        let reconciled = reconcile(&outcome.runs, &schema);
        let doc = build_result_document(&outcome, &reconciled, &schema, VisionModel::Gpt4oMini);

        let dir = tempfile::tempdir().unwrap();
        save_results(&doc, &outcome, dir.path()).unwrap();

        let result_json = std::fs::read_to_string(dir.path().join("result.json")).unwrap();
        let back: ResultDocument = serde_json::from_str(&result_json).unwrap();
        assert_eq!(back.succeeded, 3);
        assert_eq!(back.final_record.normalized("家賃"), "8.5万円");

        let raw_json = std::fs::read_to_string(dir.path().join("raw_responses.json")).unwrap();
        let raw: Vec<serde_json::Value> = serde_json::from_str(&raw_json).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0]["ok"], serde_json::Value::Bool(true));
    }
}
