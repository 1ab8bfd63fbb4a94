//! Ensemble reconciliation for repeated extractions.
//!
//! Given N runs over the same flyer image, this module synthesizes one
//! consensus record by per-field majority vote and reports how strongly the
//! runs agree on each field.
//!
//! ## Algorithm
//!
//! For every field in the schema:
//!
//! 1. Collect each run's value in run order, normalized to its comparison
//!    form (lists comma-joined, missing values as the no-information
//!    sentinel).
//! 2. Count occurrences of each distinct normalized value.
//! 3. The value(s) with the maximum count are candidates. Ties are broken
//!    in order: prefer candidates that are not the sentinel, then prefer
//!    the longer string (more detailed), then prefer the value that
//!    appeared earliest in the run sequence.
//! 4. The field's agreement rate is `matching runs / total runs × 100`.
//!
//! A run that failed outright never reaches this module and contributes
//! zero votes to every field; a run that succeeded but holds the sentinel
//! contributes one "no information" vote. The two are deliberately kept
//! distinct.
//!
//! The computation is pure: identical run sequences always yield identical
//! results.

use chirashi_core::{ExtractedRecord, FieldSchema, FieldValue, NO_INFORMATION};
use serde::{Deserialize, Serialize};

use crate::models::ExtractionRun;

/// Agreement statistics for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatchRate {
    /// Field name.
    pub field: String,
    /// The reconciled value in normalized (comparison) form.
    pub value: String,
    /// Percentage of runs agreeing with the reconciled value, in `[0,100]`.
    pub rate: f64,
}

/// Consensus record plus per-field agreement rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledBatch {
    /// The synthesized majority-vote record.
    pub final_record: ExtractedRecord,
    /// Agreement rates, one entry per schema field, in schema order.
    pub match_rates: Vec<FieldMatchRate>,
}

impl ReconciledBatch {
    /// Agreement rate for one field, if it is part of the schema.
    #[must_use]
    pub fn rate_for(&self, field: &str) -> Option<f64> {
        self.match_rates
            .iter()
            .find(|m| m.field == field)
            .map(|m| m.rate)
    }
}

/// Reconcile a batch of runs into one consensus record.
///
/// # Panics
///
/// Panics if `runs` is empty. Callers settle the batch first and bail on
/// `AllAttemptsFailed`, so an empty run sequence here is a programming
/// error, not a data condition.
#[must_use]
pub fn reconcile(runs: &[ExtractionRun], schema: &FieldSchema) -> ReconciledBatch {
    assert!(!runs.is_empty(), "reconcile requires at least one run");

    let mut final_record = ExtractedRecord::new();
    let mut match_rates = Vec::with_capacity(schema.len());

    for field in schema.iter() {
        let values: Vec<String> = runs.iter().map(|run| run.record.normalized(field)).collect();
        let (value, rate) = majority_vote(&values);

        if value != NO_INFORMATION {
            final_record.insert(field, FieldValue::scalar(value.clone()));
        }
        match_rates.push(FieldMatchRate {
            field: field.to_string(),
            value,
            rate,
        });
    }

    ReconciledBatch {
        final_record,
        match_rates,
    }
}

/// Relative agreement of one run against its peers for a field.
///
/// Returns the percentage of `peers` whose normalized value equals the
/// run's own, defined as 100 when there are no peers. This annotates a
/// run's confidence relative to the other runs, not to the final record.
#[must_use]
pub fn match_rate_against_peers(run: &ExtractionRun, peers: &[ExtractionRun], field: &str) -> f64 {
    if peers.is_empty() {
        return 100.0;
    }
    let own = run.record.normalized(field);
    let matching = peers
        .iter()
        .filter(|peer| peer.record.normalized(field) == own)
        .count();
    matching as f64 / peers.len() as f64 * 100.0
}

/// Tally of one distinct normalized value.
struct Candidate {
    value: String,
    count: usize,
    first_index: usize,
}

/// Pick the winning value among normalized votes and its agreement rate.
fn majority_vote(values: &[String]) -> (String, f64) {
    let mut tally: Vec<Candidate> = Vec::new();
    for (index, value) in values.iter().enumerate() {
        match tally.iter_mut().find(|c| &c.value == value) {
            Some(candidate) => candidate.count += 1,
            None => tally.push(Candidate {
                value: value.clone(),
                count: 1,
                first_index: index,
            }),
        }
    }

    let top_count = tally.iter().map(|c| c.count).max().unwrap_or(0);
    let winner = tally
        .iter()
        .filter(|c| c.count == top_count)
        .min_by(|a, b| {
            let a_sentinel = a.value == NO_INFORMATION;
            let b_sentinel = b.value == NO_INFORMATION;
            a_sentinel
                .cmp(&b_sentinel)
                .then_with(|| b.value.chars().count().cmp(&a.value.chars().count()))
                .then_with(|| a.first_index.cmp(&b.first_index))
        })
        .expect("majority_vote requires at least one value");

    let rate = winner.count as f64 / values.len() as f64 * 100.0;
    (winner.value.clone(), rate)
}
