//! Token usage and cost accounting.
//!
//! The batch scheduler owns one [`UsageAccount`] per batch and records every
//! successful call's provider-reported counters; callers read the account
//! only through [`UsageSnapshot`] views.

use serde::{Deserialize, Serialize};

use crate::models::VisionModel;

/// Accumulated token usage for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageAccount {
    total_requests: usize,
    input_tokens: u64,
    output_tokens: u64,
}

impl UsageAccount {
    /// Fresh account with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful call's token counters.
    pub fn record(&mut self, input_tokens: u64, output_tokens: u64) {
        self.total_requests += 1;
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }

    /// Clear all counters back to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.total_requests
    }

    /// Summed input tokens.
    #[must_use]
    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    /// Summed output tokens.
    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    /// Estimated cost in USD at the model's catalog per-token prices.
    #[must_use]
    pub fn estimated_cost(&self, model: VisionModel) -> f64 {
        model.calculate_cost(self.input_tokens, self.output_tokens)
    }

    /// Read-only snapshot priced for the given model.
    #[must_use]
    pub fn snapshot(&self, model: VisionModel) -> UsageSnapshot {
        UsageSnapshot {
            total_requests: self.total_requests,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            estimated_cost_usd: self.estimated_cost(model),
        }
    }
}

/// Read-only view of a [`UsageAccount`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Number of recorded calls.
    pub total_requests: usize,
    /// Summed input tokens.
    pub input_tokens: u64,
    /// Summed output tokens.
    pub output_tokens: u64,
    /// Estimated cost in USD.
    pub estimated_cost_usd: f64,
}

impl UsageSnapshot {
    /// Total tokens in both directions.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
