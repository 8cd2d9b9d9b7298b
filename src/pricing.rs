//! Per-model pricing and per-run token accounting.
//!
//! [`TokenUsage`] is a plain value created fresh for every document run and
//! threaded through the pipeline, then returned to the caller inside
//! [`crate::extract::ExtractionOutput`]. Scoping the accumulator to the run
//! (instead of a process-wide static) is what makes concurrent document runs
//! safe: two documents can never corrupt each other's totals.
//!
//! Cost is derived from a static pricing table. An unknown model yields
//! `cost: None` rather than a silent zero, so callers can distinguish "free"
//! from "unpriced".

use crate::gateway::UsageMetadata;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// USD prices per 1M tokens for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub model: &'static str,
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

/// Known model prices. Output pricing also covers reasoning tokens.
pub const MODEL_PRICING: &[ModelPricing] = &[
    ModelPricing {
        model: "gemini-2.5-pro",
        input_per_1m: 1.25,
        output_per_1m: 10.0,
    },
    ModelPricing {
        model: "gemini-2.5-flash",
        input_per_1m: 0.30,
        output_per_1m: 2.50,
    },
    ModelPricing {
        model: "gemini-3-pro-preview",
        input_per_1m: 2.0,
        output_per_1m: 12.0,
    },
    ModelPricing {
        model: "gemini-3-flash-preview",
        input_per_1m: 0.50,
        output_per_1m: 3.0,
    },
    ModelPricing {
        model: "gemini-2.0-flash",
        input_per_1m: 0.10,
        output_per_1m: 0.40,
    },
];

/// Default USD→INR exchange rate, overridable via
/// [`crate::config::ExtractionConfigBuilder::usd_to_inr`] (the CLI reads
/// `USD_TO_INR`).
pub const DEFAULT_USD_TO_INR: f64 = 90.7;

/// Look up pricing for a model identifier. `None` for unknown models.
pub fn lookup_pricing(model: &str) -> Option<&'static ModelPricing> {
    MODEL_PRICING.iter().find(|p| p.model == model)
}

/// Monetary cost in both reporting currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub usd: f64,
    pub inr: f64,
}

impl CostBreakdown {
    fn plus(self, other: CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            usd: self.usd + other.usd,
            inr: self.inr + other.inr,
        }
    }
}

/// Accumulated token counts and cost for one model (or the whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input: u64,
    pub output: u64,
    pub thoughts: u64,
    pub total: u64,
    /// `None` when every contributing call used an unpriced model.
    pub cost: Option<CostBreakdown>,
}

impl UsageTotals {
    fn add_tokens(&mut self, input: u64, output: u64, thoughts: u64, total: u64) {
        self.input += input;
        self.output += output;
        self.thoughts += thoughts;
        self.total += total;
    }

    fn add_cost(&mut self, cost: CostBreakdown) {
        self.cost = Some(self.cost.unwrap_or_default().plus(cost));
    }
}

/// Per-run token and cost accounting, keyed by model in call order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub by_model: IndexMap<String, UsageTotals>,
    pub overall: UsageTotals,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one call's usage metadata into the run totals.
    ///
    /// Billable output is `candidates + thoughts`: reasoning tokens are
    /// charged at the output rate. When the API omits `totalTokenCount`
    /// the total is reconstructed from the parts.
    pub fn record(&mut self, model: &str, usage: &UsageMetadata, usd_to_inr: f64) {
        let input = usage.prompt_token_count;
        let output = usage.candidates_token_count;
        let thoughts = usage.thoughts_token_count;
        let total = if usage.total_token_count != 0 {
            usage.total_token_count
        } else {
            input + output + thoughts
        };

        let cost = lookup_pricing(model).map(|pricing| {
            let usd = (input as f64 * pricing.input_per_1m
                + (output + thoughts) as f64 * pricing.output_per_1m)
                / 1_000_000.0;
            CostBreakdown {
                usd,
                inr: usd * usd_to_inr,
            }
        });

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.add_tokens(input, output, thoughts, total);
        if let Some(cost) = cost {
            entry.add_cost(cost);
        }

        self.overall.add_tokens(input, output, thoughts, total);
        if let Some(cost) = cost {
            self.overall.add_cost(cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64, thoughts: u64) -> UsageMetadata {
        UsageMetadata {
            prompt_token_count: input,
            candidates_token_count: output,
            thoughts_token_count: thoughts,
            total_token_count: 0,
        }
    }

    #[test]
    fn lookup_known_and_unknown_models() {
        assert!(lookup_pricing("gemini-2.5-flash").is_some());
        assert!(lookup_pricing("gpt-4.1-nano").is_none());
        assert!(lookup_pricing("").is_none());
    }

    #[test]
    fn record_accumulates_per_model_and_overall() {
        let mut tracker = TokenUsage::new();
        tracker.record("gemini-2.5-flash", &usage(1000, 200, 50), 90.0);
        tracker.record("gemini-2.5-flash", &usage(500, 100, 0), 90.0);

        let entry = &tracker.by_model["gemini-2.5-flash"];
        assert_eq!(entry.input, 1500);
        assert_eq!(entry.output, 300);
        assert_eq!(entry.thoughts, 50);
        assert_eq!(entry.total, 1850);
        assert_eq!(tracker.overall.total, 1850);
    }

    #[test]
    fn thoughts_tokens_are_billed_at_output_rate() {
        let mut tracker = TokenUsage::new();
        // 1M input + (0.5M output + 0.5M thoughts) at gemini-2.5-flash rates:
        // 0.30 + 1.0 * 2.50 = 2.80 USD
        tracker.record("gemini-2.5-flash", &usage(1_000_000, 500_000, 500_000), 100.0);
        let cost = tracker.overall.cost.unwrap();
        assert!((cost.usd - 2.80).abs() < 1e-9);
        assert!((cost.inr - 280.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_model_has_no_cost() {
        let mut tracker = TokenUsage::new();
        tracker.record("some-local-model", &usage(100, 10, 0), 90.0);
        assert_eq!(tracker.by_model["some-local-model"].cost, None);
        assert_eq!(tracker.overall.cost, None);
        // Token counters still accumulate.
        assert_eq!(tracker.overall.input, 100);
    }

    #[test]
    fn overall_cost_covers_only_priced_models() {
        let mut tracker = TokenUsage::new();
        tracker.record("some-local-model", &usage(1_000_000, 0, 0), 90.0);
        tracker.record("gemini-2.0-flash", &usage(1_000_000, 0, 0), 90.0);

        assert_eq!(tracker.by_model["some-local-model"].cost, None);
        let overall = tracker.overall.cost.unwrap();
        assert!((overall.usd - 0.10).abs() < 1e-9);
    }

    #[test]
    fn reported_total_wins_over_reconstruction() {
        let mut tracker = TokenUsage::new();
        let mut u = usage(10, 5, 0);
        u.total_token_count = 99; // API-reported totals can include overhead
        tracker.record("gemini-2.5-pro", &u, 90.0);
        assert_eq!(tracker.overall.total, 99);
    }
}
