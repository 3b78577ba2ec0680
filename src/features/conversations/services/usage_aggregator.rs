use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::config::PricingConfig;
use crate::features::agent::UsageRecord;

/// Usage of one chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnUsage {
    pub tokens: i64,
    pub cost: Decimal,
}

impl TurnUsage {
    /// Cost as reported in API responses
    pub fn cost_f64(&self) -> f64 {
        decimal_to_f64(self.cost)
    }
}

/// Sum per-call token counts and price them. No records is a valid,
/// zero-cost turn.
pub fn aggregate(records: &[UsageRecord], pricing: &PricingConfig) -> TurnUsage {
    let thousand = Decimal::from(1000);

    records
        .iter()
        .fold(TurnUsage::default(), |acc, record| {
            let cost = Decimal::from(record.input_tokens) * pricing.input_per_1k / thousand
                + Decimal::from(record.output_tokens) * pricing.output_per_1k / thousand;

            TurnUsage {
                tokens: acc
                    .tokens
                    .saturating_add(i64::try_from(record.total_tokens).unwrap_or(i64::MAX)),
                cost: acc.cost + cost,
            }
        })
}

/// Exact amounts stay `Decimal` internally; JSON gets a float
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.round_dp(8).to_f64().unwrap_or_default()
}
