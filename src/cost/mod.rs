pub mod calculator;
pub mod currency;

pub use calculator::{
    CostCalculator, CostEstimate, ProviderCostSummary, ResourceCostBreakdown, HOURS_PER_MONTH,
};
pub use currency::{Currency, CurrencyConverter, CurrencyError};
