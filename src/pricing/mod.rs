use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod price_book;

pub use price_book::PriceBook;

/// Result type for pricing lookups
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors a pricing lookup can report
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    /// No price is known for this key
    #[error("price not found for {provider}/{region}/{key}")]
    NotFound {
        provider: String,
        region: String,
        key: String,
    },

    /// The backing service could not answer
    #[error("pricing service unavailable: {0}")]
    Unavailable(String),

    /// Malformed pricing data
    #[error("invalid pricing data: {0}")]
    Invalid(String),
}

/// One quantity band of a tiered price schedule. A `max_units` of 0 or -1
/// means the band has no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub min_units: i64,
    pub max_units: i64,
    pub price_per_unit: f64,
}

impl PricingTier {
    pub fn is_unbounded(&self) -> bool {
        self.max_units == 0 || self.max_units == -1
    }

    pub fn contains(&self, quantity: i64) -> bool {
        quantity >= self.min_units && (self.is_unbounded() || quantity <= self.max_units)
    }
}

/// Price information for one resource key. Non-empty `tiers` take
/// precedence over `hourly_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub currency: String,
    #[serde(default)]
    pub hourly_price: f64,
    #[serde(default)]
    pub tiers: Vec<PricingTier>,
}

impl Pricing {
    pub fn flat(currency: impl Into<String>, hourly_price: f64) -> Self {
        Self {
            currency: currency.into(),
            hourly_price,
            tiers: Vec::new(),
        }
    }
}

/// The external price source. Implementations may cache or call remote
/// APIs; a slow or failing lookup only affects the resource being priced.
pub trait PricingLookup {
    fn lookup(
        &self,
        provider: &str,
        region_or_zone: &str,
        resource_or_instance_type: &str,
    ) -> PricingResult<Pricing>;
}

impl<F> PricingLookup for F
where
    F: Fn(&str, &str, &str) -> PricingResult<Pricing>,
{
    fn lookup(&self, provider: &str, region_or_zone: &str, key: &str) -> PricingResult<Pricing> {
        self(provider, region_or_zone, key)
    }
}
