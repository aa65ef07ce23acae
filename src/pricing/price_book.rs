use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Pricing, PricingError, PricingLookup, PricingResult, PricingTier};

fn default_currency() -> String {
    "USD".to_string()
}

/// One row of a price book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub provider: String,
    /// Region or zone; entries without one match any region.
    #[serde(default)]
    pub region: Option<String>,
    /// Resource type or instance type.
    pub key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub hourly_price: f64,
    #[serde(default)]
    pub tiers: Vec<PricingTier>,
}

/// Static price table read from TOML:
///
/// ```toml
/// [[prices]]
/// provider = "aws"
/// region = "us-east-1"
/// key = "t2.micro"
/// hourly_price = 0.0116
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    #[serde(default)]
    pub prices: Vec<PriceEntry>,
}

impl PriceBook {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing price book")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading price book {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

impl PricingLookup for PriceBook {
    fn lookup(&self, provider: &str, region_or_zone: &str, key: &str) -> PricingResult<Pricing> {
        let candidates = || {
            self.prices
                .iter()
                .filter(move |p| p.provider == provider && p.key == key)
        };
        let entry = candidates()
            .find(|p| p.region.as_deref() == Some(region_or_zone))
            .or_else(|| candidates().find(|p| p.region.is_none()))
            .ok_or_else(|| PricingError::NotFound {
                provider: provider.to_string(),
                region: region_or_zone.to_string(),
                key: key.to_string(),
            })?;
        if entry.hourly_price < 0.0 {
            return Err(PricingError::Invalid(format!(
                "negative hourly price for {provider}/{key}"
            )));
        }
        Ok(Pricing {
            currency: entry.currency.clone(),
            hourly_price: entry.hourly_price,
            tiers: entry.tiers.clone(),
        })
    }
}
