use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

use super::calculator::CostEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Cny,
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Cny,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Cny => "CNY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    /// Units of this currency per one USD in the built-in table.
    fn per_usd(&self) -> f64 {
        match self {
            Currency::Usd => 1.0,
            Currency::Cny => 7.2,
            Currency::Eur => 0.92,
            Currency::Gbp => 0.79,
            Currency::Jpy => 149.0,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| CurrencyError::UnsupportedCurrency(s.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurrencyError {
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("invalid exchange rate {rate} for {from} -> {to}")]
    InvalidRate {
        from: Currency,
        to: Currency,
        rate: f64,
    },

    #[error("exchange rate unavailable: {0} -> {1}")]
    RateUnavailable(Currency, Currency),
}

/// Fixed-table currency converter. Reads share the rate table; writers
/// always store a rate together with its inverse.
#[derive(Debug)]
pub struct CurrencyConverter {
    rates: RwLock<HashMap<(Currency, Currency), f64>>,
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrencyConverter {
    /// Converter seeded with cross-rates anchored on USD.
    pub fn new() -> Self {
        let mut rates = HashMap::new();
        for from in Currency::ALL {
            for to in Currency::ALL {
                let rate = if from == to {
                    1.0
                } else {
                    to.per_usd() / from.per_usd()
                };
                rates.insert((from, to), rate);
            }
        }
        Self {
            rates: RwLock::new(rates),
        }
    }

    pub fn supported_currencies(&self) -> &'static [Currency] {
        &Currency::ALL
    }

    pub fn get_rate(&self, from: Currency, to: Currency) -> Result<f64, CurrencyError> {
        self.rates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(from, to))
            .copied()
            .ok_or(CurrencyError::RateUnavailable(from, to))
    }

    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> Result<f64, CurrencyError> {
        if from == to {
            return Ok(amount);
        }
        Ok(amount * self.get_rate(from, to)?)
    }

    /// Same as [`convert`](Self::convert) for currency codes such as `"CNY"`.
    pub fn convert_codes(&self, amount: f64, from: &str, to: &str) -> Result<f64, CurrencyError> {
        self.convert(amount, from.parse()?, to.parse()?)
    }

    /// Store `rate` for `from -> to` and `1 / rate` for `to -> from`.
    pub fn set_rate(&self, from: Currency, to: Currency, rate: f64) -> Result<(), CurrencyError> {
        validate_rate(from, to, rate)?;
        let mut rates = self.rates.write().unwrap_or_else(PoisonError::into_inner);
        rates.insert((from, to), rate);
        rates.insert((to, from), 1.0 / rate);
        Ok(())
    }

    /// Apply several rates at once. Nothing is written if any entry is invalid.
    pub fn update_rates(
        &self,
        updates: impl IntoIterator<Item = (Currency, Currency, f64)>,
    ) -> Result<(), CurrencyError> {
        let updates: Vec<_> = updates.into_iter().collect();
        for &(from, to, rate) in &updates {
            validate_rate(from, to, rate)?;
        }
        let mut rates = self.rates.write().unwrap_or_else(PoisonError::into_inner);
        for (from, to, rate) in updates {
            rates.insert((from, to), rate);
            rates.insert((to, from), 1.0 / rate);
        }
        Ok(())
    }

    /// Return a copy of `estimate` expressed in `target`. Every amount is
    /// converted with one rate read up front; unavailable lines are copied
    /// as they are.
    pub fn convert_estimate(
        &self,
        estimate: &CostEstimate,
        target: Currency,
    ) -> Result<CostEstimate, CurrencyError> {
        let source: Currency = estimate.currency.parse()?;
        if source == target {
            return Ok(estimate.clone());
        }
        let rate = self.get_rate(source, target)?;
        let code = target.code().to_string();

        let mut converted = estimate.clone();
        converted.total_hourly_cost *= rate;
        converted.total_monthly_cost *= rate;
        converted.currency = code.clone();
        for line in converted.breakdown.iter_mut().filter(|l| l.available) {
            line.unit_hourly *= rate;
            line.unit_monthly *= rate;
            line.total_hourly *= rate;
            line.total_monthly *= rate;
            line.currency = code.clone();
        }
        for summary in converted.provider_breakdown.values_mut() {
            summary.total_hourly_cost *= rate;
            summary.total_monthly_cost *= rate;
            summary.currency = code.clone();
        }
        Ok(converted)
    }
}

fn validate_rate(from: Currency, to: Currency, rate: f64) -> Result<(), CurrencyError> {
    if from == to || !rate.is_finite() || rate <= 0.0 {
        return Err(CurrencyError::InvalidRate { from, to, rate });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::calculator::{CostCalculator, DISCLAIMER};
    use crate::frontend::resources::{ResourceSpec, TemplateResources};
    use crate::pricing::{Pricing, PricingError, PricingResult};
    use std::collections::BTreeMap;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    fn sample_estimate() -> CostEstimate {
        let resource = |rtype: &str, name: &str, instance_type: &str| {
            let mut attributes = BTreeMap::new();
            attributes.insert("instance_type".to_string(), instance_type.into());
            ResourceSpec {
                resource_type: rtype.to_string(),
                name: name.to_string(),
                count: 2,
                attributes,
                provider: "aws".to_string(),
                region: "us-east-1".to_string(),
            }
        };
        let lookup = |_: &str, _: &str, key: &str| -> PricingResult<Pricing> {
            match key {
                "t2.micro" => Ok(Pricing::flat("USD", 0.5)),
                _ => Err(PricingError::Unavailable("no data".into())),
            }
        };
        CostCalculator::new().calculate(
            &TemplateResources {
                provider: "aws".into(),
                region: "us-east-1".into(),
                resources: vec![
                    resource("aws_instance", "web", "t2.micro"),
                    resource("aws_instance", "db", "r5.huge"),
                ],
            },
            &lookup,
        )
    }

    #[test]
    fn parses_codes() {
        assert_eq!("JPY".parse::<Currency>().unwrap(), Currency::Jpy);
        assert_eq!(
            "BTC".parse::<Currency>(),
            Err(CurrencyError::UnsupportedCurrency("BTC".into()))
        );
        assert_eq!(Currency::Cny.to_string(), "CNY");
    }

    #[test]
    fn default_rates_anchor_on_usd() {
        let c = CurrencyConverter::new();
        assert_eq!(c.get_rate(Currency::Usd, Currency::Cny).unwrap(), 7.2);
        assert!(close(c.get_rate(Currency::Cny, Currency::Usd).unwrap(), 1.0 / 7.2));
        assert!(close(c.get_rate(Currency::Eur, Currency::Jpy).unwrap(), 149.0 / 0.92));
        for cur in Currency::ALL {
            assert_eq!(c.get_rate(cur, cur).unwrap(), 1.0);
        }
    }

    #[test]
    fn round_trip_every_pair() {
        let c = CurrencyConverter::new();
        for a in Currency::ALL {
            for b in Currency::ALL {
                let there = c.convert(123.45, a, b).unwrap();
                let back = c.convert(there, b, a).unwrap();
                assert!(close(back, 123.45), "{a} -> {b} -> {a} gave {back}");
            }
        }
    }

    #[test]
    fn set_rate_writes_inverse() {
        let c = CurrencyConverter::new();
        c.set_rate(Currency::Usd, Currency::Cny, 7.5).unwrap();
        assert_eq!(c.get_rate(Currency::Usd, Currency::Cny).unwrap(), 7.5);
        assert!(close(c.get_rate(Currency::Cny, Currency::Usd).unwrap(), 1.0 / 7.5));
    }

    #[test]
    fn rejects_bad_rates() {
        let c = CurrencyConverter::new();
        for rate in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                c.set_rate(Currency::Usd, Currency::Eur, rate),
                Err(CurrencyError::InvalidRate { .. })
            ));
        }
        assert!(c.set_rate(Currency::Usd, Currency::Usd, 2.0).is_err());
        assert_eq!(c.get_rate(Currency::Usd, Currency::Eur).unwrap(), 0.92);
    }

    #[test]
    fn readers_never_see_half_written_pairs() {
        let c = CurrencyConverter::new();
        assert_eq!(c.supported_currencies(), &Currency::ALL[..]);

        std::thread::scope(|s| {
            for w in 0..4 {
                let c = &c;
                s.spawn(move || {
                    for i in 0..500 {
                        let rate = 6.0 + f64::from(w) + f64::from(i % 50) / 100.0;
                        c.set_rate(Currency::Usd, Currency::Cny, rate).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let c = &c;
                s.spawn(move || {
                    for _ in 0..500 {
                        for &cur in c.supported_currencies() {
                            assert_eq!(c.get_rate(cur, cur).unwrap(), 1.0);
                        }
                        let rates = c.rates.read().unwrap();
                        let there = rates[&(Currency::Usd, Currency::Cny)];
                        let back = rates[&(Currency::Cny, Currency::Usd)];
                        assert!(close(there * back, 1.0), "{there} * {back}");
                    }
                });
            }
        });

        let there = c.get_rate(Currency::Usd, Currency::Cny).unwrap();
        let back = c.get_rate(Currency::Cny, Currency::Usd).unwrap();
        assert!(close(there * back, 1.0));
    }

    #[test]
    fn update_rates_is_all_or_nothing() {
        let c = CurrencyConverter::new();
        let err = c.update_rates([
            (Currency::Usd, Currency::Eur, 0.95),
            (Currency::Usd, Currency::Gbp, -0.8),
        ]);
        assert!(err.is_err());
        assert_eq!(c.get_rate(Currency::Usd, Currency::Eur).unwrap(), 0.92);

        c.update_rates([
            (Currency::Usd, Currency::Eur, 0.95),
            (Currency::Gbp, Currency::Jpy, 190.0),
        ])
        .unwrap();
        assert_eq!(c.get_rate(Currency::Usd, Currency::Eur).unwrap(), 0.95);
        assert!(close(c.get_rate(Currency::Jpy, Currency::Gbp).unwrap(), 1.0 / 190.0));
    }

    #[test]
    fn convert_codes_rejects_unknown() {
        let c = CurrencyConverter::new();
        assert!(close(c.convert_codes(10.0, "USD", "CNY").unwrap(), 72.0));
        assert!(matches!(
            c.convert_codes(1.0, "USD", "XYZ"),
            Err(CurrencyError::UnsupportedCurrency(code)) if code == "XYZ"
        ));
    }

    #[test]
    fn same_currency_estimate_is_unchanged() {
        let estimate = sample_estimate();
        let converted = CurrencyConverter::new()
            .convert_estimate(&estimate, Currency::Usd)
            .unwrap();
        assert_eq!(converted, estimate);
    }

    #[test]
    fn estimate_conversion_touches_only_money() {
        let estimate = sample_estimate();
        let converted = CurrencyConverter::new()
            .convert_estimate(&estimate, Currency::Cny)
            .unwrap();

        assert_eq!(converted.currency, "CNY");
        assert!(close(converted.total_hourly_cost, estimate.total_hourly_cost * 7.2));
        assert!(close(converted.total_monthly_cost, estimate.total_monthly_cost * 7.2));
        assert_eq!(converted.timestamp, estimate.timestamp);
        assert_eq!(converted.warnings, estimate.warnings);
        assert_eq!(converted.unavailable_count, 1);
        assert_eq!(converted.disclaimer, DISCLAIMER);

        let web = &converted.breakdown[0];
        assert_eq!(web.currency, "CNY");
        assert!(close(web.unit_hourly, 3.6));
        assert!(close(web.total_monthly, 0.5 * 2.0 * 720.0 * 7.2));
        assert_eq!(converted.breakdown[1], estimate.breakdown[1]);

        let aws = &converted.provider_breakdown["aws"];
        assert_eq!(aws.currency, "CNY");
        assert_eq!(aws.resource_count, 1);
        assert!(close(aws.total_hourly_cost, 7.2));
    }

    #[test]
    fn unsupported_estimate_currency() {
        let mut estimate = sample_estimate();
        estimate.currency = "CHF".into();
        assert_eq!(
            CurrencyConverter::new().convert_estimate(&estimate, Currency::Usd),
            Err(CurrencyError::UnsupportedCurrency("CHF".into()))
        );
    }
}
