use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::cost::{Currency, CurrencyConverter};

/// Default name of the project configuration file.
pub const CONFIG_FILE: &str = "tfcost.toml";

/// Global settings for tfcost
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Default template directory if not specified in targets
    pub template: Option<String>,
    /// Default output currency
    pub currency: Option<String>,
    /// Default price book file
    pub price_book: Option<String>,
    /// Variable overrides applied to every target
    #[serde(default)]
    pub vars: HashMap<String, toml::Value>,
}

/// Configuration for a single estimate target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Name of the target (for identification)
    pub name: String,

    /// Template directory for this target
    pub template: Option<String>,

    /// Backend to render with
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Output file path (if not specified, prints to stdout)
    pub output: Option<String>,

    /// Currency to convert the estimate to
    pub currency: Option<String>,

    /// Variable overrides for this target, layered over the settings vars
    #[serde(default)]
    pub vars: HashMap<String, toml::Value>,

    /// Price book for this target
    pub price_book: Option<String>,
}

fn default_backend() -> String {
    "text".to_string()
}

/// A fixed exchange rate applied before conversion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateConfig {
    pub from: String,
    pub to: String,
    pub rate: f64,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,
    /// Targets to estimate
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Exchange rate overrides
    #[serde(default)]
    pub rates: Vec<RateConfig>,
}

impl Config {
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Write every `[[rates]]` entry into `converter` (all or nothing).
    pub fn apply_rates(&self, converter: &CurrencyConverter) -> Result<()> {
        let updates = self
            .rates
            .iter()
            .map(|r| -> Result<(Currency, Currency, f64)> {
                Ok((r.from.parse()?, r.to.parse()?, r.rate))
            })
            .collect::<Result<Vec<_>>>()
            .context("invalid [[rates]] entry")?;
        converter.update_rates(updates)?;
        Ok(())
    }
}

impl TargetConfig {
    pub fn template<'a>(&'a self, settings: &'a Settings) -> Option<&'a str> {
        self.template.as_deref().or(settings.template.as_deref())
    }

    pub fn currency<'a>(&'a self, settings: &'a Settings) -> Option<&'a str> {
        self.currency.as_deref().or(settings.currency.as_deref())
    }

    pub fn price_book<'a>(&'a self, settings: &'a Settings) -> Option<&'a str> {
        self.price_book.as_deref().or(settings.price_book.as_deref())
    }

    /// Settings vars overlaid with target vars, rendered as override strings.
    pub fn merged_vars(&self, settings: &Settings) -> HashMap<String, String> {
        settings
            .vars
            .iter()
            .chain(self.vars.iter())
            .map(|(k, v)| (k.clone(), toml_to_override(v)))
            .collect()
    }
}

fn toml_to_override(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load configuration from tfcost.toml in the current directory
pub fn load_config() -> Result<Option<Config>> {
    load_config_from_path(Path::new(CONFIG_FILE))
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(config))
}
