pub mod backends;
pub mod config;
pub mod cost;
pub mod frontend;
pub mod pricing;
pub mod value;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Public re-exports
pub use cost::{CostCalculator, CostEstimate, Currency, CurrencyConverter};
pub use frontend::data_sources::DataSourceResolver;
pub use frontend::{ResourceSpec, TemplateResources};
pub use pricing::{Pricing, PricingLookup, PricingTier};
pub use value::Value;

// Loader abstraction: lets callers control how files are read.
pub trait Loader {
    fn load(&self, path: &Path) -> Result<String>;
    /// Regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Reads templates from the local filesystem.
pub struct FsLoader;

impl Loader for FsLoader {
    fn load(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

// Pure API: parse + evaluate every template file in `dir` using a Loader.
pub fn parse_template(
    dir: &Path,
    loader: &dyn Loader,
    overrides: &HashMap<String, String>,
) -> Result<TemplateResources> {
    frontend::load_template_with_loader(dir, loader, overrides, None)
}

/// Like [`parse_template`], resolving `data` blocks first.
pub fn parse_template_with_data_sources(
    dir: &Path,
    loader: &dyn Loader,
    overrides: &HashMap<String, String>,
    data_sources: &DataSourceResolver,
) -> Result<TemplateResources> {
    frontend::load_template_with_loader(dir, loader, overrides, Some(data_sources))
}

pub fn estimate(resources: &TemplateResources, pricing: &dyn PricingLookup) -> CostEstimate {
    CostCalculator::new().calculate(resources, pricing)
}

pub fn render_with_backend(backend: &str, estimate: &CostEstimate) -> Result<String> {
    let be = backends::get_backend(backend)
        .ok_or_else(|| anyhow::anyhow!("unknown backend '{backend}'"))?;
    be.render_estimate(estimate)
}
