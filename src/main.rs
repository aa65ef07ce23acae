use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tfcost::backends::get_backend;
use tfcost::config::{self, Config as TfcostConfig, TargetConfig, CONFIG_FILE};
use tfcost::pricing::PriceBook;
use tfcost::{parse_template, CostCalculator, Currency, CurrencyConverter, FsLoader};

#[derive(Parser)]
#[command(name = "tfcost")]
#[command(about = "Cost estimates for Terraform-style templates", long_about = None)]
struct Cli {
    /// Use tfcost.toml configuration file
    #[arg(long)]
    config: bool,

    /// Target name to run (when using config file)
    #[arg(long)]
    target: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a template directory and print its resources
    Parse {
        /// Template directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Set a variable: --var key=value (repeatable)
        #[arg(long, value_parser = parse_key_val::<String, String>)]
        var: Vec<(String, String)>,
        /// Backend to use: json|text
        #[arg(long, default_value = "text")]
        backend: String,
    },
    /// Estimate the cost of a template directory
    Estimate {
        /// Template directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Set a variable: --var key=value (repeatable)
        #[arg(long, value_parser = parse_key_val::<String, String>)]
        var: Vec<(String, String)>,
        /// TOML price book
        #[arg(long)]
        price_book: PathBuf,
        /// Convert the estimate to this currency
        #[arg(long)]
        currency: Option<Currency>,
        /// Backend to use: json|text
        #[arg(long, default_value = "text")]
        backend: String,
        /// Output file; prints to stdout if omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert an amount between currencies
    Convert {
        amount: f64,
        #[arg(long)]
        from: Currency,
        #[arg(long)]
        to: Currency,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.config && cli.command.is_none() {
        let tfcost_config = config::load_config()
            .with_context(|| format!("failed to load {CONFIG_FILE}"))?
            .ok_or_else(|| anyhow!("{CONFIG_FILE} not found"))?;

        let targets_to_run = if let Some(name) = cli.target {
            vec![tfcost_config
                .target(&name)
                .ok_or_else(|| anyhow!("target '{}' not found in {CONFIG_FILE}", name))?
                .clone()]
        } else {
            tfcost_config.targets.clone()
        };

        for target in targets_to_run {
            run_target(&tfcost_config, &target, Path::new("."))?;
        }
    } else if let Some(command) = cli.command {
        match command {
            Commands::Parse { dir, var, backend } => {
                let overrides: HashMap<String, String> = var.into_iter().collect();
                let resources = parse_template(&dir, &FsLoader, &overrides)
                    .with_context(|| format!("parsing template {}", dir.display()))?;
                let be = get_backend(&backend).ok_or_else(|| anyhow!("unknown backend '{backend}'"))?;
                print!("{}", be.render_resources(&resources)?);
            }
            Commands::Estimate {
                dir,
                var,
                price_book,
                currency,
                backend,
                output,
            } => {
                let overrides: HashMap<String, String> = var.into_iter().collect();
                let artifact = estimate_artifact(
                    &dir,
                    &overrides,
                    &price_book,
                    currency,
                    &backend,
                    &CurrencyConverter::new(),
                )?;
                emit(&artifact, output.as_deref())?;
            }
            Commands::Convert { amount, from, to } => {
                let converted = CurrencyConverter::new().convert(amount, from, to)?;
                println!("{amount} {from} = {converted:.4} {to}");
            }
        }
    } else {
        return Err(anyhow!("nothing to do: pass a subcommand or --config"));
    }

    Ok(())
}

fn estimate_artifact(
    dir: &Path,
    overrides: &HashMap<String, String>,
    price_book: &Path,
    currency: Option<Currency>,
    backend: &str,
    converter: &CurrencyConverter,
) -> Result<String> {
    let be = get_backend(backend).ok_or_else(|| anyhow!("unknown backend '{backend}'"))?;
    let prices = PriceBook::load(price_book)?;
    let resources = parse_template(dir, &FsLoader, overrides)
        .with_context(|| format!("parsing template {}", dir.display()))?;

    let mut estimate = CostCalculator::new().calculate(&resources, &prices);
    for w in &estimate.warnings {
        warn!("{w}");
    }
    if let Some(target) = currency {
        estimate = converter.convert_estimate(&estimate, target)?;
    }
    info!(
        "estimated {:.2} {}/month for {} resource(s)",
        estimate.total_monthly_cost,
        estimate.currency,
        estimate.breakdown.len()
    );
    be.render_estimate(&estimate)
}

fn emit(artifact: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, artifact).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote output to: {}", path.display());
        }
        None => print!("{}", artifact),
    }
    Ok(())
}

/// Run one `[[targets]]` entry; relative paths are taken from `base`.
fn run_target(tfcost_config: &TfcostConfig, target: &TargetConfig, base: &Path) -> Result<()> {
    info!("Running target: {}", target.name);
    let settings = &tfcost_config.settings;

    let template = base.join(target.template(settings).unwrap_or("."));
    let price_book = target
        .price_book(settings)
        .map(|p| base.join(p))
        .ok_or_else(|| anyhow!("target '{}' has no price_book", target.name))?;
    let currency = target
        .currency(settings)
        .map(str::parse::<Currency>)
        .transpose()?;

    let converter = CurrencyConverter::new();
    tfcost_config.apply_rates(&converter)?;

    let artifact = estimate_artifact(
        &template,
        &target.merged_vars(settings),
        &price_book,
        currency,
        &target.backend,
        &converter,
    )?;
    let output = target.output.as_ref().map(|o| base.join(o));
    emit(&artifact, output.as_deref())
}

fn parse_key_val<K, V>(s: &str) -> Result<(K, V)>
where
    K: std::str::FromStr,
    V: std::str::FromStr,
    <K as std::str::FromStr>::Err: std::fmt::Display,
    <V as std::str::FromStr>::Err: std::fmt::Display,
{
    let pos = s.find('=').ok_or_else(|| anyhow!("expected key=value"))?;
    let key = s[..pos]
        .parse()
        .map_err(|e| anyhow!("failed to parse key: {}", e))?;
    let value = s[pos + 1..]
        .parse()
        .map_err(|e| anyhow!("failed to parse value: {}", e))?;
    Ok((key, value))
}
