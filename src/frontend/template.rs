use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::frontend::data_sources::{replace_data_source_references, DataSourceResolver};
use crate::frontend::resources::{extract_resources, provider_of, provider_regions, TemplateResources};
use crate::frontend::variables::{self, parse_variable_definitions, TFVARS_FILE};
use crate::Loader;

/// File extension of template files.
pub const TEMPLATE_EXTENSION: &str = "tf";

fn template_files(dir: &Path, loader: &dyn Loader) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = loader
        .list(dir)
        .with_context(|| format!("reading template directory {}", dir.display()))?
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

fn parse_files(files: &[PathBuf], loader: &dyn Loader) -> Result<Vec<hcl::Body>> {
    let mut bodies = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for path in files {
        let content = loader
            .load(path)
            .with_context(|| format!("reading template file {}", path.display()))?;
        match hcl::from_str::<hcl::Body>(&content) {
            Ok(body) => bodies.push(body),
            Err(e) => errors.push(format!("{}: {e}", path.display())),
        }
    }
    if !errors.is_empty() {
        bail!("template parsing errors: {}", errors.join("; "));
    }
    Ok(bodies)
}

fn load_tfvars(dir: &Path, loader: &dyn Loader) -> Option<HashMap<String, crate::value::Value>> {
    let path = dir.join(TFVARS_FILE);
    let present = loader
        .list(dir)
        .map(|entries| entries.iter().any(|p| p == &path))
        .unwrap_or(false);
    if !present {
        return None;
    }
    let parsed = loader
        .load(&path)
        .and_then(|content| variables::parse_tfvars(&content));
    match parsed {
        Ok(values) => Some(values),
        Err(e) => {
            warn!("ignoring {}: {e:#}", path.display());
            None
        }
    }
}

/// Parse every template file in `dir` (non-recursive), resolve variables and
/// materialize resources. Data blocks are resolved when `data_sources` is given.
pub fn load_template_with_loader(
    dir: &Path,
    loader: &dyn Loader,
    overrides: &HashMap<String, String>,
    data_sources: Option<&DataSourceResolver>,
) -> Result<TemplateResources> {
    let files = template_files(dir, loader)?;
    if files.is_empty() {
        bail!("no .{TEMPLATE_EXTENSION} files found in {}", dir.display());
    }
    let bodies = parse_files(&files, loader)?;

    let definitions = parse_variable_definitions(&bodies);
    let tfvars = load_tfvars(dir, loader);
    let env = variables::resolve(&definitions, tfvars.as_ref(), overrides);
    debug!(
        "resolved {} variable(s) from {} definition(s)",
        env.len(),
        definitions.len()
    );

    let resolved_data = data_sources.map(|r| r.resolve(&bodies, &env));

    let regions = provider_regions(&bodies, &env);
    let mut resources: Vec<_> = bodies
        .iter()
        .flat_map(|body| extract_resources(body, &env, &regions))
        .collect();

    if let Some(resolved) = resolved_data.filter(|r| !r.is_empty()) {
        for res in &mut resources {
            let attrs = std::mem::take(&mut res.attributes);
            res.attributes = replace_data_source_references(attrs, &resolved);
        }
    }

    let provider = resources
        .first()
        .map(|r| provider_of(&r.resource_type).to_string())
        .unwrap_or_default();
    let region = resources
        .iter()
        .map(|r| r.region.as_str())
        .find(|r| !r.is_empty())
        .unwrap_or_default()
        .to_string();

    info!(
        "parsed {} file(s): {} resource(s) in {}",
        files.len(),
        resources.len(),
        dir.display()
    );
    Ok(TemplateResources {
        provider,
        region,
        resources,
    })
}
