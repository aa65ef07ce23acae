use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::frontend::core::{expr_to_value, find_attr};
use crate::frontend::env::VariableEnvironment;
use crate::frontend::for_each::instance_count;
use crate::value::Value;

/// All resources materialized from one template directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateResources {
    /// Provider of the first resource.
    pub provider: String,
    /// First region discovered on any resource; empty when unknown.
    pub region: String,
    pub resources: Vec<ResourceSpec>,
}

/// A single `resource "<type>" "<name>"` block after evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    /// Always positive; blocks resolving to zero or unknown are dropped.
    pub count: i64,
    pub attributes: BTreeMap<String, Value>,
    pub provider: String,
    pub region: String,
}

impl ResourceSpec {
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// `alicloud_instance` -> `alicloud`, `null_resource` -> `null`.
pub fn provider_of(resource_type: &str) -> &str {
    resource_type
        .split_once('_')
        .map(|(p, _)| p)
        .unwrap_or(resource_type)
}

fn plain_string(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.is_empty() && !s.contains("${"))
}

/// Scan `provider` blocks for a resolvable `region`. The first block seen
/// for a provider name wins.
pub fn provider_regions<'a>(
    bodies: impl IntoIterator<Item = &'a hcl::Body>,
    env: &VariableEnvironment,
) -> HashMap<String, String> {
    let mut regions = HashMap::new();
    for body in bodies {
        for blk in body.blocks().filter(|b| b.identifier() == "provider") {
            let Some(label) = blk.labels().first() else {
                continue;
            };
            let Some(attr) = find_attr(blk.body(), "region") else {
                continue;
            };
            if let Ok(v) = expr_to_value(attr.expr(), env) {
                if let Some(region) = plain_string(&v) {
                    regions
                        .entry(label.as_str().to_string())
                        .or_insert_with(|| region.to_string());
                }
            }
        }
    }
    regions
}

/// Evaluate the attributes of `body`, recursing into nested blocks. Each
/// nested block is stored under its type name; a repeated block type
/// replaces the earlier occurrence. Attributes that fail to evaluate are
/// left out.
pub fn block_attributes(body: &hcl::Body, env: &VariableEnvironment) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();
    for attr in body.attributes() {
        match expr_to_value(attr.expr(), env) {
            Ok(v) => {
                attrs.insert(attr.key().to_string(), v);
            }
            Err(e) => debug!("skipping attribute '{}': {e}", attr.key()),
        }
    }
    for nested in body.blocks() {
        let nested_attrs = block_attributes(nested.body(), env);
        if !nested_attrs.is_empty() {
            attrs.insert(nested.identifier().to_string(), Value::Map(nested_attrs));
        }
    }
    attrs
}

/// Materialize every `resource` block in `body`.
pub fn extract_resources(
    body: &hcl::Body,
    env: &VariableEnvironment,
    regions: &HashMap<String, String>,
) -> Vec<ResourceSpec> {
    let mut out = Vec::new();
    for blk in body.blocks().filter(|b| b.identifier() == "resource") {
        let [rtype, name, ..] = blk.labels() else {
            debug!("skipping resource block with fewer than two labels");
            continue;
        };
        let (rtype, name) = (rtype.as_str(), name.as_str());

        let count_eval = find_attr(blk.body(), "count").map(|a| expr_to_value(a.expr(), env));
        let for_each_eval =
            find_attr(blk.body(), "for_each").map(|a| expr_to_value(a.expr(), env));
        let count = match instance_count(count_eval.as_ref(), for_each_eval.as_ref()) {
            Some(n) if n > 0 => n,
            other => {
                debug!("excluding {rtype}.{name}: count resolved to {other:?}");
                continue;
            }
        };

        let attributes = block_attributes(blk.body(), env);
        let provider = provider_of(rtype).to_string();
        let region = attributes
            .get("region")
            .and_then(plain_string)
            .map(str::to_string)
            .or_else(|| regions.get(&provider).cloned())
            .unwrap_or_default();

        out.push(ResourceSpec {
            resource_type: rtype.to_string(),
            name: name.to_string(),
            count,
            attributes,
            provider,
            region,
        });
    }
    out
}
