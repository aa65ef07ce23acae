use anyhow::{Context, Result};
use hcl::Expression;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::frontend::core::{expr_to_value, find_attr};
use crate::frontend::env::{VarType, VariableDefinition, VariableEnvironment};
use crate::value::{Number, Value};

/// Name of the optional variable-values file inside a template directory.
pub const TFVARS_FILE: &str = "terraform.tfvars";

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("cannot convert '{0}' to number")]
    Number(String),
    #[error("cannot convert '{0}' to bool")]
    Bool(String),
}

/// Collect every `variable` block across the parsed files. A later block
/// with the same name replaces an earlier one.
pub fn parse_variable_definitions<'a>(
    bodies: impl IntoIterator<Item = &'a hcl::Body>,
) -> BTreeMap<String, VariableDefinition> {
    let empty = VariableEnvironment::default();
    let mut defs = BTreeMap::new();
    for body in bodies {
        for blk in body.blocks().filter(|b| b.identifier() == "variable") {
            let Some(label) = blk.labels().first() else {
                debug!("skipping variable block without a name label");
                continue;
            };
            let name = label.as_str().to_string();
            let mut def = VariableDefinition {
                name: name.clone(),
                ..Default::default()
            };
            if let Some(attr) = find_attr(blk.body(), "type") {
                def.declared_type = declared_type(attr.expr());
            }
            if let Some(attr) = find_attr(blk.body(), "description") {
                if let Ok(Value::String(s)) = expr_to_value(attr.expr(), &empty) {
                    def.description = s;
                }
            }
            if let Some(attr) = find_attr(blk.body(), "default") {
                match expr_to_value(attr.expr(), &empty) {
                    Ok(v) => def.default = Some(v),
                    Err(e) => debug!("variable '{name}': ignoring default: {e}"),
                }
            }
            defs.insert(name, def);
        }
    }
    defs
}

// `type = string` parses as a bare identifier; `type = list(string)` as a call.
fn declared_type(expr: &Expression) -> VarType {
    let raw = match expr {
        Expression::Variable(v) => v.as_str().to_string(),
        Expression::String(s) => s.clone(),
        _ => return VarType::Other,
    };
    raw.parse().unwrap_or_default()
}

/// Parse the contents of a variable-values file into name/value pairs.
/// Attributes that fail to evaluate are skipped.
pub fn parse_tfvars(content: &str) -> Result<HashMap<String, Value>> {
    let body: hcl::Body = hcl::from_str(content).context("parsing variable values file")?;
    let empty = VariableEnvironment::default();
    let mut out = HashMap::new();
    for attr in body.attributes() {
        match expr_to_value(attr.expr(), &empty) {
            Ok(v) => {
                out.insert(attr.key().to_string(), v);
            }
            Err(e) => debug!("tfvars: skipping '{}': {e}", attr.key()),
        }
    }
    Ok(out)
}

/// Coerce a user-supplied string according to the declared variable type.
pub fn coerce_override(raw: &str, declared: &VarType) -> Result<Value, CoercionError> {
    match declared {
        VarType::Number => {
            if let Ok(i) = raw.parse::<i64>() {
                Ok(Value::Number(Number::Int(i)))
            } else if let Ok(f) = raw.parse::<f64>() {
                Ok(Value::Number(Number::Float(f)))
            } else {
                Err(CoercionError::Number(raw.to_string()))
            }
        }
        VarType::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(CoercionError::Bool(raw.to_string())),
        },
        VarType::String | VarType::Other => Ok(Value::String(raw.to_string())),
    }
}

/// Merge defaults, tfvars values and user overrides, in that order. Each
/// step overwrites keys set by the previous one.
pub fn resolve(
    definitions: &BTreeMap<String, VariableDefinition>,
    tfvars: Option<&HashMap<String, Value>>,
    overrides: &HashMap<String, String>,
) -> VariableEnvironment {
    let mut env = VariableEnvironment::new();

    for (name, def) in definitions {
        if let Some(default) = &def.default {
            env.insert(name.clone(), default.clone());
        }
    }

    if let Some(values) = tfvars {
        for (name, value) in values {
            env.insert(name.clone(), value.clone());
        }
    }

    for (name, raw) in overrides {
        let value = match definitions.get(name) {
            Some(def) => coerce_override(raw, &def.declared_type).unwrap_or_else(|e| {
                warn!("variable '{name}': {e}; using the raw string");
                Value::String(raw.clone())
            }),
            None => Value::String(raw.clone()),
        };
        env.insert(name.clone(), value);
    }

    env
}
