use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// Declared type of a `variable` block. Only the primitive kinds drive
/// coercion of user-supplied overrides; everything else is `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    String,
    Number,
    Bool,
    #[default]
    Other,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VarType::String => "string",
            VarType::Number => "number",
            VarType::Bool => "bool",
            VarType::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for VarType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "string" => VarType::String,
            "number" => VarType::Number,
            "bool" => VarType::Bool,
            _ => VarType::Other,
        })
    }
}

/// One `variable` block, captured during the definition scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: VarType,
    pub description: String,
    pub default: Option<Value>,
}

/// Resolved variable values, looked up by bare name (`region` for `var.region`).
///
/// # Example
/// ```
/// use tfcost::frontend::env::VariableEnvironment;
/// use tfcost::value::Value;
///
/// let mut env = VariableEnvironment::default();
/// env.insert("region", Value::from("us-east-1"));
/// assert_eq!(env.get("region"), Some(&Value::from("us-east-1")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableEnvironment {
    vars: HashMap<String, Value>,
}

impl VariableEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, Value)> for VariableEnvironment {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
