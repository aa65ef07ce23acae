use hcl::expr::{BinaryOperator, ObjectKey, Operation};
use hcl::template::{Element as TplElement, Template};
use hcl::{Expression, Traversal, TraversalOperator};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::frontend::env::VariableEnvironment;
use crate::value::{Number, Value};

/// Token stored for object values that could not be evaluated.
pub const UNSUPPORTED_TOKEN: &str = "${unsupported}";
/// Token rendered for interpolation fragments that are not plain references.
pub const OPAQUE_FRAGMENT: &str = "${...}";

/// A hard evaluation failure. Callers treat it as "skip this attribute".
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(&'static str),
    #[error("unsupported condition: {0}")]
    UnsupportedCondition(&'static str),
    #[error("unsupported operator in condition: {0}")]
    UnsupportedOperator(String),
    #[error("unsupported traversal root: {0}")]
    UnsupportedTraversal(String),
    #[error("invalid template: {0}")]
    Template(String),
}

/// Evaluate `expr` against `env`.
///
/// Unresolvable references and function calls become [`Value::Placeholder`]
/// rather than errors. Only conditionals other than `==`/`!=` comparisons
/// and node kinds outside the supported subset return [`EvalError`].
pub fn expr_to_value(expr: &Expression, env: &VariableEnvironment) -> Result<Value, EvalError> {
    match expr {
        Expression::String(s) => Ok(Value::String(s.clone())),
        Expression::Bool(b) => Ok(Value::Bool(*b)),
        Expression::Number(n) => Ok(Value::Number(number_literal(n))),
        Expression::TemplateExpr(t) => {
            let tpl = Template::from_expr(&**t).map_err(|e| EvalError::Template(e.to_string()))?;
            Ok(Value::String(render_template(&tpl, env)))
        }
        Expression::Variable(v) => Ok(resolve_reference(v.as_str(), env)),
        Expression::Traversal(tr) => {
            let path = traversal_path(tr)?;
            Ok(resolve_reference(&path, env))
        }
        Expression::FuncCall(func) => Ok(Value::Placeholder(format!("${{function:{}}}", func.name))),
        Expression::Object(obj) => {
            let mut map = BTreeMap::new();
            for (key, value_expr) in obj.iter() {
                let Some(key) = object_key(key) else {
                    log::debug!("skipping object entry with unsupported key");
                    continue;
                };
                let value = expr_to_value(value_expr, env)
                    .unwrap_or_else(|_| Value::placeholder(UNSUPPORTED_TOKEN));
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        Expression::Array(items) => {
            // Failing elements are dropped; objects keep their keys instead.
            let list = items
                .iter()
                .filter_map(|item| expr_to_value(item, env).ok())
                .collect();
            Ok(Value::List(list))
        }
        Expression::Conditional(c) => {
            if evaluate_condition(&c.cond_expr, env)? {
                expr_to_value(&c.true_expr, env)
            } else {
                expr_to_value(&c.false_expr, env)
            }
        }
        Expression::Parenthesis(inner) => expr_to_value(inner, env),
        Expression::Null => Err(EvalError::UnsupportedExpression("null")),
        Expression::Operation(_) => Err(EvalError::UnsupportedExpression("operation")),
        Expression::ForExpr(_) => Err(EvalError::UnsupportedExpression("for expression")),
        _ => Err(EvalError::UnsupportedExpression("unknown expression kind")),
    }
}

fn number_literal(n: &hcl::Number) -> Number {
    match n.as_i64() {
        Some(i) => Number::Int(i),
        None => Number::from_f64(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn render_template(tpl: &Template, env: &VariableEnvironment) -> String {
    let elements: Vec<&TplElement> = tpl.elements().iter().collect();
    if let [TplElement::Literal(s)] = elements.as_slice() {
        return s.clone();
    }
    let mut out = String::new();
    for el in elements {
        match el {
            TplElement::Literal(s) => out.push_str(s),
            TplElement::Interpolation(ip) => match &ip.expr {
                Expression::Traversal(tr) => match traversal_path(tr) {
                    Ok(path) => out.push_str(&resolve_reference(&path, env).to_string()),
                    Err(_) => out.push_str(OPAQUE_FRAGMENT),
                },
                Expression::Variable(v) => {
                    out.push_str(&resolve_reference(v.as_str(), env).to_string())
                }
                _ => out.push_str(OPAQUE_FRAGMENT),
            },
            TplElement::Directive(_) => out.push_str(OPAQUE_FRAGMENT),
        }
    }
    out
}

/// Look up a reference path in the environment. A leading `var.` is
/// stripped; misses become `${<path>}` placeholders.
pub fn resolve_reference(path: &str, env: &VariableEnvironment) -> Value {
    let name = path.strip_prefix("var.").unwrap_or(path);
    match env.get(name) {
        Some(v) => v.clone(),
        None => Value::Placeholder(format!("${{{path}}}")),
    }
}

/// Render a traversal as a dotted path, e.g. `var.subnets.0` or `each.value.[name]`.
pub fn traversal_path(tr: &Traversal) -> Result<String, EvalError> {
    let root = match &tr.expr {
        Expression::Variable(v) => v.as_str().to_string(),
        other => return Err(EvalError::UnsupportedTraversal(format!("{other:?}"))),
    };
    let mut parts = vec![root];
    for op in &tr.operators {
        let part = match op {
            TraversalOperator::GetAttr(name) => name.as_str().to_string(),
            TraversalOperator::LegacyIndex(i) => i.to_string(),
            TraversalOperator::Index(Expression::Number(n)) => match n.as_i64() {
                Some(i) => i.to_string(),
                None => format!("[{n}]"),
            },
            TraversalOperator::Index(Expression::String(s)) => format!("[{s}]"),
            TraversalOperator::Index(_) => "[...]".to_string(),
            TraversalOperator::AttrSplat | TraversalOperator::FullSplat => "*".to_string(),
        };
        parts.push(part);
    }
    Ok(parts.join("."))
}

fn object_key(key: &ObjectKey) -> Option<String> {
    match key {
        ObjectKey::Identifier(id) => Some(id.as_str().to_string()),
        ObjectKey::Expression(expr) => key_expr(expr),
        _ => None,
    }
}

fn key_expr(expr: &Expression) -> Option<String> {
    match expr {
        Expression::String(s) => Some(s.clone()),
        Expression::Number(n) => Some(number_literal(n).to_string()),
        Expression::Bool(b) => Some(b.to_string()),
        Expression::Variable(v) => Some(v.as_str().to_string()),
        Expression::Traversal(tr) => traversal_path(tr).ok(),
        Expression::Parenthesis(inner) => key_expr(inner),
        _ => None,
    }
}

/// Only `==`/`!=` (and bare bool literals) are supported. Both sides are
/// compared by display string, so `1 == "1"` holds.
fn evaluate_condition(expr: &Expression, env: &VariableEnvironment) -> Result<bool, EvalError> {
    match expr {
        Expression::Operation(op) => match &**op {
            Operation::Binary(b) => {
                let lhs = expr_to_value(&b.lhs_expr, env)?;
                let rhs = expr_to_value(&b.rhs_expr, env)?;
                match b.operator {
                    BinaryOperator::Eq => Ok(lhs.to_string() == rhs.to_string()),
                    BinaryOperator::NotEq => Ok(lhs.to_string() != rhs.to_string()),
                    other => Err(EvalError::UnsupportedOperator(format!("{other:?}"))),
                }
            }
            Operation::Unary(_) => Err(EvalError::UnsupportedCondition("unary operation")),
        },
        Expression::Bool(b) => Ok(*b),
        Expression::Parenthesis(inner) => evaluate_condition(inner, env),
        _ => Err(EvalError::UnsupportedCondition("expected a comparison")),
    }
}

pub fn find_attr<'a>(body: &'a hcl::Body, name: &str) -> Option<&'a hcl::Attribute> {
    body.attributes().find(|a| a.key() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_attr(src: &str) -> Expression {
        let body: hcl::Body = hcl::from_str(&format!("v = {src}\n")).unwrap();
        find_attr(&body, "v").unwrap().expr().clone()
    }

    fn env_with(pairs: &[(&str, Value)]) -> VariableEnvironment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn literals() {
        let env = VariableEnvironment::default();
        assert_eq!(expr_to_value(&parse_attr("\"x\""), &env), Ok(Value::from("x")));
        assert_eq!(expr_to_value(&parse_attr("5"), &env), Ok(Value::from(5)));
        assert_eq!(
            expr_to_value(&parse_attr("1.5"), &env),
            Ok(Value::Number(Number::Float(1.5)))
        );
        assert_eq!(expr_to_value(&parse_attr("true"), &env), Ok(Value::from(true)));
    }

    #[test]
    fn var_reference_resolves_or_placeholders() {
        let env = env_with(&[("region", Value::from("eu-west-1"))]);
        assert_eq!(
            expr_to_value(&parse_attr("var.region"), &env),
            Ok(Value::from("eu-west-1"))
        );
        assert_eq!(
            expr_to_value(&parse_attr("var.missing"), &env),
            Ok(Value::placeholder("${var.missing}"))
        );
        assert_eq!(
            expr_to_value(&parse_attr("data.aws_ami.ubuntu.id"), &env),
            Ok(Value::placeholder("${data.aws_ami.ubuntu.id}"))
        );
    }

    #[test]
    fn indexed_traversal_path() {
        let env = VariableEnvironment::default();
        assert_eq!(
            expr_to_value(&parse_attr("var.subnets[0]"), &env),
            Ok(Value::placeholder("${var.subnets.0}"))
        );
    }

    #[test]
    fn template_interpolation() {
        let env = env_with(&[("env", Value::from("prod"))]);
        assert_eq!(
            expr_to_value(&parse_attr("\"web-${var.env}\""), &env),
            Ok(Value::from("web-prod"))
        );
        assert_eq!(
            expr_to_value(&parse_attr("\"web-${count.index}\""), &env),
            Ok(Value::from("web-${count.index}"))
        );
        assert_eq!(
            expr_to_value(&parse_attr("\"id-${upper(var.env)}\""), &env),
            Ok(Value::from("id-${...}"))
        );
    }

    #[test]
    fn function_calls_are_placeholders() {
        let env = VariableEnvironment::default();
        assert_eq!(
            expr_to_value(&parse_attr("toset([\"a\", \"b\"])"), &env),
            Ok(Value::placeholder("${function:toset}"))
        );
    }

    #[test]
    fn objects_keep_keys_lists_drop_failures() {
        let env = VariableEnvironment::default();
        let obj = expr_to_value(&parse_attr("{ a = 1, \"b\" = 1 > 2 }"), &env).unwrap();
        let map = obj.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::from(1)));
        assert_eq!(map.get("b"), Some(&Value::placeholder(UNSUPPORTED_TOKEN)));

        let list = expr_to_value(&parse_attr("[1, 1 > 2, \"x\"]"), &env).unwrap();
        assert_eq!(list, Value::from(vec![Value::from(1), Value::from("x")]));
    }

    #[test]
    fn object_key_forms() {
        let env = env_with(&[("region", Value::from("eu-west-1"))]);
        let obj = expr_to_value(
            &parse_attr(
                "{\n  name = 1\n  \"quoted\" = 2\n  (var.wrapped) = 3\n  var.region = 4\n}",
            ),
            &env,
        )
        .unwrap();
        let map = obj.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&Value::from(1)));
        assert_eq!(map.get("quoted"), Some(&Value::from(2)));
        assert_eq!(map.get("var.wrapped"), Some(&Value::from(3)));
        assert_eq!(map.get("var.region"), Some(&Value::from(4)));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn equality_conditionals_coerce_to_strings() {
        let env = env_with(&[("cloud", Value::from("aws")), ("n", Value::from("1"))]);
        assert_eq!(
            expr_to_value(&parse_attr("var.cloud == \"aws\" ? 1 : 0"), &env),
            Ok(Value::from(1))
        );
        assert_eq!(
            expr_to_value(&parse_attr("var.cloud != \"aws\" ? 1 : 0"), &env),
            Ok(Value::from(0))
        );
        assert_eq!(
            expr_to_value(&parse_attr("var.n == 1 ? \"yes\" : \"no\""), &env),
            Ok(Value::from("yes"))
        );
    }

    #[test]
    fn other_conditionals_hard_fail() {
        let env = env_with(&[("n", Value::from(3))]);
        assert!(matches!(
            expr_to_value(&parse_attr("var.n > 2 ? 1 : 0"), &env),
            Err(EvalError::UnsupportedOperator(_))
        ));
        assert!(expr_to_value(&parse_attr("var.n ? 1 : 0"), &env).is_err());
    }

    #[test]
    fn unsupported_nodes_hard_fail() {
        let env = VariableEnvironment::default();
        assert!(expr_to_value(&parse_attr("1 + 2"), &env).is_err());
        assert!(expr_to_value(&parse_attr("[for s in var.list : s]"), &env).is_err());
    }
}
