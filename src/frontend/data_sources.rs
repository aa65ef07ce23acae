use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;

use crate::frontend::env::VariableEnvironment;
use crate::frontend::resources::{block_attributes, provider_of};
use crate::value::Value;

const DATA_REF_START: &str = "${data.";

/// Cloud credentials handed to data-source lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Supplies credentials per provider name (`aws`, `alicloud`, ...).
pub trait CredentialProvider {
    fn credentials(&self, provider: &str) -> Result<Credentials>;
}

/// Performs the provider-side query behind a `data` block.
pub trait DataSourceLookup {
    fn query(
        &self,
        data_type: &str,
        attributes: &BTreeMap<String, Value>,
        credentials: &Credentials,
    ) -> Result<Value>;
}

/// Resolves `data "<type>" "<name>"` blocks through the collaborators it
/// was constructed with.
pub struct DataSourceResolver {
    credentials: Box<dyn CredentialProvider>,
    lookup: Box<dyn DataSourceLookup>,
}

impl DataSourceResolver {
    pub fn new(credentials: Box<dyn CredentialProvider>, lookup: Box<dyn DataSourceLookup>) -> Self {
        Self {
            credentials,
            lookup,
        }
    }

    /// Query every data block, keyed `data.<type>.<name>`. Failures are
    /// logged and the block is left unresolved.
    pub fn resolve<'a>(
        &self,
        bodies: impl IntoIterator<Item = &'a hcl::Body>,
        env: &VariableEnvironment,
    ) -> BTreeMap<String, Value> {
        let mut resolved = BTreeMap::new();
        for body in bodies {
            for blk in body.blocks().filter(|b| b.identifier() == "data") {
                let [dtype, name, ..] = blk.labels() else {
                    debug!("skipping data block with fewer than two labels");
                    continue;
                };
                let (dtype, name) = (dtype.as_str(), name.as_str());
                let creds = match self.credentials.credentials(provider_of(dtype)) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("data.{dtype}.{name}: no credentials: {e:#}");
                        continue;
                    }
                };
                let attrs = block_attributes(blk.body(), env);
                match self.lookup.query(dtype, &attrs, &creds) {
                    Ok(v) => {
                        resolved.insert(format!("data.{dtype}.{name}"), v);
                    }
                    Err(e) => warn!("data.{dtype}.{name}: lookup failed: {e:#}"),
                }
            }
        }
        resolved
    }
}

/// Replace `${data.<type>.<name>...}` references in `attributes` with
/// resolved values. A string that is exactly one reference takes the
/// resolved value itself; references embedded in longer strings are
/// spliced in as text. Unknown references are left untouched.
pub fn replace_data_source_references(
    attributes: BTreeMap<String, Value>,
    resolved: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    attributes
        .into_iter()
        .map(|(k, v)| (k, replace_value(v, resolved)))
        .collect()
}

fn replace_value(value: Value, resolved: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::Placeholder(token) => {
            lookup_reference(&token, resolved).unwrap_or(Value::Placeholder(token))
        }
        Value::String(s) if s.contains(DATA_REF_START) => splice_references(s, resolved),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|v| replace_value(v, resolved))
                .collect(),
        ),
        Value::Map(map) => Value::Map(replace_data_source_references(map, resolved)),
        other => other,
    }
}

fn splice_references(s: String, resolved: &BTreeMap<String, Value>) -> Value {
    if let Some(v) = lookup_reference(&s, resolved) {
        return v;
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s.as_str();
    while let Some(start) = rest.find(DATA_REF_START) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        let token = &tail[..=end];
        match lookup_reference(token, resolved) {
            Some(v) => out.push_str(&v.to_string()),
            None => out.push_str(token),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn lookup_reference(token: &str, resolved: &BTreeMap<String, Value>) -> Option<Value> {
    let path = token.strip_prefix("${")?.strip_suffix('}')?;
    if path.contains(['{', '}']) {
        return None;
    }
    let mut parts = path.split('.');
    if parts.next()? != "data" {
        return None;
    }
    let key = format!("data.{}.{}", parts.next()?, parts.next()?);
    let mut current = resolved.get(&key)?;
    for attr in parts {
        current = match current {
            Value::Map(m) => m.get(attr)?,
            Value::List(items) => items.get(attr.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct StaticCreds;
    impl CredentialProvider for StaticCreds {
        fn credentials(&self, provider: &str) -> Result<Credentials> {
            if provider == "aws" {
                Ok(Credentials {
                    access_key: "ak".into(),
                    secret_key: "sk".into(),
                    region: "us-east-1".into(),
                })
            } else {
                bail!("no credentials for {provider}")
            }
        }
    }

    struct InstanceTypes;
    impl DataSourceLookup for InstanceTypes {
        fn query(
            &self,
            data_type: &str,
            attributes: &BTreeMap<String, Value>,
            credentials: &Credentials,
        ) -> Result<Value> {
            assert_eq!(credentials.access_key, "ak");
            match data_type {
                "aws_ec2_instance_type_offering" => {
                    let mut m = BTreeMap::new();
                    let family = attributes.get("family").map(|v| v.to_string()).unwrap_or_default();
                    m.insert("instance_type".to_string(), Value::from(format!("{family}.micro")));
                    Ok(Value::Map(m))
                }
                other => bail!("unsupported data source {other}"),
            }
        }
    }

    #[test]
    fn resolves_and_replaces() {
        let body: hcl::Body = hcl::from_str(
            r#"
            data "aws_ec2_instance_type_offering" "small" {
              family = "t3"
            }
            data "aws_ami" "ubuntu" {}
            data "alicloud_zones" "default" {}
            data "incomplete" {}
            "#,
        )
        .unwrap();
        let resolver = DataSourceResolver::new(Box::new(StaticCreds), Box::new(InstanceTypes));
        let resolved = resolver.resolve([&body], &VariableEnvironment::default());
        assert_eq!(resolved.len(), 1);

        let mut attrs = BTreeMap::new();
        attrs.insert(
            "instance_type".to_string(),
            Value::placeholder("${data.aws_ec2_instance_type_offering.small.instance_type}"),
        );
        attrs.insert(
            "ami".to_string(),
            Value::placeholder("${data.aws_ami.ubuntu.id}"),
        );
        attrs.insert(
            "interpolated".to_string(),
            Value::from("${data.aws_ec2_instance_type_offering.small.instance_type}"),
        );
        attrs.insert(
            "label".to_string(),
            Value::from(
                "type-${data.aws_ec2_instance_type_offering.small.instance_type}/${data.aws_ami.ubuntu.id}",
            ),
        );
        let replaced = replace_data_source_references(attrs, &resolved);
        assert_eq!(replaced["instance_type"], Value::from("t3.micro"));
        assert_eq!(replaced["interpolated"], Value::from("t3.micro"));
        assert_eq!(
            replaced["label"],
            Value::from("type-t3.micro/${data.aws_ami.ubuntu.id}")
        );
        assert_eq!(replaced["ami"], Value::placeholder("${data.aws_ami.ubuntu.id}"));
    }
}
