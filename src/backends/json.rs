use anyhow::Result;
use serde_json::json;

use super::Backend;
use crate::cost::CostEstimate;
use crate::frontend::TemplateResources;

pub struct JsonBackend;

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }
    fn file_extension(&self) -> &'static str {
        "json"
    }
    fn render_resources(&self, resources: &TemplateResources) -> Result<String> {
        let output = json!({
            "backend": self.name(),
            "template": resources,
        });
        serde_json::to_string_pretty(&output).map_err(Into::into)
    }
    fn render_estimate(&self, estimate: &CostEstimate) -> Result<String> {
        let output = json!({
            "backend": self.name(),
            "estimate": estimate,
        });
        serde_json::to_string_pretty(&output).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostCalculator;
    use crate::frontend::ResourceSpec;
    use crate::pricing::{Pricing, PricingResult};
    use std::collections::BTreeMap;

    #[test]
    fn estimate_field_names() {
        let resources = TemplateResources {
            provider: "aws".into(),
            region: "us-east-1".into(),
            resources: vec![ResourceSpec {
                resource_type: "aws_s3_bucket".into(),
                name: "logs".into(),
                count: 1,
                attributes: BTreeMap::new(),
                provider: "aws".into(),
                region: "us-east-1".into(),
            }],
        };
        let lookup =
            |_: &str, _: &str, _: &str| -> PricingResult<Pricing> { Ok(Pricing::flat("USD", 0.1)) };
        let estimate = CostCalculator::new().calculate(&resources, &lookup);

        let out = JsonBackend.render_estimate(&estimate).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        let est = &v["estimate"];
        for field in [
            "total_hourly_cost",
            "total_monthly_cost",
            "currency",
            "breakdown",
            "provider_breakdown",
            "unavailable_count",
            "disclaimer",
            "timestamp",
        ] {
            assert!(est.get(field).is_some(), "missing {field}");
        }
        assert_eq!(est["breakdown"][0]["resource_name"], "logs");
        assert_eq!(est["breakdown"][0]["available"], true);
        assert!(est.get("warnings").is_none());
    }

    #[test]
    fn resources_use_type_key() {
        let resources = TemplateResources {
            provider: "aws".into(),
            region: String::new(),
            resources: vec![ResourceSpec {
                resource_type: "aws_instance".into(),
                name: "web".into(),
                count: 2,
                attributes: BTreeMap::new(),
                provider: "aws".into(),
                region: String::new(),
            }],
        };
        let out = JsonBackend.render_resources(&resources).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["template"]["resources"][0]["type"], "aws_instance");
        assert_eq!(v["template"]["resources"][0]["count"], 2);
    }
}
