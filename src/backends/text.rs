use anyhow::Result;
use std::fmt::Write;

use super::Backend;
use crate::cost::CostEstimate;
use crate::frontend::TemplateResources;

/// Plain-text tables for terminals.
pub struct TextBackend;

impl Backend for TextBackend {
    fn name(&self) -> &'static str {
        "text"
    }
    fn file_extension(&self) -> &'static str {
        "txt"
    }

    fn render_resources(&self, resources: &TemplateResources) -> Result<String> {
        let mut out = String::new();
        writeln!(
            out,
            "provider: {}  region: {}",
            or_dash(&resources.provider),
            or_dash(&resources.region)
        )?;
        for r in &resources.resources {
            writeln!(
                out,
                "  {}.{}  x{}  region={}",
                r.resource_type,
                r.name,
                r.count,
                or_dash(&r.region)
            )?;
            for (k, v) in &r.attributes {
                writeln!(out, "      {k} = {v}")?;
            }
        }
        writeln!(out, "{} resource(s)", resources.resources.len())?;
        Ok(out)
    }

    fn render_estimate(&self, estimate: &CostEstimate) -> Result<String> {
        let mut out = String::new();
        writeln!(
            out,
            "{:<40} {:>6} {:>14} {:>14}",
            "RESOURCE", "COUNT", "HOURLY", "MONTHLY"
        )?;
        for line in &estimate.breakdown {
            let label = format!("{}.{}", line.resource_type, line.resource_name);
            if line.available {
                writeln!(
                    out,
                    "{:<40} {:>6} {:>14.4} {:>14.2}",
                    label, line.count, line.total_hourly, line.total_monthly
                )?;
            } else {
                writeln!(out, "{:<40} {:>6} {:>14} {:>14}", label, line.count, "n/a", "n/a")?;
            }
        }
        writeln!(out)?;
        for summary in estimate.provider_breakdown.values() {
            writeln!(
                out,
                "{:<40} {:>6} {:>14.4} {:>14.2}",
                summary.provider,
                summary.resource_count,
                summary.total_hourly_cost,
                summary.total_monthly_cost
            )?;
        }
        writeln!(
            out,
            "TOTAL ({}): {:.4}/hour, {:.2}/month",
            estimate.currency, estimate.total_hourly_cost, estimate.total_monthly_cost
        )?;
        if estimate.unavailable_count > 0 {
            writeln!(out, "{} resource(s) without pricing", estimate.unavailable_count)?;
        }
        for w in &estimate.warnings {
            writeln!(out, "warning: {w}")?;
        }
        writeln!(out, "{}", estimate.disclaimer)?;
        Ok(out)
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostCalculator;
    use crate::frontend::ResourceSpec;
    use crate::pricing::{Pricing, PricingError, PricingResult};
    use std::collections::BTreeMap;

    fn resources() -> TemplateResources {
        let spec = |rtype: &str, name: &str| ResourceSpec {
            resource_type: rtype.into(),
            name: name.into(),
            count: 2,
            attributes: BTreeMap::new(),
            provider: "aws".into(),
            region: "us-east-1".into(),
        };
        TemplateResources {
            provider: "aws".into(),
            region: "us-east-1".into(),
            resources: vec![spec("aws_s3_bucket", "logs"), spec("aws_lb", "front")],
        }
    }

    #[test]
    fn estimate_table() {
        let lookup = |_: &str, _: &str, key: &str| -> PricingResult<Pricing> {
            match key {
                "aws_s3_bucket" => Ok(Pricing::flat("USD", 0.25)),
                _ => Err(PricingError::Unavailable("offline".into())),
            }
        };
        let estimate = CostCalculator::new().calculate(&resources(), &lookup);
        let out = TextBackend.render_estimate(&estimate).unwrap();
        assert!(out.contains("aws_s3_bucket.logs"));
        assert!(out.contains("n/a"));
        assert!(out.contains("TOTAL (USD): 0.5000/hour, 360.00/month"));
        assert!(out.contains("1 resource(s) without pricing"));
        assert!(out.contains("warning: Pricing unavailable for front (aws_lb)"));
        assert!(out.ends_with(&format!("{}\n", estimate.disclaimer)));
    }

    #[test]
    fn resource_listing() {
        let out = TextBackend.render_resources(&resources()).unwrap();
        assert!(out.starts_with("provider: aws  region: us-east-1\n"));
        assert!(out.contains("  aws_lb.front  x2  region=us-east-1"));
        assert!(out.ends_with("2 resource(s)\n"));
    }
}
