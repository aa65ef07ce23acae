use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::frontend::resources::{ResourceSpec, TemplateResources};
use crate::pricing::{PricingLookup, PricingTier};

/// Hours in a billing month (30 days x 24 hours).
pub const HOURS_PER_MONTH: f64 = 720.0;

/// Currency used when no resource could be priced.
pub const DEFAULT_CURRENCY: &str = "USD";

pub const DISCLAIMER: &str =
    "This is an estimate only. Actual costs may vary based on usage, region, and pricing changes.";

/// Compute resource types priced by their `instance_type` attribute.
const INSTANCE_TYPED_RESOURCES: &[&str] = &[
    "alicloud_instance",
    "aws_instance",
    "tencentcloud_instance",
    "volcengine_ecs_instance",
];

/// Resource types that carry no price of their own.
const NON_BILLABLE_RESOURCES: &[&str] = &[
    "alicloud_security_group",
    "alicloud_security_group_rule",
    "alicloud_vpc",
    "alicloud_vswitch",
    "alicloud_zones",
    "alicloud_images",
    "alicloud_instance_types",
    "aws_security_group",
    "aws_security_group_rule",
    "aws_vpc",
    "aws_subnet",
    "aws_key_pair",
    "aws_eip",
    "aws_availability_zones",
    "aws_ami",
    "tencentcloud_security_group",
    "tencentcloud_security_group_rule",
    "tencentcloud_vpc",
    "tencentcloud_subnet",
    "tencentcloud_availability_zones",
    "tencentcloud_images",
    "volcengine_eip_address",
    "volcengine_eip_associate",
    "volcengine_security_group",
    "volcengine_security_group_rule",
    "volcengine_vpc",
    "volcengine_subnet",
    "volcengine_zones",
    "volcengine_images",
    "tls_private_key",
    "tls_cert_request",
    "tls_locally_signed_cert",
    "tls_self_signed_cert",
    "local_file",
    "local_sensitive_file",
    "random_id",
    "random_string",
    "random_password",
    "null_resource",
];

/// Markers of a value that still holds an unresolved expression.
const UNRESOLVED_MARKERS: &[&str] = &["${", "data.", "local.", "module."];

/// Provider whose prices are keyed by availability zone rather than region.
const ZONE_PRICED_PROVIDER: &str = "tencentcloud";

/// Complete cost breakdown for one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_hourly_cost: f64,
    pub total_monthly_cost: f64,
    pub currency: String,
    pub breakdown: Vec<ResourceCostBreakdown>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_breakdown: BTreeMap<String, ProviderCostSummary>,
    pub unavailable_count: usize,
    pub timestamp: DateTime<Utc>,
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Costs aggregated over the priced resources of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCostSummary {
    pub provider: String,
    pub total_hourly_cost: f64,
    pub total_monthly_cost: f64,
    pub currency: String,
    pub resource_count: usize,
}

/// Line item for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCostBreakdown {
    pub resource_type: String,
    pub resource_name: String,
    pub provider: String,
    pub count: i64,
    pub unit_hourly: f64,
    pub unit_monthly: f64,
    pub total_hourly: f64,
    pub total_monthly: f64,
    pub currency: String,
    /// `false` when no price could be determined.
    pub available: bool,
}

impl ResourceCostBreakdown {
    fn unavailable(resource: &ResourceSpec) -> Self {
        Self {
            resource_type: resource.resource_type.clone(),
            resource_name: resource.name.clone(),
            provider: resource.provider.clone(),
            count: resource.count,
            unit_hourly: 0.0,
            unit_monthly: 0.0,
            total_hourly: 0.0,
            total_monthly: 0.0,
            currency: String::new(),
            available: false,
        }
    }
}

/// Why a resource ended up without a price.
#[derive(Debug, Clone, PartialEq)]
enum Unpriced {
    NonBillable,
    UnresolvedInstanceType,
    Lookup(String),
}

/// Unit price of the first tier containing `quantity`, or of the last tier
/// when none does. Tiers are taken in the order given.
pub fn tiered_unit_price(quantity: i64, tiers: &[PricingTier]) -> f64 {
    tiers
        .iter()
        .find(|t| t.contains(quantity))
        .or_else(|| tiers.last())
        .map(|t| t.price_per_unit)
        .unwrap_or(0.0)
}

fn pricing_key(resource: &ResourceSpec) -> Result<&str, Unpriced> {
    let rtype = resource.resource_type.as_str();
    if INSTANCE_TYPED_RESOURCES.contains(&rtype) {
        return match resource.attr_str("instance_type") {
            Some(it) if !it.is_empty() && !UNRESOLVED_MARKERS.iter().any(|m| it.contains(m)) => {
                Ok(it)
            }
            _ => Err(Unpriced::UnresolvedInstanceType),
        };
    }
    if NON_BILLABLE_RESOURCES.contains(&rtype) {
        return Err(Unpriced::NonBillable);
    }
    Ok(rtype)
}

fn region_or_zone(resource: &ResourceSpec) -> &str {
    if resource.provider == ZONE_PRICED_PROVIDER {
        if let Some(zone) = resource.attr_str("availability_zone").filter(|z| !z.is_empty()) {
            return zone;
        }
    }
    &resource.region
}

/// Computes cost estimates from resource specifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostCalculator;

impl CostCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Price every resource. A resource that cannot be priced is reported
    /// as unavailable with a warning; it never fails the batch.
    pub fn calculate(&self, resources: &TemplateResources, pricing: &dyn PricingLookup) -> CostEstimate {
        let mut estimate = CostEstimate {
            total_hourly_cost: 0.0,
            total_monthly_cost: 0.0,
            currency: String::new(),
            breakdown: Vec::with_capacity(resources.resources.len()),
            provider_breakdown: BTreeMap::new(),
            unavailable_count: 0,
            timestamp: Utc::now(),
            disclaimer: DISCLAIMER.to_string(),
            warnings: Vec::new(),
        };

        for resource in &resources.resources {
            match self.resource_cost(resource, pricing) {
                Ok(line) => {
                    estimate.total_hourly_cost += line.total_hourly;
                    estimate.total_monthly_cost += line.total_monthly;
                    if estimate.currency.is_empty() {
                        estimate.currency = line.currency.clone();
                    }

                    let provider = if line.provider.is_empty() {
                        "unknown".to_string()
                    } else {
                        line.provider.clone()
                    };
                    let summary = estimate
                        .provider_breakdown
                        .entry(provider.clone())
                        .or_insert_with(|| ProviderCostSummary {
                            provider,
                            total_hourly_cost: 0.0,
                            total_monthly_cost: 0.0,
                            currency: line.currency.clone(),
                            resource_count: 0,
                        });
                    summary.total_hourly_cost += line.total_hourly;
                    summary.total_monthly_cost += line.total_monthly;
                    summary.resource_count += 1;

                    estimate.breakdown.push(line);
                }
                Err(reason) => {
                    let mut warning = format!(
                        "Pricing unavailable for {} ({})",
                        resource.name, resource.resource_type
                    );
                    if let Unpriced::Lookup(msg) = &reason {
                        warning.push_str(": ");
                        warning.push_str(msg);
                    }
                    debug!("{warning}");
                    estimate.unavailable_count += 1;
                    estimate.warnings.push(warning);
                    estimate.breakdown.push(ResourceCostBreakdown::unavailable(resource));
                }
            }
        }

        if estimate.currency.is_empty() {
            estimate.currency = DEFAULT_CURRENCY.to_string();
        }
        estimate
    }

    fn resource_cost(
        &self,
        resource: &ResourceSpec,
        pricing: &dyn PricingLookup,
    ) -> Result<ResourceCostBreakdown, Unpriced> {
        let key = pricing_key(resource)?;
        let location = region_or_zone(resource);

        let price = pricing
            .lookup(&resource.provider, location, key)
            .map_err(|e| {
                warn!(
                    "pricing lookup failed for {}.{} ({}/{}/{}): {e}",
                    resource.resource_type, resource.name, resource.provider, location, key
                );
                Unpriced::Lookup(e.to_string())
            })?;

        let unit_hourly = if price.tiers.is_empty() {
            price.hourly_price
        } else {
            tiered_unit_price(resource.count, &price.tiers)
        };
        let unit_monthly = unit_hourly * HOURS_PER_MONTH;
        let count = resource.count as f64;

        Ok(ResourceCostBreakdown {
            resource_type: resource.resource_type.clone(),
            resource_name: resource.name.clone(),
            provider: resource.provider.clone(),
            count: resource.count,
            unit_hourly,
            unit_monthly,
            total_hourly: unit_hourly * count,
            total_monthly: unit_monthly * count,
            currency: price.currency,
            available: true,
        })
    }
}
